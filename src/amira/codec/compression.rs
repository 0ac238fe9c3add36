//! Zlib framing for `HxZip` payloads and the stream-length backpatch.
//!
//! Both directions open their flate2 stream lazily on first use and tear it down
//! exactly once. Any use after teardown fails with [`AmiraError::StreamClosed`].

use std::fs::File;
use std::io::{self, BufReader, Cursor, ErrorKind, Read, Seek, SeekFrom, Write};
use std::mem;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::{debug, trace, warn};

use crate::amira::types::error::{AmiraError, Result};

/// Width of the space-padded field reserved for the encoded stream length.
pub const LENGTH_FIELD_WIDTH: usize = 10;

/// The patched field may also cover the blank line written after the placeholder.
const LENGTH_FIELD_SPILL: usize = 2;

#[derive(Debug)]
enum StreamState<U, O> {
    Unopened(U),
    Open(O),
    Closed,
}

/// Inflate source over the payload bytes of a `HxZip` file.
pub struct InflateSource<R: Read> {
    state: StreamState<R, ZlibDecoder<BufReader<R>>>,
}

impl<R: Read> InflateSource<R> {
    /// Wraps a reader positioned at the first compressed byte.
    pub fn new(reader: R) -> Self {
        Self {
            state: StreamState::Unopened(reader),
        }
    }

    /// Inflates up to `buf.len()` bytes. `Ok(0)` signals the end of the stream,
    /// including a compressed stream that is cut short.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if let StreamState::Unopened(_) = self.state {
            if let StreamState::Unopened(reader) = mem::replace(&mut self.state, StreamState::Closed) {
                debug!("Opening inflate stream");
                self.state = StreamState::Open(ZlibDecoder::new(BufReader::new(reader)));
            }
        }

        let decoder = match &mut self.state {
            StreamState::Open(decoder) => decoder,
            _ => return Err(AmiraError::StreamClosed),
        };
        loop {
            match decoder.read(buf) {
                Ok(n) => {
                    trace!("Inflated {} bytes", n);
                    return Ok(n);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                // Compressed input ran out mid-stream; callers report the shortfall
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    debug!("Inflate stream ended early: {}", e);
                    return Ok(0);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Tears the stream down, releasing the underlying reader.
    pub fn close(&mut self) -> Result<()> {
        match mem::replace(&mut self.state, StreamState::Closed) {
            StreamState::Closed => Err(AmiraError::StreamClosed),
            StreamState::Open(_) => {
                debug!("Closed inflate stream");
                Ok(())
            }
            StreamState::Unopened(_) => Ok(()),
        }
    }
}

/// Deflate sink in front of the payload section of a file being written.
pub struct DeflateSink<W: Write> {
    state: StreamState<W, ZlibEncoder<W>>,
    level: Compression,
}

impl<W: Write> DeflateSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            state: StreamState::Unopened(writer),
            level: Compression::default(),
        }
    }

    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.open();
        match &mut self.state {
            StreamState::Open(encoder) => Ok(encoder.write_all(data)?),
            _ => Err(AmiraError::StreamClosed),
        }
    }

    /// Writes the zlib trailer and hands back the underlying writer.
    ///
    /// A sink that never received data still emits a valid, empty zlib stream.
    pub fn finish(&mut self) -> Result<W> {
        self.open();
        match mem::replace(&mut self.state, StreamState::Closed) {
            StreamState::Open(encoder) => {
                let (total_in, total_out) = (encoder.total_in(), encoder.total_out());
                let writer = encoder.finish()?;
                debug!("Finished deflate stream: {} bytes in, {} bytes out", total_in, total_out);
                Ok(writer)
            }
            _ => Err(AmiraError::StreamClosed),
        }
    }

    fn open(&mut self) {
        if let StreamState::Unopened(_) = self.state {
            if let StreamState::Unopened(writer) = mem::replace(&mut self.state, StreamState::Closed) {
                debug!("Opening deflate stream");
                self.state = StreamState::Open(ZlibEncoder::new(writer, self.level));
            }
        }
    }
}

/// Writers whose length can be cut back to the current end of data.
pub trait Truncate {
    fn set_len(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for File {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }
}

impl Truncate for Cursor<Vec<u8>> {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len).map_err(|e| io::Error::new(ErrorKind::InvalidInput, e))?;
        self.get_mut().resize(len, 0);
        Ok(())
    }
}

impl<T: Truncate + ?Sized> Truncate for &mut T {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        (**self).set_len(len)
    }
}

/// Writes the blank length field and returns its file offset.
pub fn reserve_length_field<W: Write + Seek>(writer: &mut W) -> Result<u64> {
    let offset = writer.stream_position()?;
    writer.write_all(&[b' '; LENGTH_FIELD_WIDTH])?;
    Ok(offset)
}

/// Backpatches the stream length once the payload is complete.
///
/// The writer must be positioned at the end of the payload. Writes the number of
/// bytes between `data_offset` and that end, followed by `)\n`, into the field at
/// `field_offset`, then returns to the end and truncates the file there.
pub fn patch_stream_length<W: Write + Seek + Truncate>(
    writer: &mut W,
    field_offset: u64,
    data_offset: u64,
) -> Result<u64> {
    let eof = writer.stream_position()?;
    let length = eof.checked_sub(data_offset).ok_or_else(|| {
        AmiraError::InvalidFormat(format!(
            "Payload end {} lies before data start {}",
            eof, data_offset
        ))
    })?;

    let field = format!("{})\n", length);
    if field.len() > LENGTH_FIELD_WIDTH + LENGTH_FIELD_SPILL {
        return Err(AmiraError::Unsupported(format!(
            "Stream length {} does not fit in the header length field",
            length
        )));
    }
    if field.len() > LENGTH_FIELD_WIDTH {
        warn!("Stream length {} overflows into the blank line after the length field", length);
    }

    writer.seek(SeekFrom::Start(field_offset))?;
    writer.write_all(field.as_bytes())?;
    writer.seek(SeekFrom::Start(eof))?;
    writer.flush()?;
    writer.set_len(eof)?;

    debug!("Patched stream length {} at offset {}", length, field_offset);
    Ok(length)
}
