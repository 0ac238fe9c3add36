//! Per-mode dispatch between the payload codecs.

use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};

use log::trace;

use super::compression::{DeflateSink, InflateSource};
use super::rle::{self, RleDecoder};
use crate::amira::types::error::{AmiraError, Result};
use crate::amira::types::models::EncodingMode;

/// Decodes payload bytes of a lattice in any binary mode.
///
/// Raw and RLE payloads are read through a `BufReader`; the inflate source
/// buffers its own input.
pub enum PayloadDecoder<R: Read> {
    Raw(BufReader<R>),
    Rle(RleDecoder<BufReader<R>>),
    Zlib(InflateSource<R>),
}

impl<R: Read> PayloadDecoder<R> {
    /// Wraps a reader positioned at the data offset.
    pub fn new(reader: R, mode: EncodingMode) -> Result<Self> {
        match mode {
            EncodingMode::Raw => Ok(Self::Raw(BufReader::new(reader))),
            EncodingMode::Rle => Ok(Self::Rle(RleDecoder::new(BufReader::new(reader)))),
            EncodingMode::Zlib => Ok(Self::Zlib(InflateSource::new(reader))),
            EncodingMode::AsciiTable => Err(AmiraError::Unsupported(
                "ASCII tables have no binary payload".to_string(),
            )),
        }
    }

    /// One codec call: returns how many bytes landed in `window`, 0 at end of stream.
    pub fn read_chunk(&mut self, window: &mut [u8]) -> Result<usize> {
        match self {
            Self::Raw(reader) => loop {
                match reader.read(window) {
                    Ok(n) => return Ok(n),
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
            },
            Self::Rle(decoder) => decoder.decode_run(window),
            Self::Zlib(source) => source.read(window),
        }
    }

    /// Calls the codec until `buf` is full or the stream is exhausted.
    ///
    /// Returns the number of bytes filled; less than `buf.len()` means the stream ended.
    pub fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let count = self.read_chunk(&mut buf[filled..])?;
            if count == 0 {
                break;
            }
            filled += count;
        }
        trace!("Filled {} of {} bytes", filled, buf.len());
        Ok(filled)
    }

    /// Releases the inflate stream, if any.
    pub fn close(&mut self) -> Result<()> {
        match self {
            Self::Zlib(source) => source.close(),
            Self::Raw(_) | Self::Rle(_) => Ok(()),
        }
    }
}

/// Encodes slice bytes in any binary mode.
pub enum PayloadEncoder<W: Write> {
    Raw(BufWriter<W>),
    Rle(BufWriter<W>),
    Zlib(DeflateSink<BufWriter<W>>),
}

impl<W: Write> PayloadEncoder<W> {
    /// Wraps a writer positioned at the data offset.
    pub fn new(writer: W, mode: EncodingMode) -> Result<Self> {
        let buffered = BufWriter::new(writer);
        match mode {
            EncodingMode::Raw => Ok(Self::Raw(buffered)),
            EncodingMode::Rle => Ok(Self::Rle(buffered)),
            EncodingMode::Zlib => Ok(Self::Zlib(DeflateSink::new(buffered))),
            EncodingMode::AsciiTable => Err(AmiraError::Unsupported(
                "Encoding ASCII tables".to_string(),
            )),
        }
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Raw(writer) => writer.write_all(data)?,
            Self::Rle(writer) => {
                let written = rle::encode_into(data, writer)?;
                trace!("RLE encoded {} bytes into {}", data.len(), written);
            }
            Self::Zlib(sink) => sink.write_all(data)?,
        }
        Ok(())
    }

    /// Flushes all pending output and returns the underlying writer.
    pub fn finish(self) -> Result<W> {
        let buffered = match self {
            Self::Raw(writer) | Self::Rle(writer) => writer,
            Self::Zlib(mut sink) => sink.finish()?,
        };
        buffered.into_inner().map_err(|e| AmiraError::Io(e.into_error()))
    }
}
