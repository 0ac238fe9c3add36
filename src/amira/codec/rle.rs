//! The `HxByteRLE` run-length scheme.
//!
//! Every run starts with one control byte `c`:
//! - `1..=127`: repeat run, followed by a single byte repeated `c` times
//! - `0x81..=0xFF`: literal run, followed by `c & 0x7F` bytes copied verbatim
//! - `0`: invalid, the file is corrupt
//!
//! Runs never exceed 127 bytes; longer stretches are split into consecutive runs.

use std::io::{ErrorKind, Read, Write};

use byteorder::ReadBytesExt;
use log::trace;

use crate::amira::types::error::{AmiraError, Result};
use crate::amira::utils;

/// Longest run a single control byte can describe.
pub const MAX_RUN: usize = 127;

/// Control-byte bit marking a literal run.
pub const LITERAL_FLAG: u8 = 0x80;

const OVERRUN_CAPACITY: usize = 256;

/// Streaming RLE decoder.
///
/// A run that is longer than the caller's window is split: the window is filled
/// and the surplus is kept in an overrun buffer that is served, in full, before
/// the next control byte is read.
#[derive(Debug)]
pub struct RleDecoder<R> {
    reader: R,
    overrun: [u8; OVERRUN_CAPACITY],
    overrun_len: usize,
    /// Bytes consumed from the encoded stream, for error reporting.
    consumed: u64,
}

impl<R: Read> RleDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            overrun: [0; OVERRUN_CAPACITY],
            overrun_len: 0,
            consumed: 0,
        }
    }

    /// Bytes decoded by an earlier run but not yet handed out.
    pub fn overrun_len(&self) -> usize {
        self.overrun_len
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Decodes at most `window.len()` bytes into `window`.
    ///
    /// Returns the number of bytes written, which is at most one run (or the
    /// buffered remainder of one). Returns `Ok(0)` when the encoded stream is
    /// exhausted at a run boundary or when `window` is empty.
    ///
    /// # Errors
    /// - `ZeroControlByte` if a control byte is 0
    /// - `TruncatedStream` if the stream ends inside a run
    pub fn decode_run(&mut self, window: &mut [u8]) -> Result<usize> {
        if window.is_empty() {
            return Ok(0);
        }
        if self.overrun_len > 0 {
            return Ok(self.drain_overrun(window));
        }

        let control = match self.reader.read_u8() {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let control_offset = self.consumed;
        self.consumed += 1;
        if control == 0 {
            return Err(AmiraError::ZeroControlByte {
                offset: control_offset,
            });
        }

        let run = (control & !LITERAL_FLAG) as usize;
        if run == 0 {
            return Err(AmiraError::InvalidFormat(format!(
                "Empty RLE literal run at payload offset {}",
                control_offset
            )));
        }
        let served = run.min(window.len());
        let surplus = run - served;

        if control & LITERAL_FLAG != 0 {
            trace!("RLE literal run of {} bytes at offset {}", run, control_offset);
            self.read_run_bytes(&mut window[..served], run, control_offset)?;
            if surplus > 0 {
                let got = utils::fill_from(&mut self.reader, &mut self.overrun[..surplus])?;
                self.consumed += got as u64;
                if got < surplus {
                    return Err(truncated_run(control_offset, run, served + got));
                }
                self.overrun_len = surplus;
            }
        } else {
            trace!("RLE repeat run of {} bytes at offset {}", run, control_offset);
            let mut value = [0u8; 1];
            self.read_run_bytes(&mut value, run, control_offset)?;
            window[..served].fill(value[0]);
            if surplus > 0 {
                self.overrun[..surplus].fill(value[0]);
                self.overrun_len = surplus;
            }
        }

        Ok(served)
    }

    fn drain_overrun(&mut self, window: &mut [u8]) -> usize {
        let n = self.overrun_len.min(window.len());
        window[..n].copy_from_slice(&self.overrun[..n]);
        self.overrun.copy_within(n..self.overrun_len, 0);
        self.overrun_len -= n;
        n
    }

    fn read_run_bytes(&mut self, buf: &mut [u8], run: usize, control_offset: u64) -> Result<()> {
        let got = utils::fill_from(&mut self.reader, buf)?;
        self.consumed += got as u64;
        if got < buf.len() {
            return Err(truncated_run(control_offset, run, got));
        }
        Ok(())
    }
}

fn truncated_run(offset: u64, expected: usize, found: usize) -> AmiraError {
    AmiraError::TruncatedStream {
        context: format!("RLE run at payload offset {}", offset),
        expected: expected as u64,
        found: found as u64,
    }
}

/// RLE-encodes `data`.
///
/// A repeat run starts wherever the next byte equals the current one; otherwise a
/// literal run extends up to the byte before the next pair of equal neighbours. A
/// single trailing byte is written as a repeat run of length 1.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / MAX_RUN + 2);
    let mut i = 0;

    while i < data.len() {
        if i + 1 == data.len() {
            out.push(1);
            out.push(data[i]);
            i += 1;
        } else if data[i] == data[i + 1] {
            let run = repeat_len(&data[i..]);
            out.push(run as u8);
            out.push(data[i]);
            i += run;
        } else {
            let run = literal_len(&data[i..]);
            out.push(run as u8 | LITERAL_FLAG);
            out.extend_from_slice(&data[i..i + run]);
            i += run;
        }
    }

    out
}

/// RLE-encodes `data` into `writer`, returning the number of encoded bytes written.
pub fn encode_into<W: Write>(data: &[u8], writer: &mut W) -> Result<usize> {
    let encoded = encode(data);
    writer.write_all(&encoded)?;
    Ok(encoded.len())
}

fn repeat_len(data: &[u8]) -> usize {
    let first = data[0];
    data.iter()
        .take(MAX_RUN)
        .take_while(|&&b| b == first)
        .count()
}

fn literal_len(data: &[u8]) -> usize {
    let mut run = 1;
    while run < MAX_RUN && run < data.len() {
        if run + 1 < data.len() && data[run] == data[run + 1] {
            break;
        }
        run += 1;
    }
    run
}
