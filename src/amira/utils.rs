//! Low-level reading utilities.

use std::io::{self, BufRead, ErrorKind, Read};

use byteorder::{BigEndian, ByteOrder as _, LittleEndian};

use super::types::models::ByteOrder;

/// Reads into `buf` until it is full or the reader reports end of stream.
///
/// Returns the number of bytes read; a short count means end of stream.
pub fn fill_from<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Reads one text line terminated by LF, CR LF or end of stream.
///
/// Returns the line without its terminator and the number of bytes consumed, or
/// `None` at end of stream. Bytes are mapped one-to-one onto chars (Latin-1), so
/// header text never fails to decode.
pub fn read_line<R: BufRead + ?Sized>(reader: &mut R) -> io::Result<Option<(String, u64)>> {
    let mut raw = Vec::new();
    let consumed = reader.read_until(b'\n', &mut raw)?;
    if consumed == 0 {
        return Ok(None);
    }
    if raw.last() == Some(&b'\n') {
        raw.pop();
    }
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }
    let line = raw.iter().map(|&b| b as char).collect();
    Ok(Some((line, consumed as u64)))
}

/// Reinterprets a byte buffer as 16-bit elements in the given byte order.
///
/// A trailing odd byte is ignored.
pub fn shorts_from_bytes(bytes: &[u8], order: ByteOrder) -> Vec<u16> {
    let mut shorts = vec![0u16; bytes.len() / 2];
    let even = &bytes[..shorts.len() * 2];
    match order {
        ByteOrder::Little => LittleEndian::read_u16_into(even, &mut shorts),
        ByteOrder::Big => BigEndian::read_u16_into(even, &mut shorts),
    }
    shorts
}
