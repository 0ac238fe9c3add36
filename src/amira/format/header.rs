//! AmiraMesh preamble parsing and writing.
//!
//! # Preamble Structure
//! ```text
//! # AmiraMesh 3D BINARY 2.0                 ← identifying comment (byte order hint)
//! define Lattice 256 256 100                ← dimensions
//! Parameters {                              ← free-text parameter block
//!     ...
//! }
//! Lattice { byte Data } @1(HxZip,123456)   ← element type and encoding tag
//! @1                                        ← payload starts after this line
//! ```
//!
//! ASCII spreadsheets start with `# AmiraMesh 3D ASCII` and have no lattice line.

use std::io::{BufRead, Seek, Write};
use std::sync::OnceLock;

use log::{debug, info, trace, warn};
use regex::Regex;

use crate::amira::codec::compression;
use crate::amira::format::parameters::AmiraParameters;
use crate::amira::format::table;
use crate::amira::types::error::{AmiraError, Result};
use crate::amira::types::models::{
    AmiraHeader, ByteOrder, DecodeOptions, EncodingMode, Lattice, VolumeDescriptor,
};
use crate::amira::utils;

static FIRST_LINE_PATTERN: OnceLock<Regex> = OnceLock::new();
static LATTICE_PATTERN: OnceLock<Regex> = OnceLock::new();
static ELEMENT_TYPE_PATTERN: OnceLock<Regex> = OnceLock::new();
static ZIP_PATTERN: OnceLock<Regex> = OnceLock::new();

fn first_line_regex() -> &'static Regex {
    FIRST_LINE_PATTERN.get_or_init(|| Regex::new(r"^\s*#.*AmiraMesh").expect("Invalid first line pattern"))
}

fn lattice_regex() -> &'static Regex {
    LATTICE_PATTERN.get_or_init(|| {
        Regex::new(r"^define Lattice ([0-9]+) ([0-9]+) ([0-9]+)").expect("Invalid lattice pattern")
    })
}

fn element_type_regex() -> &'static Regex {
    ELEMENT_TYPE_PATTERN
        .get_or_init(|| Regex::new(r"^Lattice \{\s*(\w+)").expect("Invalid element type pattern"))
}

fn zip_regex() -> &'static Regex {
    ZIP_PATTERN.get_or_init(|| Regex::new(r"HxZip,([0-9]+)").expect("Invalid HxZip pattern"))
}

const ASCII_MARKER: &str = "# AmiraMesh 3D ASCII";
const AVIZO_MARKER: &str = "# Avizo";
const RLE_TAG: &str = "HxByteRLE";

/// Line reader that tracks the absolute offset of the next unread byte.
struct PreambleLines<'a, R: BufRead> {
    reader: &'a mut R,
    offset: u64,
}

impl<R: BufRead> PreambleLines<'_, R> {
    fn next_line(&mut self) -> Result<Option<String>> {
        match utils::read_line(self.reader)? {
            Some((line, consumed)) => {
                self.offset += consumed;
                trace!("Preamble line at {}: {:?}", self.offset - consumed, line);
                Ok(Some(line))
            }
            None => Ok(None),
        }
    }
}

/// Parses the preamble from a reader positioned at `start_offset`.
///
/// On success the returned header's `data_offset` is the absolute offset of the
/// first payload byte. The reader itself may have buffered past that point.
///
/// # Errors
/// - `InvalidFormat` if the first non-empty line does not identify an AmiraMesh
///   file, the lattice line or data marker is missing, or a dimension is zero
/// - `Io` on read failure
pub fn parse<R: BufRead>(reader: &mut R, start_offset: u64, options: &DecodeOptions) -> Result<AmiraHeader> {
    info!("Parsing AmiraMesh preamble");
    let mut lines = PreambleLines {
        reader,
        offset: start_offset,
    };

    // Step 1: identifying comment
    let first = loop {
        match lines.next_line()? {
            Some(line) if line.trim().is_empty() => continue,
            Some(line) => break line,
            None => return Err(AmiraError::InvalidFormat("Empty file".to_string())),
        }
    };
    if !first_line_regex().is_match(&first) && !first.starts_with(AVIZO_MARKER) {
        return Err(AmiraError::InvalidFormat(format!(
            "Not an AmiraMesh file; the first line must be a comment containing 'AmiraMesh' or 'Avizo', found {:?}",
            first
        )));
    }
    let byte_order = if first.contains("LITTLE-ENDIAN") {
        ByteOrder::Little
    } else if first.contains("BIG-ENDIAN") {
        ByteOrder::Big
    } else {
        options.default_byte_order
    };
    debug!("Byte order: {}", byte_order);

    // Step 2: lattice definition or ASCII marker
    let mut lattice = None;
    let mut current = Some(first);
    while let Some(line) = current.take() {
        if line.starts_with(ASCII_MARKER) {
            debug!("ASCII table file");
            break;
        }
        if let Some(caps) = lattice_regex().captures(&line) {
            lattice = Some(parse_lattice(&caps[1], &caps[2], &caps[3])?);
            break;
        }
        if line.starts_with('@') {
            return Err(AmiraError::InvalidFormat(
                "Data section marker found before the lattice definition".to_string(),
            ));
        }
        current = lines.next_line()?;
        if current.is_none() {
            return Err(AmiraError::InvalidFormat(
                "No 'define Lattice' line or ASCII marker found".to_string(),
            ));
        }
    }

    // Step 3: element type, parameter text and data marker
    let mut element_width = 1;
    let mut parameter_lines: Vec<String> = Vec::new();
    let mut other_lines: Vec<String> = Vec::new();
    let mut in_parameters = false;
    let data_offset = loop {
        let line = lines.next_line()?.ok_or_else(|| {
            AmiraError::InvalidFormat("No data section marker ('@1') found".to_string())
        })?;
        if line.starts_with('@') {
            break lines.offset;
        }
        if lattice.is_some() && lattice_regex().is_match(&line) {
            warn!("Ignoring repeated lattice definition: {:?}", line);
        }
        if let Some(caps) = element_type_regex().captures(&line) {
            match &caps[1] {
                "short" | "ushort" => element_width = 2,
                "byte" => {}
                other => warn!("Unsupported lattice element type '{}', reading as bytes", other),
            }
        }
        if !in_parameters && line.len() >= 11 && line.starts_with("Parameters") {
            in_parameters = true;
        }
        if in_parameters {
            parameter_lines.push(line);
        } else {
            other_lines.push(line);
        }
    };
    let parameter_text = parameter_lines.join("\n");
    let parameters = match AmiraParameters::parse(&parameter_text) {
        Ok(parameters) => parameters,
        Err(e) => {
            warn!("Ignoring unparsable Parameters block: {}", e);
            AmiraParameters::default()
        }
    };

    // Step 4: encoding mode, scanned over the parameter text (or the whole
    // remaining preamble when there is no Parameters block)
    let scan_text = if in_parameters {
        parameter_text.clone()
    } else {
        other_lines.join("\n")
    };
    let mut compressed_length = None;
    let mut columns = Vec::new();
    let mode = match lattice {
        None => {
            columns = table::parse_columns(&scan_text)?;
            EncodingMode::AsciiTable
        }
        Some(_) => {
            if let Some(caps) = zip_regex().captures(&scan_text) {
                compressed_length = caps[1].parse::<u64>().ok();
                EncodingMode::Zlib
            } else if scan_text.contains(RLE_TAG) {
                EncodingMode::Rle
            } else {
                EncodingMode::Raw
            }
        }
    };

    info!(
        "Preamble parsed: mode={}, lattice={:?}, element_width={}, data_offset={}",
        mode, lattice, element_width, data_offset
    );

    Ok(AmiraHeader {
        mode,
        lattice,
        element_width,
        byte_order,
        parameter_text,
        parameters,
        columns,
        compressed_length,
        data_offset,
    })
}

fn parse_lattice(width: &str, height: &str, slices: &str) -> Result<Lattice> {
    let dim = |text: &str| -> Result<usize> {
        match text.parse::<usize>() {
            Ok(0) => Err(AmiraError::InvalidFormat("Lattice dimensions must be positive".to_string())),
            Ok(n) => Ok(n),
            Err(e) => Err(AmiraError::InvalidFormat(format!("Invalid lattice dimension {:?}: {}", text, e))),
        }
    };
    Ok(Lattice {
        width: dim(width)?,
        height: dim(height)?,
        num_slices: dim(slices)?,
    })
}

/// Offsets recorded while writing a preamble.
#[derive(Debug, Clone, Copy)]
pub struct PreambleLayout {
    /// Offset of the blank length field, for RLE and zlib payloads.
    pub length_field_offset: Option<u64>,
    /// Offset of the first payload byte.
    pub data_offset: u64,
}

/// Writes a binary byte-lattice preamble.
pub fn write<W: Write + Seek>(
    writer: &mut W,
    descriptor: &VolumeDescriptor,
    parameters: &AmiraParameters,
) -> Result<PreambleLayout> {
    let date = chrono::Local::now().format("%a %b %e %H:%M:%S %Y");
    let content = if descriptor.mode == EncodingMode::Rle { "Labels" } else { "Data" };
    write!(
        writer,
        "# AmiraMesh 3D BINARY 2.0\n\
         # CreationDate: {}\n\
         \n\
         define Lattice {} {} {}\n\
         \n\
         Parameters {{\n\
         {}}}\n\
         \n\
         Lattice {{ byte {} }} @1",
        date,
        descriptor.width,
        descriptor.height,
        descriptor.num_slices,
        parameters.to_text(),
        content
    )?;

    let length_field_offset = match descriptor.mode.stream_tag() {
        Some(tag) => {
            write!(writer, "({},", tag)?;
            Some(compression::reserve_length_field(writer)?)
        }
        None => None,
    };
    writer.write_all(b"\n\n# Data section follows\n@1\n")?;
    let data_offset = writer.stream_position()?;

    debug!(
        "Preamble written: mode={}, length field at {:?}, data at {}",
        descriptor.mode, length_field_offset, data_offset
    );
    Ok(PreambleLayout {
        length_field_offset,
        data_offset,
    })
}
