//! Core data structures for AmiraMesh files.
//!
//! This module defines the fundamental types used throughout the library:
//! - Header metadata (lattice dimensions, element width, byte order, mode)
//! - Decoded slices and ASCII tables
//! - Session options for decoding and encoding

use std::fmt;

use super::error::{AmiraError, Result};
use crate::amira::format::parameters::AmiraParameters;

/// Byte order of multi-byte lattice elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// The byte order of the host platform.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::native()
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteOrder::Little => write!(f, "little-endian"),
            ByteOrder::Big => write!(f, "big-endian"),
        }
    }
}

/// How the payload following the preamble is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodingMode {
    /// Uncompressed bytes, slice-major then row-major.
    #[default]
    Raw,
    /// The `HxByteRLE` run-length scheme.
    Rle,
    /// A single zlib stream (`HxZip`).
    Zlib,
    /// An `AmiraMesh 3D ASCII` spreadsheet.
    AsciiTable,
}

impl EncodingMode {
    /// The tag written after the `@1` marker in the `Lattice` declaration, if any.
    pub fn stream_tag(self) -> Option<&'static str> {
        match self {
            EncodingMode::Rle => Some("HxByteRLE"),
            EncodingMode::Zlib => Some("HxZip"),
            EncodingMode::Raw | EncodingMode::AsciiTable => None,
        }
    }
}

impl fmt::Display for EncodingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EncodingMode::Raw => "raw",
            EncodingMode::Rle => "rle",
            EncodingMode::Zlib => "zlib",
            EncodingMode::AsciiTable => "ascii-table",
        };
        f.write_str(name)
    }
}

/// Dimensions from a `define Lattice W H S` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lattice {
    pub width: usize,
    pub height: usize,
    pub num_slices: usize,
}

/// Everything needed to decode or encode the slices of a lattice volume.
///
/// Immutable once the preamble has been parsed or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeDescriptor {
    pub width: usize,
    pub height: usize,
    pub num_slices: usize,
    /// 1 for `byte` lattices, 2 for `short`/`ushort`.
    pub element_width: usize,
    pub byte_order: ByteOrder,
    pub mode: EncodingMode,
}

impl VolumeDescriptor {
    /// Number of payload bytes in one decoded slice.
    pub fn slice_len(&self) -> Result<usize> {
        self.width
            .checked_mul(self.height)
            .and_then(|n| n.checked_mul(self.element_width))
            .ok_or_else(|| {
                AmiraError::InvalidFormat(format!(
                    "Slice size overflows: {}x{}x{} bytes",
                    self.width, self.height, self.element_width
                ))
            })
    }

    /// Number of payload bytes in the whole decoded volume.
    pub fn volume_len(&self) -> Result<usize> {
        self.slice_len()?
            .checked_mul(self.num_slices)
            .ok_or_else(|| {
                AmiraError::InvalidFormat(format!(
                    "Volume size overflows: {} slices",
                    self.num_slices
                ))
            })
    }
}

/// Parsed AmiraMesh preamble.
#[derive(Debug, Clone)]
pub struct AmiraHeader {
    pub mode: EncodingMode,
    /// `None` for ASCII tables, which carry no lattice line.
    pub lattice: Option<Lattice>,
    pub element_width: usize,
    pub byte_order: ByteOrder,
    /// The raw text from the `Parameters` line up to the data marker.
    pub parameter_text: String,
    pub parameters: AmiraParameters,
    /// Column declarations; empty unless `mode` is `AsciiTable`.
    pub columns: Vec<ColumnSpec>,
    /// Length captured from `HxZip,<N>`, when present.
    pub compressed_length: Option<u64>,
    /// Absolute file offset of the first payload byte.
    pub data_offset: u64,
}

impl AmiraHeader {
    pub fn is_table(&self) -> bool {
        self.mode == EncodingMode::AsciiTable
    }

    /// Returns the volume descriptor of a lattice file.
    ///
    /// # Errors
    /// Fails with `Unsupported` for ASCII tables.
    pub fn descriptor(&self) -> Result<VolumeDescriptor> {
        let lattice = self.lattice.ok_or_else(|| {
            AmiraError::Unsupported("ASCII table files have no lattice".to_string())
        })?;
        Ok(VolumeDescriptor {
            width: lattice.width,
            height: lattice.height,
            num_slices: lattice.num_slices,
            element_width: self.element_width,
            byte_order: self.byte_order,
            mode: self.mode,
        })
    }
}

/// One decoded slice of a lattice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slice {
    Bytes(Vec<u8>),
    /// 16-bit elements with their raw bit pattern, for both `short` and `ushort`.
    Shorts(Vec<u16>),
}

impl Slice {
    /// Number of elements (pixels) in the slice.
    pub fn len(&self) -> usize {
        match self {
            Slice::Bytes(b) => b.len(),
            Slice::Shorts(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Slice::Bytes(b) => Some(b),
            Slice::Shorts(_) => None,
        }
    }
}

/// RGB lookup table for label fields, indexed by label value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
    pub entries: Vec<[u8; 3]>,
}

/// A column declaration of an ASCII table, e.g. `ID { int ID } @1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    /// `byte` for zero-terminated character code sequences, otherwise a scalar type.
    pub format: String,
}

impl ColumnSpec {
    pub fn is_byte_string(&self) -> bool {
        self.format == "byte"
    }
}

/// A decoded `AmiraMesh 3D ASCII` spreadsheet.
#[derive(Debug, Clone)]
pub struct AmiraTable {
    /// File name the table was read from, when known.
    pub title: Option<String>,
    pub columns: Vec<ColumnSpec>,
    /// Tab-joined cells, one string per row, in file order.
    pub rows: Vec<String>,
    pub parameters: AmiraParameters,
}

impl AmiraTable {
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Tab-joined column names.
    pub fn headings(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join("\t")
    }

    /// Newline-joined rows.
    pub fn body(&self) -> String {
        self.rows.join("\n")
    }
}

/// Options for a decode session.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Byte order assumed when the first line names neither `LITTLE-ENDIAN` nor `BIG-ENDIAN`.
    pub default_byte_order: ByteOrder,
}

/// Options for an encode session.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeOptions {
    /// Payload encoding. `None` picks RLE for label fields and zlib otherwise.
    pub mode: Option<EncodingMode>,
    /// Copy every slice into one buffer and encode it in a single call.
    pub fast: bool,
}
