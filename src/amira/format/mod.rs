//! File format layer for AmiraMesh files.
//!
//! # Module Organization
//!
//! - [`header`]: Parses and writes the text preamble
//! - [`parameters`]: The `Parameters { … }` block as ordered key-value entries
//! - [`table`]: Column declarations and body of ASCII spreadsheets
//!
//! # Architecture
//!
//! ```text
//! File Structure:
//! ┌──────────────────┐
//! │  Text Preamble   │ ← header::parse() / header::write()
//! │  (Parameters,    │ ← parameters::AmiraParameters
//! │   columns)       │ ← table::parse_columns()
//! ├──────────────────┤
//! │  Payload         │ ← codec::payload (binary lattices)
//! │                  │ ← table::read_rows() (ASCII tables)
//! └──────────────────┘
//! ```

pub mod header;
pub mod parameters;
pub mod table;
