//! Codec layer for AmiraMesh payloads.
//!
//! # Submodules
//!
//! - [`rle`][]: The `HxByteRLE` run-length scheme with overrun buffering
//! - [`compression`][]: Zlib framing (`HxZip`) and the stream-length backpatch
//! - [`payload`][]: Dispatch between raw, RLE and zlib per encoding mode

pub mod compression;
pub mod payload;
pub mod rle;
