//! Custom error types for the amiramesh crate.

use thiserror::Error;

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum AmiraError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    /// The file is structurally invalid or does not look like an AmiraMesh file.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// An RLE control byte of zero was read. Valid runs are 1..=127 long.
    #[error("Invalid RLE control byte 0 at payload offset {offset}")]
    ZeroControlByte { offset: u64 },

    /// The payload ended before the declared amount of data was decoded.
    #[error("Truncated stream in {context}: expected {expected} bytes, but only {found} were available")]
    TruncatedStream {
        context: String,
        expected: u64,
        found: u64,
    },

    /// A buffer handed to the codec has an unexpected size.
    #[error("Size mismatch for {context}: expected {expected} bytes, but found {found} bytes")]
    SizeMismatch {
        context: String,
        expected: u64,
        found: u64,
    },

    /// The requested operation is not available for this file or data type.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A compression stream was used after it had been finished.
    #[error("Compression stream used after it was closed")]
    StreamClosed,
}

/// A convenience `Result` type alias using the crate's `AmiraError` type.
pub type Result<T> = std::result::Result<T, AmiraError>;
