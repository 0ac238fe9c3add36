//! Core AmiraMesh codec module

pub mod codec;
pub mod format;
pub mod iter;
pub mod reader;
pub mod types;
pub mod utils;
pub mod writer;

pub use format::parameters::{AmiraParameters, ParamValue};
pub use iter::SliceIterator;
pub use reader::AmiraMeshReader;
pub use types::error::{AmiraError, Result};
pub use types::models;
pub use types::stack::{SliceSink, SliceSource, VolumeStack};
pub use writer::{AmiraMeshWriter, WriteSummary};
