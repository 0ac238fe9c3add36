//! # amiramesh
//!
//! Reader and writer for AmiraMesh (`.am`) volume files.
//! Decodes raw, `HxByteRLE` and `HxZip` lattices slice by slice, reads
//! `AmiraMesh 3D ASCII` spreadsheets, and writes 8-bit stacks with a
//! backpatched stream length.
pub mod amira;

// Re-export the main types for convenience
pub use amira::{
    AmiraError,
    AmiraMeshReader,
    AmiraMeshWriter,
    AmiraParameters,
    Result,
    SliceIterator,
    SliceSink,
    SliceSource,
    VolumeStack,
    WriteSummary,
    models::{
        AmiraHeader,
        AmiraTable,
        ByteOrder,
        ColorTable,
        ColumnSpec,
        DecodeOptions,
        EncodeOptions,
        EncodingMode,
        Lattice,
        Slice,
        VolumeDescriptor,
    },
};
