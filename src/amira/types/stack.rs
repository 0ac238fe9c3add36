//! Boundary to the image container that receives decoded slices and supplies
//! slices to encode.

use super::error::{AmiraError, Result};
use super::models::{ColorTable, Slice, VolumeDescriptor};
use crate::amira::format::parameters::AmiraParameters;

/// Receives decoded slices in slice order.
pub trait SliceSink {
    fn put_slice(&mut self, slice: Slice) -> Result<()>;
}

/// Supplies 8-bit slices to the encoder.
pub trait SliceSource {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn slice_count(&self) -> usize;

    /// Pixels of slice `index` (0-based), or `None` if the slice holds no byte data.
    fn slice(&self, index: usize) -> Option<&[u8]>;

    /// Label fields are written with RLE unless a mode is forced.
    fn is_label_field(&self) -> bool {
        false
    }
}

/// A plain in-memory stack of slices.
#[derive(Debug, Clone, Default)]
pub struct VolumeStack {
    pub width: usize,
    pub height: usize,
    pub slices: Vec<Slice>,
    pub color_table: Option<ColorTable>,
    pub label_field: bool,
}

impl VolumeStack {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Creates an empty stack for a decoded volume.
    ///
    /// The stack is a label field when `parameters` carry a `Materials` group,
    /// whether or not any material declares a color.
    pub fn for_descriptor(descriptor: &VolumeDescriptor, parameters: &AmiraParameters) -> Self {
        Self {
            width: descriptor.width,
            height: descriptor.height,
            slices: Vec::with_capacity(descriptor.num_slices),
            color_table: parameters.color_table(),
            label_field: parameters.is_label_field(),
        }
    }

    /// Builds a byte stack from raw slices; every slice must be `width * height` long.
    pub fn from_byte_slices(width: usize, height: usize, slices: Vec<Vec<u8>>) -> Result<Self> {
        let expected = pixels_per_slice(width, height)?;
        if let Some(bad) = slices.iter().find(|s| s.len() != expected) {
            return Err(AmiraError::SizeMismatch {
                context: "stack slice".to_string(),
                expected: expected as u64,
                found: bad.len() as u64,
            });
        }
        Ok(Self {
            width,
            height,
            slices: slices.into_iter().map(Slice::Bytes).collect(),
            ..Self::default()
        })
    }

    pub fn with_label_field(mut self, label_field: bool) -> Self {
        self.label_field = label_field;
        self
    }
}

impl SliceSink for VolumeStack {
    fn put_slice(&mut self, slice: Slice) -> Result<()> {
        let expected = pixels_per_slice(self.width, self.height)?;
        if slice.len() != expected {
            return Err(AmiraError::SizeMismatch {
                context: format!("slice {}", self.slices.len() + 1),
                expected: expected as u64,
                found: slice.len() as u64,
            });
        }
        self.slices.push(slice);
        Ok(())
    }
}

impl SliceSource for VolumeStack {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn slice_count(&self) -> usize {
        self.slices.len()
    }

    fn slice(&self, index: usize) -> Option<&[u8]> {
        self.slices.get(index).and_then(Slice::as_bytes)
    }

    fn is_label_field(&self) -> bool {
        self.label_field
    }
}

fn pixels_per_slice(width: usize, height: usize) -> Result<usize> {
    width.checked_mul(height).ok_or_else(|| {
        AmiraError::InvalidFormat(format!("Slice size overflows: {}x{} pixels", width, height))
    })
}
