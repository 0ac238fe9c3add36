//! Memory-light, slice-by-slice decoding.
//!
//! # Example
//! ```no_run
//! # use amiramesh::{AmiraMeshReader, DecodeOptions};
//! let reader = AmiraMeshReader::open("volume.am", DecodeOptions::default()).unwrap();
//! for slice in reader.slices().unwrap() {
//!     let slice = slice.unwrap();
//!     println!("{} pixels", slice.len());
//! }
//! ```

use std::io::Read;

use log::{debug, trace, warn};

use super::codec::payload::PayloadDecoder;
use super::types::error::{AmiraError, Result};
use super::types::models::{Slice, VolumeDescriptor};
use super::utils;

/// Iterator over the decoded slices of a lattice, one buffer per slice.
///
/// Yields `Err(TruncatedStream)` for a slice the payload cannot fill and ends
/// there; slices yielded before it are complete. The payload stream is closed
/// after the last slice or the first error.
///
/// Created by [`AmiraMeshReader::slices()`](crate::AmiraMeshReader::slices).
pub struct SliceIterator<R: Read> {
    decoder: PayloadDecoder<R>,
    descriptor: VolumeDescriptor,
    next_index: usize,
    finished: bool,
}

impl<R: Read> SliceIterator<R> {
    pub(super) fn new(decoder: PayloadDecoder<R>, descriptor: VolumeDescriptor) -> Self {
        Self {
            decoder,
            descriptor,
            next_index: 0,
            finished: false,
        }
    }

    pub fn descriptor(&self) -> &VolumeDescriptor {
        &self.descriptor
    }

    fn decode_next(&mut self) -> Result<Slice> {
        let len = self.descriptor.slice_len()?;
        let mut buffer = vec![0u8; len];
        let filled = self.decoder.fill(&mut buffer)?;
        if filled < len {
            return Err(AmiraError::TruncatedStream {
                context: format!("slice {} of {}", self.next_index + 1, self.descriptor.num_slices),
                expected: len as u64,
                found: filled as u64,
            });
        }
        trace!("Decoded slice {}", self.next_index + 1);
        Ok(into_slice(buffer, &self.descriptor))
    }
}

impl<R: Read> Iterator for SliceIterator<R> {
    type Item = Result<Slice>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.next_index >= self.descriptor.num_slices {
            return None;
        }

        let result = self.decode_next();
        self.next_index += 1;

        if result.is_err() || self.next_index == self.descriptor.num_slices {
            self.finished = true;
            match self.decoder.close() {
                Ok(()) => debug!("Payload stream closed after {} slices", self.next_index),
                Err(e) if result.is_ok() => return Some(Err(e)),
                Err(e) => warn!("Failed to close payload stream: {}", e),
            }
        }

        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            return (0, Some(0));
        }
        let remaining = self.descriptor.num_slices - self.next_index;
        (0, Some(remaining))
    }
}

/// Converts a filled slice buffer to its element type.
pub(crate) fn into_slice(bytes: Vec<u8>, descriptor: &VolumeDescriptor) -> Slice {
    if descriptor.element_width == 2 {
        Slice::Shorts(utils::shorts_from_bytes(&bytes, descriptor.byte_order))
    } else {
        Slice::Bytes(bytes)
    }
}
