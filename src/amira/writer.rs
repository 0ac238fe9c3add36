use std::fs::{File, OpenOptions};
use std::io::{Seek, Write};
use std::path::Path;

use log::{debug, info, trace};

use super::codec::compression::{self, Truncate};
use super::codec::payload::PayloadEncoder;
use super::format::header;
use super::format::parameters::AmiraParameters;
use super::types::error::{AmiraError, Result};
use super::types::models::{ByteOrder, EncodeOptions, EncodingMode, VolumeDescriptor};
use super::types::stack::SliceSource;

/// Outcome of an encode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub mode: EncodingMode,
    /// Offset of the first payload byte.
    pub data_offset: u64,
    /// Payload bytes written after `data_offset`.
    pub payload_length: u64,
}

/// Writes 8-bit stacks as binary AmiraMesh files.
pub struct AmiraMeshWriter<W: Write + Seek + Truncate = File> {
    writer: W,
    options: EncodeOptions,
}

impl AmiraMeshWriter<File> {
    /// Creates (or reuses) the file at `path`.
    ///
    /// An existing file is not truncated up front; it is cut back to the end of
    /// the new payload once writing completes.
    pub fn create(path: impl AsRef<Path>, options: EncodeOptions) -> Result<Self> {
        let path = path.as_ref();
        info!("Creating AmiraMesh file: {}", path.display());
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(Self::new(file, options))
    }
}

impl<W: Write + Seek + Truncate> AmiraMeshWriter<W> {
    pub fn new(writer: W, options: EncodeOptions) -> Self {
        Self { writer, options }
    }

    /// Encodes every slice of `source`.
    ///
    /// `parameters` replaces the default `Content`/`CoordType` block.
    ///
    /// # Errors
    /// - `InvalidFormat` if a dimension is zero
    /// - `Unsupported` for the ASCII table mode or a slice without byte data
    /// - `SizeMismatch` if a slice is not `width * height` bytes
    /// - `Unsupported` if the stream length does not fit the header field
    pub fn write<S: SliceSource + ?Sized>(
        &mut self,
        source: &S,
        parameters: Option<&AmiraParameters>,
    ) -> Result<WriteSummary> {
        self.write_with_progress(source, parameters, |_, _| {})
    }

    /// Like [`write`](Self::write), calling `progress(done, total)` after each slice.
    pub fn write_with_progress<S, F>(
        &mut self,
        source: &S,
        parameters: Option<&AmiraParameters>,
        mut progress: F,
    ) -> Result<WriteSummary>
    where
        S: SliceSource + ?Sized,
        F: FnMut(usize, usize),
    {
        // Step 1: pick the mode and validate dimensions
        let mode = self.options.mode.unwrap_or(if source.is_label_field() {
            EncodingMode::Rle
        } else {
            EncodingMode::Zlib
        });
        if mode == EncodingMode::AsciiTable {
            return Err(AmiraError::Unsupported("Encoding ASCII tables".to_string()));
        }
        let descriptor = VolumeDescriptor {
            width: source.width(),
            height: source.height(),
            num_slices: source.slice_count(),
            element_width: 1,
            byte_order: ByteOrder::native(),
            mode,
        };
        if descriptor.width == 0 || descriptor.height == 0 || descriptor.num_slices == 0 {
            return Err(AmiraError::InvalidFormat(format!(
                "Cannot write an empty lattice ({}x{}x{})",
                descriptor.width, descriptor.height, descriptor.num_slices
            )));
        }
        let slice_len = descriptor.slice_len()?;
        info!(
            "Writing {}x{}x{} lattice as {}",
            descriptor.width, descriptor.height, descriptor.num_slices, mode
        );

        // Step 2: preamble
        let defaults;
        let parameters = match parameters {
            Some(parameters) => parameters,
            None => {
                defaults = AmiraParameters::for_lattice(descriptor.width, descriptor.height, descriptor.num_slices);
                &defaults
            }
        };
        self.writer.rewind()?;
        let layout = header::write(&mut self.writer, &descriptor, parameters)?;

        // Step 3: payload
        let total = descriptor.num_slices;
        let mut encoder = PayloadEncoder::new(&mut self.writer, mode)?;
        if self.options.fast {
            let mut volume = Vec::with_capacity(descriptor.volume_len()?);
            for index in 0..total {
                volume.extend_from_slice(checked_slice(source, index, slice_len)?);
                progress(index + 1, total);
            }
            debug!("Encoding {} bytes in one call", volume.len());
            encoder.write(&volume)?;
        } else {
            for index in 0..total {
                encoder.write(checked_slice(source, index, slice_len)?)?;
                trace!("Encoded slice {} of {}", index + 1, total);
                progress(index + 1, total);
            }
        }
        encoder.finish()?;

        // Step 4: length field and file end
        let payload_length = match layout.length_field_offset {
            Some(field_offset) => {
                compression::patch_stream_length(&mut self.writer, field_offset, layout.data_offset)?
            }
            None => {
                let eof = self.writer.stream_position()?;
                self.writer.flush()?;
                self.writer.set_len(eof)?;
                eof - layout.data_offset
            }
        };

        info!("Wrote {} payload bytes at offset {}", payload_length, layout.data_offset);
        Ok(WriteSummary {
            mode,
            data_offset: layout.data_offset,
            payload_length,
        })
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn checked_slice<S: SliceSource + ?Sized>(source: &S, index: usize, expected: usize) -> Result<&[u8]> {
    let slice = source.slice(index).ok_or_else(|| {
        AmiraError::Unsupported(format!(
            "Slice {} has no 8-bit data; 16-bit encode not supported",
            index + 1
        ))
    })?;
    if slice.len() != expected {
        return Err(AmiraError::SizeMismatch {
            context: format!("slice {}", index + 1),
            expected: expected as u64,
            found: slice.len() as u64,
        });
    }
    Ok(slice)
}
