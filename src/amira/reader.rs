use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use log::{debug, info};

use super::codec::payload::PayloadDecoder;
use super::format::{header, table};
use super::iter::{self, SliceIterator};
use super::types::error::{AmiraError, Result};
use super::types::models::*;
use super::types::stack::{SliceSink, VolumeStack};

/// A decode session over one AmiraMesh file.
///
/// Opening parses the preamble; the payload is only touched by the consuming
/// `read_*` methods and [`slices`](Self::slices), so the file is released on
/// every exit path once one of them returns.
#[derive(Debug)]
pub struct AmiraMeshReader<R: Read + Seek = File> {
    reader: R,
    pub header: AmiraHeader,
    title: Option<String>,
}

impl AmiraMeshReader<File> {
    /// Opens an AmiraMesh file and parses its preamble.
    ///
    /// # Errors
    /// Returns an error if:
    /// - File cannot be opened
    /// - The first line does not identify an AmiraMesh or Avizo file
    /// - No lattice definition, ASCII marker or data section marker is found
    pub fn open(path: impl AsRef<Path>, options: DecodeOptions) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening AmiraMesh file: {}", path.display());
        let file = File::open(path)?;
        let mut reader = Self::from_reader(file, options)?;
        reader.title = path.file_name().map(|name| name.to_string_lossy().into_owned());
        Ok(reader)
    }
}

impl<R: Read + Seek> AmiraMeshReader<R> {
    /// Parses the preamble starting at the reader's current position.
    pub fn from_reader(mut reader: R, options: DecodeOptions) -> Result<Self> {
        let start = reader.stream_position()?;
        let header = {
            let mut buffered = BufReader::new(&mut reader);
            header::parse(&mut buffered, start, &options)?
        };
        Ok(Self {
            reader,
            header,
            title: None,
        })
    }

    pub fn is_table(&self) -> bool {
        self.header.is_table()
    }

    /// The lattice descriptor; fails for ASCII tables.
    pub fn descriptor(&self) -> Result<VolumeDescriptor> {
        self.header.descriptor()
    }

    pub fn color_table(&self) -> Option<ColorTable> {
        self.header.parameters.color_table()
    }

    /// Returns a memory-light iterator that decodes one slice per step.
    pub fn slices(mut self) -> Result<SliceIterator<R>> {
        let descriptor = self.header.descriptor()?;
        self.reader.seek(SeekFrom::Start(self.header.data_offset))?;
        let decoder = PayloadDecoder::new(self.reader, descriptor.mode)?;
        Ok(SliceIterator::new(decoder, descriptor))
    }

    /// Decodes slice by slice into `sink`, returning the number of slices delivered.
    ///
    /// On a truncated payload the slices before the short one stay in `sink` and
    /// the `TruncatedStream` error is returned.
    pub fn read_stack<S: SliceSink>(self, sink: &mut S) -> Result<usize> {
        self.read_stack_with_progress(sink, |_, _| {})
    }

    /// Like [`read_stack`](Self::read_stack), calling `progress(done, total)` after each slice.
    pub fn read_stack_with_progress<S, F>(self, sink: &mut S, mut progress: F) -> Result<usize>
    where
        S: SliceSink,
        F: FnMut(usize, usize),
    {
        let slices = self.slices()?;
        let total = slices.descriptor().num_slices;
        let mut delivered = 0;
        for slice in slices {
            sink.put_slice(slice?)?;
            delivered += 1;
            progress(delivered, total);
        }
        info!("Read {} slices", delivered);
        Ok(delivered)
    }

    /// Decodes the whole volume into one buffer first, then delivers the slices.
    ///
    /// Faster than [`read_stack`](Self::read_stack) at the cost of holding the
    /// volume twice. If the payload is short nothing is delivered.
    pub fn read_stack_fast<S: SliceSink>(self, sink: &mut S) -> Result<usize> {
        self.read_stack_fast_with_progress(sink, |_, _| {})
    }

    pub fn read_stack_fast_with_progress<S, F>(mut self, sink: &mut S, mut progress: F) -> Result<usize>
    where
        S: SliceSink,
        F: FnMut(usize, usize),
    {
        let descriptor = self.header.descriptor()?;
        let slice_len = descriptor.slice_len()?;
        let volume_len = descriptor.volume_len()?;

        self.reader.seek(SeekFrom::Start(self.header.data_offset))?;
        let mut decoder = PayloadDecoder::new(self.reader, descriptor.mode)?;
        let mut volume = vec![0u8; volume_len];
        let filled = decoder.fill(&mut volume)?;
        decoder.close()?;
        if filled < volume_len {
            return Err(AmiraError::TruncatedStream {
                context: "volume".to_string(),
                expected: volume_len as u64,
                found: filled as u64,
            });
        }
        debug!("Decoded {} bytes in one pass", volume_len);

        for (index, chunk) in volume.chunks_exact(slice_len).enumerate() {
            sink.put_slice(iter::into_slice(chunk.to_vec(), &descriptor))?;
            progress(index + 1, descriptor.num_slices);
        }
        info!("Read {} slices", descriptor.num_slices);
        Ok(descriptor.num_slices)
    }

    /// Decodes the volume into a new [`VolumeStack`] carrying the label flag and color table.
    pub fn read_volume(self) -> Result<VolumeStack> {
        let mut stack = VolumeStack::for_descriptor(&self.descriptor()?, &self.header.parameters);
        self.read_stack(&mut stack)?;
        Ok(stack)
    }

    /// [`read_volume`](Self::read_volume) using the whole-volume decode.
    pub fn read_volume_fast(self) -> Result<VolumeStack> {
        let mut stack = VolumeStack::for_descriptor(&self.descriptor()?, &self.header.parameters);
        self.read_stack_fast(&mut stack)?;
        Ok(stack)
    }

    /// Reads an `AmiraMesh 3D ASCII` spreadsheet.
    ///
    /// The row count is taken from the `numRows` parameter.
    pub fn read_table(mut self) -> Result<AmiraTable> {
        if !self.is_table() {
            return Err(AmiraError::Unsupported(
                "Reading a table from a lattice file".to_string(),
            ));
        }
        let num_rows = self
            .header
            .parameters
            .get_property("numRows")
            .ok_or_else(|| AmiraError::InvalidFormat("Table has no numRows parameter".to_string()))?
            .trim()
            .parse::<usize>()
            .map_err(|e| AmiraError::InvalidFormat(format!("Invalid numRows: {}", e)))?;

        self.reader.seek(SeekFrom::Start(self.header.data_offset))?;
        let rows = {
            let mut buffered = BufReader::new(&mut self.reader);
            table::read_rows(&mut buffered, &self.header.columns, num_rows)?
        };
        info!("Read table with {} columns and {} rows", self.header.columns.len(), rows.len());

        Ok(AmiraTable {
            title: self.title,
            columns: self.header.columns,
            rows,
            parameters: self.header.parameters,
        })
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}
