use std::fs;
use std::io::Cursor;

use amiramesh::{
    AmiraError, AmiraMeshReader, AmiraMeshWriter, AmiraParameters, DecodeOptions, EncodeOptions,
    EncodingMode, Slice, SliceSink, SliceSource, VolumeStack,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn gradient_stack(width: usize, height: usize, num_slices: usize) -> VolumeStack {
    let slices = (0..num_slices)
        .map(|z| {
            (0..width * height)
                .map(|i| ((i % width + i / width + z) % 251) as u8)
                .collect()
        })
        .collect();
    VolumeStack::from_byte_slices(width, height, slices).expect("Failed to build gradient stack")
}

/// Uniformly random bytes; deflate cannot shrink these.
fn random_stack(width: usize, height: usize, num_slices: usize, seed: u64) -> VolumeStack {
    let mut rng = StdRng::seed_from_u64(seed);
    let slices = (0..num_slices)
        .map(|_| {
            let mut slice = vec![0u8; width * height];
            rng.fill(slice.as_mut_slice());
            slice
        })
        .collect();
    VolumeStack::from_byte_slices(width, height, slices).expect("Failed to build random stack")
}

/// Label-like data: long runs of a few values with some noise.
fn label_stack(width: usize, height: usize, num_slices: usize, seed: u64) -> VolumeStack {
    let mut rng = StdRng::seed_from_u64(seed);
    let slices = (0..num_slices)
        .map(|_| {
            let mut slice = Vec::with_capacity(width * height);
            while slice.len() < width * height {
                let value: u8 = rng.gen_range(0..4);
                let run = rng.gen_range(1..300).min(width * height - slice.len());
                slice.extend(std::iter::repeat(value).take(run));
                if rng.gen_bool(0.2) && slice.len() < width * height {
                    slice.push(rng.gen());
                }
            }
            slice
        })
        .collect();
    VolumeStack::from_byte_slices(width, height, slices)
        .expect("Failed to build label stack")
        .with_label_field(true)
}

fn encode(stack: &VolumeStack, options: EncodeOptions) -> (Vec<u8>, amiramesh::WriteSummary) {
    let mut writer = AmiraMeshWriter::new(Cursor::new(Vec::new()), options);
    let summary = writer.write(stack, None).expect("Failed to encode stack");
    (writer.into_inner().into_inner(), summary)
}

fn open(bytes: Vec<u8>) -> AmiraMeshReader<Cursor<Vec<u8>>> {
    AmiraMeshReader::from_reader(Cursor::new(bytes), DecodeOptions::default())
        .expect("Failed to parse written preamble")
}

fn byte_slices(stack: &VolumeStack) -> Vec<&[u8]> {
    (0..stack.slice_count())
        .map(|i| stack.slice(i).expect("Expected 8-bit slice"))
        .collect()
}

#[test]
fn zlib_round_trip_and_patched_length() {
    let stack = gradient_stack(64, 48, 5);
    let (bytes, summary) = encode(
        &stack,
        EncodeOptions {
            mode: Some(EncodingMode::Zlib),
            fast: false,
        },
    );

    assert_eq!(summary.mode, EncodingMode::Zlib);
    assert_eq!(summary.payload_length, bytes.len() as u64 - summary.data_offset);

    let reader = open(bytes);
    assert_eq!(reader.header.mode, EncodingMode::Zlib);
    assert_eq!(reader.header.compressed_length, Some(summary.payload_length));
    assert_eq!(reader.header.data_offset, summary.data_offset);

    let decoded = reader.read_volume().expect("Failed to decode zlib volume");
    assert_eq!(byte_slices(&decoded), byte_slices(&stack));
}

#[test]
fn zlib_round_trip_of_random_bytes() {
    let stack = random_stack(97, 61, 6, 2024);
    for fast in [false, true] {
        let (bytes, summary) = encode(
            &stack,
            EncodeOptions {
                mode: Some(EncodingMode::Zlib),
                fast,
            },
        );
        assert_eq!(summary.payload_length, bytes.len() as u64 - summary.data_offset);
        assert!(summary.payload_length >= (97 * 61 * 6) as u64, "random bytes should not compress");

        let reader = open(bytes.clone());
        assert_eq!(reader.header.compressed_length, Some(summary.payload_length));
        let streamed = reader.read_volume().expect("Failed to decode random zlib volume");
        assert_eq!(byte_slices(&streamed), byte_slices(&stack), "fast encode: {}", fast);

        let whole = open(bytes).read_volume_fast().expect("Failed to fast-decode random zlib volume");
        assert_eq!(byte_slices(&whole), byte_slices(&stack), "fast encode: {}", fast);
    }
}

#[test]
fn non_label_stack_defaults_to_zlib() {
    let stack = gradient_stack(8, 8, 2);
    let (_, summary) = encode(&stack, EncodeOptions::default());
    assert_eq!(summary.mode, EncodingMode::Zlib);
}

#[test]
fn label_field_defaults_to_rle() {
    let stack = label_stack(40, 30, 4, 7);
    let (bytes, summary) = encode(&stack, EncodeOptions::default());
    assert_eq!(summary.mode, EncodingMode::Rle);

    let reader = open(bytes);
    assert_eq!(reader.header.mode, EncodingMode::Rle);
    assert_eq!(reader.header.element_width, 1);

    let decoded = reader.read_volume().expect("Failed to decode RLE volume");
    assert_eq!(byte_slices(&decoded), byte_slices(&stack));
}

#[test]
fn fast_paths_match_streaming_paths() {
    for mode in [EncodingMode::Raw, EncodingMode::Rle, EncodingMode::Zlib] {
        let stack = label_stack(33, 17, 6, 42);
        let (streamed, _) = encode(&stack, EncodeOptions { mode: Some(mode), fast: false });
        let (fast, _) = encode(&stack, EncodeOptions { mode: Some(mode), fast: true });

        let slow_decoded = open(streamed).read_volume().expect("Failed to decode streamed file");
        let fast_decoded = open(fast).read_volume_fast().expect("Failed to decode fast file");
        assert_eq!(byte_slices(&slow_decoded), byte_slices(&stack), "mode {}", mode);
        assert_eq!(byte_slices(&fast_decoded), byte_slices(&stack), "mode {}", mode);
    }
}

#[test]
fn raw_payload_is_the_volume_verbatim() {
    let stack = gradient_stack(10, 10, 5);
    let (bytes, summary) = encode(
        &stack,
        EncodeOptions {
            mode: Some(EncodingMode::Raw),
            fast: false,
        },
    );

    assert_eq!(summary.payload_length, 500);
    let payload = &bytes[summary.data_offset as usize..];
    assert_eq!(payload, byte_slices(&stack).concat().as_slice());
}

#[test]
fn truncated_raw_payload_fails_after_complete_slices() {
    let stack = gradient_stack(10, 10, 5);
    let (mut bytes, _) = encode(
        &stack,
        EncodeOptions {
            mode: Some(EncodingMode::Raw),
            fast: false,
        },
    );
    bytes.truncate(bytes.len() - 10);

    // Streaming: four slices, then the error
    let results: Vec<_> = open(bytes.clone()).slices().expect("Failed to start decoding").collect();
    assert_eq!(results.len(), 5);
    assert!(results[..4].iter().all(|r| r.is_ok()));
    match &results[4] {
        Err(AmiraError::TruncatedStream { expected, found, .. }) => {
            assert_eq!(*expected, 100);
            assert_eq!(*found, 90);
        }
        other => panic!("Expected TruncatedStream, got {:?}", other),
    }

    let mut partial = VolumeStack::new(10, 10);
    assert!(matches!(
        open(bytes.clone()).read_stack(&mut partial),
        Err(AmiraError::TruncatedStream { .. })
    ));
    assert_eq!(partial.slices.len(), 4);

    // Fast: nothing is delivered
    let mut nothing = VolumeStack::new(10, 10);
    assert!(matches!(
        open(bytes).read_stack_fast(&mut nothing),
        Err(AmiraError::TruncatedStream { .. })
    ));
    assert!(nothing.slices.is_empty());
}

#[test]
fn truncated_zlib_payload_is_a_truncated_stream() {
    let stack = random_stack(128, 128, 8, 11);
    let (mut bytes, summary) = encode(
        &stack,
        EncodeOptions {
            mode: Some(EncodingMode::Zlib),
            fast: false,
        },
    );
    bytes.truncate(summary.data_offset as usize + summary.payload_length as usize / 2);

    let results: Vec<_> = open(bytes.clone()).slices().expect("Failed to start decoding").collect();
    let first_error = results
        .iter()
        .position(|r| r.is_err())
        .expect("Truncated zlib payload should fail");
    assert!(first_error > 0, "Slices before the cut should decode");
    assert_eq!(results.len(), first_error + 1);
    match &results[first_error] {
        Err(AmiraError::TruncatedStream { .. }) => {}
        other => panic!("Expected TruncatedStream, got {:?}", other),
    }

    match open(bytes.clone()).read_volume() {
        Err(AmiraError::TruncatedStream { .. }) => {}
        other => panic!("Expected TruncatedStream from read_volume, got {:?}", other.map(|s| s.slices.len())),
    }

    let mut nothing = VolumeStack::new(128, 128);
    match open(bytes).read_stack_fast(&mut nothing) {
        Err(AmiraError::TruncatedStream { expected, found, .. }) => {
            assert_eq!(expected, 128 * 128 * 8);
            assert!(found < expected);
        }
        other => panic!("Expected TruncatedStream from read_stack_fast, got {:?}", other),
    }
    assert!(nothing.slices.is_empty());
}

#[test]
fn stale_trailing_bytes_are_cut() {
    let stack = gradient_stack(4, 4, 2);
    let mut writer = AmiraMeshWriter::new(
        Cursor::new(vec![0xAB; 50_000]),
        EncodeOptions {
            mode: Some(EncodingMode::Rle),
            fast: false,
        },
    );
    let summary = writer.write(&stack, None).expect("Failed to encode over stale data");
    let bytes = writer.into_inner().into_inner();

    assert_eq!(bytes.len() as u64, summary.data_offset + summary.payload_length);
    let decoded = open(bytes).read_volume().expect("Failed to decode");
    assert_eq!(byte_slices(&decoded), byte_slices(&stack));
}

#[test]
fn overwriting_a_larger_file_on_disk() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("volume.am");
    fs::write(&path, vec![0x55; 100_000]).expect("Failed to write stale file");

    let stack = label_stack(20, 20, 3, 1);
    let summary = AmiraMeshWriter::create(&path, EncodeOptions::default())
        .expect("Failed to create writer")
        .write(&stack, None)
        .expect("Failed to write volume");

    let len = fs::metadata(&path).expect("Failed to stat output").len();
    assert_eq!(len, summary.data_offset + summary.payload_length);

    let decoded = AmiraMeshReader::open(&path, DecodeOptions::default())
        .expect("Failed to open written file")
        .read_volume()
        .expect("Failed to decode written file");
    assert_eq!(byte_slices(&decoded), byte_slices(&stack));
}

#[test]
fn parameters_are_written_and_read_back() {
    let text = "Parameters {\n\
        Materials {\n\
            Exterior {\n\
                Id 0,\n\
                Color 0 0 0\n\
            }\n\
            Bone {\n\
                Id 1,\n\
                Color 1 1 0\n\
            }\n\
        }\n\
        Content \"6x6x2 byte, uniform coordinates\"\n\
    }\n";
    let parameters = AmiraParameters::parse(text).expect("Failed to parse parameters");

    let stack = label_stack(6, 6, 2, 3);
    let mut writer = AmiraMeshWriter::new(Cursor::new(Vec::new()), EncodeOptions::default());
    writer.write(&stack, Some(&parameters)).expect("Failed to encode");

    let reader = open(writer.into_inner().into_inner());
    assert_eq!(reader.header.parameters, parameters);
    let colors = reader.color_table().expect("Expected a color table");
    assert_eq!(colors.entries[1], [255, 255, 0]);
}

#[test]
fn progress_is_reported_per_slice() {
    let stack = gradient_stack(5, 5, 7);
    let mut written = Vec::new();
    let mut writer = AmiraMeshWriter::new(Cursor::new(Vec::new()), EncodeOptions::default());
    writer
        .write_with_progress(&stack, None, |done, total| written.push((done, total)))
        .expect("Failed to encode");
    assert_eq!(written, (1..=7).map(|i| (i, 7)).collect::<Vec<_>>());

    let mut read = Vec::new();
    let mut sink = VolumeStack::new(5, 5);
    open(writer.into_inner().into_inner())
        .read_stack_with_progress(&mut sink, |done, total| read.push((done, total)))
        .expect("Failed to decode");
    assert_eq!(read, written);
}

#[test]
fn sixteen_bit_stacks_cannot_be_encoded() {
    let mut stack = VolumeStack::new(2, 2);
    stack.slices.push(Slice::Shorts(vec![1, 2, 3, 4]));

    let mut writer = AmiraMeshWriter::new(Cursor::new(Vec::new()), EncodeOptions::default());
    assert!(matches!(writer.write(&stack, None), Err(AmiraError::Unsupported(_))));
}

struct RaggedSource {
    slices: Vec<Vec<u8>>,
}

impl SliceSource for RaggedSource {
    fn width(&self) -> usize {
        3
    }

    fn height(&self) -> usize {
        3
    }

    fn slice_count(&self) -> usize {
        self.slices.len()
    }

    fn slice(&self, index: usize) -> Option<&[u8]> {
        self.slices.get(index).map(Vec::as_slice)
    }
}

#[test]
fn wrongly_sized_slices_are_rejected() {
    let source = RaggedSource {
        slices: vec![vec![0; 9], vec![0; 8]],
    };
    let mut writer = AmiraMeshWriter::new(Cursor::new(Vec::new()), EncodeOptions::default());
    match writer.write(&source, None) {
        Err(AmiraError::SizeMismatch { expected, found, .. }) => {
            assert_eq!(expected, 9);
            assert_eq!(found, 8);
        }
        other => panic!("Expected SizeMismatch, got {:?}", other),
    }

    assert!(matches!(
        VolumeStack::from_byte_slices(3, 3, vec![vec![0; 9], vec![0; 10]]),
        Err(AmiraError::SizeMismatch { .. })
    ));
}

#[test]
fn empty_lattice_is_rejected() {
    let stack = VolumeStack::new(0, 0);
    let mut writer = AmiraMeshWriter::new(Cursor::new(Vec::new()), EncodeOptions::default());
    assert!(matches!(writer.write(&stack, None), Err(AmiraError::InvalidFormat(_))));
}

#[test]
fn ascii_table_mode_cannot_be_encoded() {
    let stack = gradient_stack(2, 2, 1);
    let mut writer = AmiraMeshWriter::new(
        Cursor::new(Vec::new()),
        EncodeOptions {
            mode: Some(EncodingMode::AsciiTable),
            fast: false,
        },
    );
    assert!(matches!(writer.write(&stack, None), Err(AmiraError::Unsupported(_))));
}

#[test]
fn materials_without_colors_stay_a_label_field() {
    let text = "Parameters {\n    Materials {\n        Exterior {\n            Id 0\n        }\n        Inside {\n            Id 1\n        }\n    }\n}\n";
    let parameters = AmiraParameters::parse(text).expect("Failed to parse parameters");
    let stack = label_stack(12, 9, 3, 5);
    let (bytes, _) = {
        let mut writer = AmiraMeshWriter::new(
            Cursor::new(Vec::new()),
            EncodeOptions {
                mode: Some(EncodingMode::Raw),
                fast: false,
            },
        );
        let summary = writer.write(&stack, Some(&parameters)).expect("Failed to encode");
        (writer.into_inner().into_inner(), summary)
    };

    let decoded = open(bytes).read_volume().expect("Failed to decode");
    assert!(decoded.label_field);
    assert!(decoded.color_table.is_none());

    let (_, summary) = encode(&decoded, EncodeOptions::default());
    assert_eq!(summary.mode, EncodingMode::Rle);
}

#[test]
fn overflowing_slice_size_is_rejected() {
    assert!(matches!(
        VolumeStack::from_byte_slices(usize::MAX, 2, Vec::new()),
        Err(AmiraError::InvalidFormat(_))
    ));

    let mut stack = VolumeStack::new(usize::MAX, 2);
    assert!(matches!(
        stack.put_slice(Slice::Bytes(vec![0; 4])),
        Err(AmiraError::InvalidFormat(_))
    ));
}
