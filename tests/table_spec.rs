use std::fs;
use std::io::Cursor;

use amiramesh::{AmiraError, AmiraMeshReader, DecodeOptions, EncodingMode};

const MARKERS: &str = "# AmiraMesh 3D ASCII 2.0\n\
\n\
define Markers 3\n\
\n\
Parameters {\n\
    numRows 3,\n\
    ContentType \"HxSpreadSheet\"\n\
}\n\
\n\
ID { int ID } @1\n\
Name { byte Name } @2\n\
\n\
# Data section follows\n\
@1\n\
1\n\
2\n\
3\n\
\n\
@2\n\
65\n\
0\n\
66\n\
67\n\
0\n\
0\n";

fn open_text(text: &str) -> AmiraMeshReader<Cursor<Vec<u8>>> {
    AmiraMeshReader::from_reader(Cursor::new(text.as_bytes().to_vec()), DecodeOptions::default())
        .expect("Failed to parse table preamble")
}

#[test]
fn ascii_header_is_recognized() {
    let reader = open_text(MARKERS);
    assert!(reader.is_table());
    assert_eq!(reader.header.mode, EncodingMode::AsciiTable);
    assert_eq!(reader.header.lattice, None);

    let columns: Vec<(&str, &str)> = reader
        .header
        .columns
        .iter()
        .map(|c| (c.name.as_str(), c.format.as_str()))
        .collect();
    assert_eq!(columns, vec![("ID", "int"), ("Name", "byte")]);
}

#[test]
fn rows_are_assembled_column_by_column() {
    let table = open_text(MARKERS).read_table().expect("Failed to read table");

    assert_eq!(table.headings(), "ID\tName");
    assert_eq!(table.num_rows(), 3);
    assert_eq!(table.rows, vec!["1\tA", "2\tBC", "3\t"]);
    assert_eq!(table.body(), "1\tA\n2\tBC\n3\t");
    assert_eq!(table.parameters.get_property("ContentType"), Some("HxSpreadSheet"));
}

#[test]
fn table_title_comes_from_file_name() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("markers.am");
    fs::write(&path, MARKERS).expect("Failed to write table file");

    let table = AmiraMeshReader::open(&path, DecodeOptions::default())
        .expect("Failed to open table file")
        .read_table()
        .expect("Failed to read table");
    assert_eq!(table.title.as_deref(), Some("markers.am"));
}

#[test]
fn missing_row_count_is_invalid() {
    let text = MARKERS.replace("numRows 3,\n", "");
    assert!(matches!(
        open_text(&text).read_table(),
        Err(AmiraError::InvalidFormat(_))
    ));
}

#[test]
fn short_column_is_truncated() {
    let text = MARKERS.replace("numRows 3", "numRows 4");
    match open_text(&text).read_table() {
        Err(AmiraError::TruncatedStream { .. }) | Err(AmiraError::InvalidFormat(_)) => {}
        other => panic!("Expected a truncated table error, got {:?}", other),
    }
}

#[test]
fn body_ending_early_is_truncated() {
    let end = MARKERS.find("66\n").expect("fixture layout");
    match open_text(&MARKERS[..end]).read_table() {
        Err(AmiraError::TruncatedStream { expected, found, .. }) => {
            assert_eq!(expected, 3);
            assert_eq!(found, 1);
        }
        other => panic!("Expected TruncatedStream, got {:?}", other),
    }
}

#[test]
fn tables_and_lattices_are_not_interchangeable() {
    assert!(matches!(open_text(MARKERS).read_volume(), Err(AmiraError::Unsupported(_))));

    let lattice = open_text("# AmiraMesh BINARY 2.0\ndefine Lattice 1 1 1\n@1\n\0");
    assert!(matches!(lattice.read_table(), Err(AmiraError::Unsupported(_))));
}

#[test]
fn column_count_comes_from_last_marker() {
    let text = MARKERS.replace("Name { byte Name } @2", "Name { byte Name } @3");
    assert!(matches!(
        AmiraMeshReader::from_reader(Cursor::new(text.into_bytes()), DecodeOptions::default()),
        Err(AmiraError::InvalidFormat(_))
    ));
}
