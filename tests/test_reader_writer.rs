//! Integration tests for reading and writing PDFs.
//!
//! Tests cover:
//! - Hand-written PDFs with classic xref tables, incremental updates and damage
//! - Round trips through the writer (page order, contents, inherited attributes)
//! - Pruning and renumbering of the written object graph

use minitools_pdf::document::Document;
use minitools_pdf::object::{Object, ObjectRef};
use minitools_pdf::writer::{self, ObjectSerializer};
use minitools_pdf::{Error, ReaderOptions, WriterOptions, reader};
use proptest::prelude::*;

/// Assemble a PDF with a classic xref table from object bodies numbered from 1.
fn build_pdf(bodies: &[&str], trailer: &str) -> Vec<u8> {
    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in bodies.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", bodies.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(format!("trailer\n{}\nstartxref\n{}\n%%EOF\n", trailer, xref).as_bytes());
    out
}

fn stream(content: &str) -> String {
    format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content)
}

/// Document whose pages carry the given content strings.
fn document(contents: &[&str]) -> Document {
    let mut doc = Document::new();
    let root = doc.pages_root().unwrap();
    let mut kids = Vec::new();
    for text in contents {
        let content = doc.add_object(ObjectSerializer::stream(vec![], text.as_bytes().to_vec()));
        let page = doc.add_object(ObjectSerializer::dict(vec![
            ("Type", ObjectSerializer::name("Page")),
            ("Parent", ObjectSerializer::reference(root)),
            ("MediaBox", ObjectSerializer::rect(0.0, 0.0, 612.0, 792.0)),
            ("Contents", ObjectSerializer::reference(content)),
        ]));
        kids.push(Object::Reference(page));
    }
    let root_dict = doc.get_dict_mut(root).unwrap();
    root_dict.insert("Count".into(), Object::Integer(kids.len() as i64));
    root_dict.insert("Kids".into(), Object::Array(kids));
    doc
}

fn page_contents(doc: &Document) -> Vec<Vec<u8>> {
    doc.page_refs()
        .unwrap()
        .into_iter()
        .map(|page| {
            let contents = doc.get_dict(page).unwrap()["Contents"].as_reference().unwrap();
            doc.get(contents).unwrap().decode_stream_data(0).unwrap()
        })
        .collect()
}

mod reader_tests {
    use super::*;

    fn three_page_pdf() -> Vec<u8> {
        build_pdf(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [3 0 R 5 0 R] /Count 3 /MediaBox [0 0 200 100] >>",
                "<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>",
                &stream("BT (one) Tj ET"),
                "<< /Type /Pages /Parent 2 0 R /Kids [6 0 R 7 0 R] /Count 2 /Rotate 180 >>",
                "<< /Type /Page /Parent 5 0 R >>",
                "<< /Type /Page /Parent 5 0 R /Rotate 90 >>",
            ],
            "<< /Size 8 /Root 1 0 R >>",
        )
    }

    #[test]
    fn test_nested_page_tree() {
        let doc = reader::parse(&three_page_pdf()).unwrap();
        let pages = doc.page_refs().unwrap();
        assert_eq!(pages, vec![ObjectRef::new(3, 0), ObjectRef::new(6, 0), ObjectRef::new(7, 0)]);
        assert_eq!(doc.media_box(pages[2]), [0.0, 0.0, 200.0, 100.0]);
        assert_eq!(doc.page_rotation(pages[0]), 0);
        assert_eq!(doc.page_rotation(pages[1]), 180);
        assert_eq!(doc.page_rotation(pages[2]), 90);
    }

    #[test]
    fn test_page_tree_cycle_is_malformed() {
        let pdf = build_pdf(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
                "<< /Type /Pages /Parent 2 0 R /Kids [2 0 R] /Count 1 >>",
            ],
            "<< /Size 4 /Root 1 0 R >>",
        );
        let doc = reader::parse(&pdf).unwrap();
        assert!(matches!(doc.page_refs(), Err(Error::MalformedDocument(_))));
    }

    #[test]
    fn test_garbage_is_malformed() {
        for input in [&b""[..], b"hello world", b"%PDF-1.4\nno xref here"] {
            assert!(matches!(reader::parse(input), Err(Error::MalformedDocument(_))));
        }
    }

    #[test]
    fn test_truncated_file_is_malformed() {
        let pdf = three_page_pdf();
        let truncated = &pdf[..pdf.len() / 2];
        assert!(matches!(reader::parse(truncated), Err(Error::MalformedDocument(_))));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("<< /Type /Catalog /Pages 2 0 R /Deep {}1{} >>", "[".repeat(50), "]".repeat(50));
        let pdf = build_pdf(
            &[&deep, "<< /Type /Pages /Kids [] /Count 0 >>"],
            "<< /Size 3 /Root 1 0 R >>",
        );
        assert!(reader::parse(&pdf).is_ok());

        let strict = ReaderOptions::default().with_max_nesting(10);
        assert!(matches!(
            reader::parse_with_password(&pdf, "", &strict),
            Err(Error::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_info_is_read() {
        let pdf = build_pdf(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [] /Count 0 >>",
                "<< /Title (Annual Report) /Author <FEFF0041006E006E> >>",
            ],
            "<< /Size 4 /Root 1 0 R /Info 3 0 R >>",
        );
        let info = reader::parse(&pdf).unwrap().info();
        assert_eq!(info.title.as_deref(), Some("Annual Report"));
        assert_eq!(info.author.as_deref(), Some("Ann"));
        assert!(info.subject.is_none());
    }
}

mod writer_tests {
    use super::*;

    #[test]
    fn test_round_trip_keeps_pages_and_contents() {
        let doc = document(&["BT (a) Tj ET", "0 0 m 100 100 l S", "q Q"]);
        let reparsed = reader::parse(&writer::serialize(&doc).unwrap()).unwrap();
        assert_eq!(page_contents(&reparsed), page_contents(&doc));
    }

    #[test]
    fn test_round_trip_of_parsed_file_keeps_inheritance() {
        let original = reader::parse(&build_pdf(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 200 100] /Rotate 270 >>",
                "<< /Type /Page /Parent 2 0 R >>",
            ],
            "<< /Size 4 /Root 1 0 R >>",
        ))
        .unwrap();
        let reparsed = reader::parse(&writer::serialize(&original).unwrap()).unwrap();
        let page = reparsed.page_refs().unwrap()[0];
        assert_eq!(reparsed.media_box(page), [0.0, 0.0, 200.0, 100.0]);
        assert_eq!(reparsed.page_rotation(page), 270);
    }

    #[test]
    fn test_unreachable_objects_are_dropped() {
        let mut doc = document(&["a"]);
        for _ in 0..5 {
            doc.add_object(ObjectSerializer::string("orphan"));
        }
        let bytes = writer::serialize(&doc).unwrap();
        let reparsed = reader::parse(&bytes).unwrap();
        // catalog, page tree root, one page, one content stream
        assert_eq!(reparsed.object_count(), 4);
        assert_eq!(reparsed.max_id(), 4);
    }

    #[test]
    fn test_compression_toggle() {
        let content = "0 0 m 10 10 l S\n".repeat(40);
        let doc = document(&[&content]);
        let compressed = writer::serialize(&doc).unwrap();
        let plain = writer::serialize_with(&doc, &WriterOptions::default().with_compress_streams(false)).unwrap();
        assert!(compressed.len() < plain.len());
        assert!(String::from_utf8_lossy(&plain).contains("0 0 m 10 10 l S"));

        for bytes in [compressed, plain] {
            let reparsed = reader::parse(&bytes).unwrap();
            assert_eq!(page_contents(&reparsed), vec![content.as_bytes().to_vec()]);
        }
    }

    #[test]
    fn test_output_is_deterministic_apart_from_id() {
        let mut doc = document(&["a", "b"]);
        doc.ensure_file_id();
        let first = writer::serialize(&doc).unwrap();
        let second = writer::serialize(&doc).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_header_and_trailer() {
        let bytes = writer::serialize(&document(&["a"])).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("%PDF-1.7\n%"));
        assert!(text.contains("trailer"));
        assert!(text.contains("/Size 5"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }
}

mod round_trip_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_round_trip_preserves_contents(contents in prop::collection::vec("[a-zA-Z0-9 ()\\\\]{0,40}", 1..6)) {
            let refs: Vec<&str> = contents.iter().map(String::as_str).collect();
            let doc = document(&refs);
            let reparsed = reader::parse(&writer::serialize(&doc).unwrap()).unwrap();
            prop_assert_eq!(page_contents(&reparsed), page_contents(&doc));
        }

        #[test]
        fn prop_string_objects_survive(text in prop::collection::vec(any::<u8>(), 0..64)) {
            let mut doc = document(&["a"]);
            let catalog = doc.catalog_ref().unwrap();
            doc.get_dict_mut(catalog).unwrap().insert("Note".into(), Object::String(text.clone()));
            let reparsed = reader::parse(&writer::serialize(&doc).unwrap()).unwrap();
            prop_assert_eq!(&reparsed.catalog().unwrap()["Note"], &Object::String(text));
        }
    }
}
