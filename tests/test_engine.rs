//! Integration tests for the engine facade: error mapping, JSON parameter
//! helpers, split bundling and file-based workflows.

use minitools_pdf::document::{Document, DocumentInfo};
use minitools_pdf::engine::{self, Engine, SplitOutput};
use minitools_pdf::error::{ErrorBody, ErrorCode};
use minitools_pdf::object::Object;
use minitools_pdf::writer::{self, ObjectSerializer};
use minitools_pdf::{CancellationToken, EngineConfig, Error, ReaderOptions, WriterOptions};
use std::fs;
use std::io::{Cursor, Read};
use tempfile::tempdir;

/// Helper to create a document with one page per content string.
fn create_test_document(contents: &[&str]) -> Document {
    let mut doc = Document::new();
    let root = doc.pages_root().unwrap();
    let mut kids = Vec::new();
    for text in contents {
        let content = doc.add_object(ObjectSerializer::stream(vec![], text.as_bytes().to_vec()));
        let page = doc.add_object(ObjectSerializer::dict(vec![
            ("Type", ObjectSerializer::name("Page")),
            ("Parent", ObjectSerializer::reference(root)),
            ("MediaBox", ObjectSerializer::rect(0.0, 0.0, 595.0, 842.0)),
            ("Contents", ObjectSerializer::reference(content)),
        ]));
        kids.push(Object::Reference(page));
    }
    let root_dict = doc.get_dict_mut(root).unwrap();
    root_dict.insert("Count".into(), Object::Integer(kids.len() as i64));
    root_dict.insert("Kids".into(), Object::Array(kids));
    doc
}

fn create_test_pdf(contents: &[&str]) -> Vec<u8> {
    writer::serialize(&create_test_document(contents)).unwrap()
}

mod error_mapping_tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        let cases = [
            (Error::MalformedDocument("x".into()), "MALFORMED_DOCUMENT", 400),
            (Error::UnsupportedEncryption("x".into()), "UNSUPPORTED_ENCRYPTION", 400),
            (Error::IncorrectPassword, "INCORRECT_PASSWORD", 401),
            (Error::PageIndexOutOfRange { index: 9, count: 2 }, "PAGE_INDEX_OUT_OF_RANGE", 400),
            (Error::InvalidPermutation("x".into()), "INVALID_PERMUTATION", 400),
            (Error::InvalidParameter("x".into()), "INVALID_PARAMETER", 400),
            (Error::InvalidInput("x".into()), "INVALID_INPUT", 400),
            (Error::Cancelled, "CANCELLED", 400),
            (Error::Zip("x".into()), "INTERNAL", 500),
        ];
        for (error, code, status) in cases {
            assert_eq!(error.code().as_str(), code);
            assert_eq!(error.code().http_status(), status);
        }
    }

    #[test]
    fn test_error_body_json() {
        let body = ErrorBody::from(&Error::PageIndexOutOfRange { index: 9, count: 2 });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], "PAGE_INDEX_OUT_OF_RANGE");
        assert_eq!(json["error"], "Page index 9 out of range (document has 2 pages)");
    }

    #[test]
    fn test_internal_errors_are_generic() {
        let err = Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "/secret/path"));
        let body = ErrorBody::from(&err);
        assert_eq!(body.code, ErrorCode::Internal);
        assert!(!body.error.contains("/secret/path"));
    }

    #[test]
    fn test_facade_errors_carry_codes() {
        let pdf = create_test_pdf(&["a"]);
        let err = engine::rotate_pdf(&pdf, 33, None).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParameter);
        let err = engine::page_count(b"%PDF-1.4 junk").unwrap_err();
        assert_eq!(err.code(), ErrorCode::MalformedDocument);
    }
}

mod parameter_tests {
    use super::*;

    #[test]
    fn test_route_fields_drive_operations() {
        let pdf = create_test_pdf(&["a", "b", "c", "d"]);
        let ranges = engine::parse_ranges("[[1, 2], [3, 4]]").unwrap();
        assert_eq!(engine::split_pdf(&pdf, &ranges).unwrap().len(), 2);

        let pages = engine::parse_page_list("[1, 3]").unwrap();
        let trimmed = engine::delete_pages(&pdf, &pages).unwrap();
        assert_eq!(engine::page_count(&trimmed).unwrap(), 2);

        let degrees = engine::parse_rotation("180").unwrap();
        assert!(engine::rotate_pdf(&pdf, degrees, None).is_ok());
    }

    #[test]
    fn test_bad_json_is_invalid_input() {
        for result in [
            engine::parse_page_list("1,2").map(|_| ()),
            engine::parse_ranges("{\"start\": 1}").map(|_| ()),
            engine::parse_rotation("").map(|_| ()),
        ] {
            assert!(matches!(result, Err(Error::InvalidInput(_))));
        }
    }
}

mod split_bundle_tests {
    use super::*;

    #[test]
    fn test_single_part_is_bare_pdf() {
        let output = engine::split_pdf_to_zip(&create_test_pdf(&["a", "b"]), &[(2, 2)]).unwrap();
        assert!(matches!(output, SplitOutput::Pdf(_)));
        assert_eq!(engine::page_count(&output.into_bytes()).unwrap(), 1);
    }

    #[test]
    fn test_many_parts_are_zipped() {
        let output = engine::split_pdf_to_zip(&create_test_pdf(&["a", "b", "c"]), &[(1, 1), (2, 2), (3, 3)]).unwrap();
        assert_eq!(output.content_type(), "application/zip");

        let mut archive = zip::ZipArchive::new(Cursor::new(output.into_bytes())).unwrap();
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        assert_eq!(names.len(), 3);
        for index in 1..=3 {
            let mut entry = archive.by_name(&format!("split_{}.pdf", index)).unwrap();
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).unwrap();
            assert_eq!(engine::page_count(&bytes).unwrap(), 1);
        }
    }
}

mod engine_config_tests {
    use super::*;

    #[test]
    fn test_uncompressed_writer() {
        let plain = WriterOptions::default().with_compress_streams(false);
        let engine = Engine::new(EngineConfig::default().with_writer(plain));
        let content = "1 0 0 1 0 0 cm\n".repeat(20);
        let input = writer::serialize_with(&create_test_document(&[&content]), &plain).unwrap();
        let out = engine.rotate(&input, 90, None).unwrap();
        assert!(String::from_utf8_lossy(&out).contains("1 0 0 1 0 0 cm"));
    }

    #[test]
    fn test_reader_limits_apply() {
        let engine = Engine::new(EngineConfig::default().with_reader(ReaderOptions::default().with_max_nesting(1)));
        let result = engine.page_count(&create_test_pdf(&["a"]));
        assert!(matches!(result, Err(Error::MalformedDocument(_))));
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let cancel = CancellationToken::new();
        let engine = Engine::new(EngineConfig::default().with_cancellation(cancel.clone()));
        let pdf = create_test_pdf(&["a", "b"]);
        assert!(engine.split(&pdf, &[(1, 1)]).is_ok());
        cancel.cancel();
        assert!(matches!(engine.split(&pdf, &[(1, 1)]), Err(Error::Cancelled)));
    }
}

mod file_workflow_tests {
    use super::*;

    #[test]
    fn test_merge_files_on_disk() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first.pdf");
        let second = dir.path().join("second.pdf");
        fs::write(&first, create_test_pdf(&["a"])).unwrap();
        fs::write(&second, create_test_pdf(&["b", "c"])).unwrap();

        let inputs = [fs::read(&first).unwrap(), fs::read(&second).unwrap()];
        let refs: Vec<&[u8]> = inputs.iter().map(Vec::as_slice).collect();
        let merged_path = dir.path().join("merged.pdf");
        fs::write(&merged_path, engine::merge_pdf(&refs).unwrap()).unwrap();

        let merged = fs::read(&merged_path).unwrap();
        assert_eq!(engine::page_count(&merged).unwrap(), 3);
        assert_eq!(inputs[0], fs::read(&first).unwrap());
    }

    #[test]
    fn test_metadata_survives_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meta.pdf");
        let info = DocumentInfo::new().title("Minutes").author("Board").keywords("q3, budget");
        fs::write(&path, engine::set_metadata(&create_test_pdf(&["a"]), &info).unwrap()).unwrap();

        let read_back = engine::get_metadata(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(read_back.title.as_deref(), Some("Minutes"));
        assert_eq!(read_back.author.as_deref(), Some("Board"));
        assert_eq!(read_back.keywords.as_deref(), Some("q3, budget"));
        assert!(read_back.mod_date.unwrap().starts_with("D:"));
    }
}
