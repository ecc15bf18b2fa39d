//! Integration tests for page operations through the engine facade.
//!
//! Every test starts from serialized PDF bytes and inspects the parsed output,
//! the same path the routes take.

use minitools_pdf::document::Document;
use minitools_pdf::engine;
use minitools_pdf::object::Object;
use minitools_pdf::operations::{ImageInput, PageNumberOptions, PagePosition, WatermarkOptions};
use minitools_pdf::writer::{self, ObjectSerializer};
use minitools_pdf::{Error, reader};
use proptest::prelude::*;

/// PDF whose pages carry the given content strings. Pages inherit a
/// 300 x 400 MediaBox from the page tree root.
fn create_test_pdf(contents: &[&str]) -> Vec<u8> {
    let mut doc = Document::new();
    let root = doc.pages_root().unwrap();
    let mut kids = Vec::new();
    for text in contents {
        let content = doc.add_object(ObjectSerializer::stream(vec![], text.as_bytes().to_vec()));
        let page = doc.add_object(ObjectSerializer::dict(vec![
            ("Type", ObjectSerializer::name("Page")),
            ("Parent", ObjectSerializer::reference(root)),
            ("Contents", ObjectSerializer::reference(content)),
        ]));
        kids.push(Object::Reference(page));
    }
    let root_dict = doc.get_dict_mut(root).unwrap();
    root_dict.insert("Count".into(), Object::Integer(kids.len() as i64));
    root_dict.insert("Kids".into(), Object::Array(kids));
    root_dict.insert("MediaBox".into(), ObjectSerializer::rect(0.0, 0.0, 300.0, 400.0));
    writer::serialize(&doc).unwrap()
}

fn numbered_pdf(count: usize) -> Vec<u8> {
    let names: Vec<String> = (1..=count).map(|i| format!("page {}", i)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    create_test_pdf(&refs)
}

/// Content of every page, concatenating multiple content streams.
fn page_texts(pdf: &[u8]) -> Vec<String> {
    let doc = reader::parse(pdf).unwrap();
    doc.page_refs()
        .unwrap()
        .into_iter()
        .map(|page| {
            let streams = match &doc.get_dict(page).unwrap()["Contents"] {
                Object::Array(items) => items.iter().filter_map(|o| o.as_reference()).collect(),
                other => vec![other.as_reference().unwrap()],
            };
            streams
                .into_iter()
                .map(|r| String::from_utf8(doc.get(r).unwrap().decode_stream_data(0).unwrap()).unwrap())
                .collect::<String>()
        })
        .collect()
}

fn rotations(pdf: &[u8]) -> Vec<i64> {
    let doc = reader::parse(pdf).unwrap();
    doc.page_refs().unwrap().into_iter().map(|p| doc.page_rotation(p)).collect()
}

mod merge_tests {
    use super::*;

    #[test]
    fn test_merge_two_and_three_pages() {
        let a = create_test_pdf(&["a1", "a2"]);
        let b = create_test_pdf(&["b1", "b2", "b3"]);
        let merged = engine::merge_pdf(&[&a, &b]).unwrap();
        assert_eq!(engine::page_count(&merged).unwrap(), 5);
        assert_eq!(page_texts(&merged)[2], page_texts(&b)[0]);
        assert_eq!(page_texts(&merged), vec!["a1", "a2", "b1", "b2", "b3"]);
    }

    #[test]
    fn test_merge_three_documents_in_order() {
        let inputs = [create_test_pdf(&["x"]), create_test_pdf(&["y"]), create_test_pdf(&["z"])];
        let refs: Vec<&[u8]> = inputs.iter().map(Vec::as_slice).collect();
        assert_eq!(page_texts(&engine::merge_pdf(&refs).unwrap()), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_merged_pages_keep_geometry() {
        let merged = engine::merge_pdf(&[&create_test_pdf(&["a"]), &create_test_pdf(&["b"])]).unwrap();
        let doc = reader::parse(&merged).unwrap();
        for page in doc.page_refs().unwrap() {
            assert_eq!(doc.media_box(page), [0.0, 0.0, 300.0, 400.0]);
        }
    }

    #[test]
    fn test_merge_with_reference_at_top_of_number_space() {
        let a = create_test_pdf(&["a1", "a2"]);
        let mut doc = reader::parse(&create_test_pdf(&["b1"])).unwrap();
        let page = doc.page_refs().unwrap()[0];
        // Same width as the reference text so the xref offsets stay valid
        doc.get_dict_mut(page).unwrap().insert("Thumb".into(), ObjectSerializer::name("ThumbTargetXY"));
        let mut b = writer::serialize(&doc).unwrap();
        let at = b.windows(14).position(|w| w == b"/ThumbTargetXY").unwrap();
        b[at..at + 14].copy_from_slice(b"4294967295 0 R");
        assert_eq!(engine::page_count(&b).unwrap(), 1);

        let merged = engine::merge_pdf(&[&a, &b]).unwrap();
        assert_eq!(page_texts(&merged), vec!["a1", "a2", "b1"]);
        let merged_doc = reader::parse(&merged).unwrap();
        let last = merged_doc.page_refs().unwrap()[2];
        let thumb = merged_doc.get_dict(last).unwrap().get("Thumb").cloned();
        assert!(matches!(thumb, None | Some(Object::Null)));
    }

    #[test]
    fn test_merge_nothing_fails() {
        assert!(matches!(engine::merge_pdf(&[]), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_merge_rejects_broken_input() {
        let good = create_test_pdf(&["a"]);
        let result = engine::merge_pdf(&[&good, b"not a pdf"]);
        assert!(matches!(result, Err(Error::MalformedDocument(_))));
    }
}

mod split_tests {
    use super::*;

    #[test]
    fn test_split_ten_pages() {
        let parts = engine::split_pdf(&numbered_pdf(10), &[(1, 3), (4, 10)]).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(engine::page_count(&parts[0]).unwrap(), 3);
        assert_eq!(engine::page_count(&parts[1]).unwrap(), 7);
        assert_eq!(page_texts(&parts[1])[0], "page 4");
    }

    #[test]
    fn test_split_then_merge_is_identity() {
        let original = numbered_pdf(4);
        let parts = engine::split_pdf(&original, &[(1, 4)]).unwrap();
        let refs: Vec<&[u8]> = parts.iter().map(Vec::as_slice).collect();
        let merged = engine::merge_pdf(&refs).unwrap();
        assert_eq!(page_texts(&merged), page_texts(&original));
    }

    #[test]
    fn test_split_parts_only_carry_their_pages() {
        let parts = engine::split_pdf(&numbered_pdf(6), &[(2, 2)]).unwrap();
        let doc = reader::parse(&parts[0]).unwrap();
        assert_eq!(doc.object_count(), 4);
    }

    #[test]
    fn test_split_invalid_ranges() {
        let pdf = numbered_pdf(3);
        assert!(matches!(
            engine::split_pdf(&pdf, &[(0, 1)]),
            Err(Error::PageIndexOutOfRange { .. })
        ));
        assert!(matches!(
            engine::split_pdf(&pdf, &[(2, 4)]),
            Err(Error::PageIndexOutOfRange { index: 4, count: 3 })
        ));
        assert!(matches!(engine::split_pdf(&pdf, &[(3, 2)]), Err(Error::InvalidParameter(_))));
        assert!(matches!(engine::split_pdf(&pdf, &[]), Err(Error::InvalidInput(_))));
    }
}

mod delete_and_reorder_tests {
    use super::*;

    #[test]
    fn test_delete_pages() {
        let out = engine::delete_pages(&numbered_pdf(4), &[0, 2]).unwrap();
        assert_eq!(page_texts(&out), vec!["page 2", "page 4"]);
    }

    #[test]
    fn test_delete_out_of_range_only_is_identity() {
        let pdf = numbered_pdf(3);
        let out = engine::delete_pages(&pdf, &[8]).unwrap();
        assert_eq!(page_texts(&out), page_texts(&pdf));
    }

    #[test]
    fn test_delete_all_pages_fails() {
        let result = engine::delete_pages(&numbered_pdf(2), &[0, 1]);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_reorder_pages() {
        let out = engine::reorder_pages(&numbered_pdf(3), &[2, 1, 0]).unwrap();
        assert_eq!(page_texts(&out), vec!["page 3", "page 2", "page 1"]);
    }

    #[test]
    fn test_reorder_with_duplicates_fails() {
        let result = engine::reorder_pages(&numbered_pdf(3), &[0, 0, 1]);
        assert!(matches!(result, Err(Error::InvalidPermutation(_))));
    }
}

mod rotation_tests {
    use super::*;

    #[test]
    fn test_rotate_all_pages() {
        let out = engine::rotate_pdf(&numbered_pdf(2), 90, None).unwrap();
        assert_eq!(rotations(&out), vec![90, 90]);
    }

    #[test]
    fn test_rotate_subset_with_negative_angle() {
        let out = engine::rotate_pdf(&numbered_pdf(3), -90, Some(&[0, 2])).unwrap();
        assert_eq!(rotations(&out), vec![270, 0, 270]);
    }

    #[test]
    fn test_rotate_invalid_angle() {
        let result = engine::rotate_pdf(&numbered_pdf(1), 45, None);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_rotate_out_of_range_page() {
        let result = engine::rotate_pdf(&numbered_pdf(2), 90, Some(&[2]));
        assert!(matches!(result, Err(Error::PageIndexOutOfRange { index: 2, count: 2 })));
    }
}

mod overlay_tests {
    use super::*;

    #[test]
    fn test_watermark_keeps_original_content_inside_q_q() {
        let out = engine::watermark_pdf(&create_test_pdf(&["0 0 m 5 5 l S"]), &WatermarkOptions::draft()).unwrap();
        let text = &page_texts(&out)[0];
        assert!(text.starts_with("q\n0 0 m 5 5 l SQ\nq\n"));
        assert!(text.contains("(DRAFT) Tj"));
        assert!(text.ends_with("Q\n"));
    }

    #[test]
    fn test_image_watermark() {
        let png = {
            let img = image::RgbImage::from_pixel(10, 10, image::Rgb([0, 0, 255]));
            let mut out = std::io::Cursor::new(Vec::new());
            image::DynamicImage::ImageRgb8(img)
                .write_to(&mut out, image::ImageFormat::Png)
                .unwrap();
            out.into_inner()
        };
        let out = engine::watermark_pdf(&create_test_pdf(&["a"]), &WatermarkOptions::image(png)).unwrap();
        assert!(page_texts(&out)[0].contains("/WmIm1 Do"));
    }

    #[test]
    fn test_page_numbers() {
        let options = PageNumberOptions::new()
            .with_position(PagePosition::TopCenter)
            .with_format("{n} / {total}");
        let out = engine::add_page_numbers(&numbered_pdf(3), &options).unwrap();
        let texts = page_texts(&out);
        assert!(texts[0].contains("(1 / 3) Tj"));
        assert!(texts[2].contains("(3 / 3) Tj"));
    }

    #[test]
    fn test_images_to_pdf_page_size() {
        let jpeg = {
            let img = image::RgbImage::from_pixel(64, 48, image::Rgb([200, 10, 10]));
            let mut out = std::io::Cursor::new(Vec::new());
            image::DynamicImage::ImageRgb8(img)
                .write_to(&mut out, image::ImageFormat::Jpeg)
                .unwrap();
            out.into_inner()
        };
        let pdf = engine::images_to_pdf(&[ImageInput::with_mime_type(jpeg, "image/jpeg")]).unwrap();
        let doc = reader::parse(&pdf).unwrap();
        let page = doc.page_refs().unwrap()[0];
        assert_eq!(doc.media_box(page), [0.0, 0.0, 64.0, 48.0]);
    }
}

mod operation_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_rotation_composes(first in prop::sample::select(vec![0, 90, 180, 270, -90, -180, -270])) {
            let pdf = numbered_pdf(2);
            let once = engine::rotate_pdf(&pdf, first, None).unwrap();
            let back = (360 - i64::from(first).rem_euclid(360)) % 360;
            let twice = engine::rotate_pdf(&once, back as i32, None).unwrap();
            prop_assert_eq!(rotations(&twice), vec![0, 0]);
        }

        #[test]
        fn prop_reorder_permutes_contents(order in Just((0..5usize).collect::<Vec<_>>()).prop_shuffle()) {
            let pdf = numbered_pdf(5);
            let out = engine::reorder_pages(&pdf, &order).unwrap();
            let expected: Vec<String> = order.iter().map(|i| format!("page {}", i + 1)).collect();
            prop_assert_eq!(page_texts(&out), expected);
        }

        #[test]
        fn prop_non_permutations_fail(order in prop::collection::vec(0..6usize, 0..7)) {
            let mut sorted = order.clone();
            sorted.sort_unstable();
            prop_assume!(sorted != (0..5).collect::<Vec<_>>());
            let result = engine::reorder_pages(&numbered_pdf(5), &order);
            prop_assert!(matches!(result, Err(Error::InvalidPermutation(_))));
        }
    }
}
