//! Deleting, reordering and rotating pages.

use super::select_pages;
use crate::config::CancellationToken;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::Object;
use std::collections::BTreeSet;

/// Remove the pages at the given 0-based indices.
///
/// Indices past the last page are ignored. When nothing is removed the
/// document is left untouched. Removed pages become unreachable and are
/// dropped by the writer.
pub fn delete_pages(doc: &mut Document, indices: &[usize]) -> Result<()> {
    let pages = doc.page_refs()?;
    let doomed: BTreeSet<usize> = indices.iter().copied().filter(|&i| i < pages.len()).collect();
    if doomed.is_empty() {
        log::debug!("No page index in range, nothing deleted");
        return Ok(());
    }
    if doomed.len() == pages.len() {
        return Err(Error::InvalidParameter("cannot delete every page of a document".into()));
    }

    let kept: Vec<_> = pages
        .iter()
        .enumerate()
        .filter(|(i, _)| !doomed.contains(i))
        .map(|(_, &p)| p)
        .collect();
    doc.flatten_page_tree(&kept)?;
    log::info!("Deleted {} of {} pages", doomed.len(), pages.len());
    Ok(())
}

/// Rearrange pages so that new page `i` is old page `order[i]`.
///
/// `order` must be a permutation of `0..page_count`.
pub fn reorder_pages(doc: &mut Document, order: &[usize]) -> Result<()> {
    let pages = doc.page_refs()?;
    if order.len() != pages.len() {
        return Err(Error::InvalidPermutation(format!(
            "expected {} indices, got {}",
            pages.len(),
            order.len()
        )));
    }
    let mut seen = vec![false; pages.len()];
    for &index in order {
        match seen.get_mut(index) {
            Some(slot) if !*slot => *slot = true,
            Some(_) => return Err(Error::InvalidPermutation(format!("index {} appears twice", index))),
            None => return Err(Error::InvalidPermutation(format!("index {} is out of range", index))),
        }
    }

    let reordered: Vec<_> = order.iter().map(|&i| pages[i]).collect();
    doc.flatten_page_tree(&reordered)?;
    log::debug!("Reordered {} pages", pages.len());
    Ok(())
}

/// Map a rotation in degrees onto 0, 90, 180 or 270.
///
/// Negative quarter turns are accepted; anything else is an
/// [`Error::InvalidParameter`].
pub fn normalize_rotation(degrees: i32) -> Result<i64> {
    match degrees {
        0 | 90 | 180 | 270 | -90 | -180 | -270 => Ok(i64::from(degrees).rem_euclid(360)),
        other => Err(Error::InvalidParameter(format!(
            "rotation must be a multiple of 90 between -270 and 270, got {}",
            other
        ))),
    }
}

/// Add `degrees` to the effective rotation of the selected pages (all pages when `None`).
pub fn rotate_pages(
    doc: &mut Document,
    degrees: i32,
    pages: Option<&[usize]>,
    cancel: &CancellationToken,
) -> Result<()> {
    let delta = normalize_rotation(degrees)?;
    let all = doc.page_refs()?;
    let targets = match pages {
        Some(indices) => select_pages(&all, indices)?,
        None => all,
    };

    for page in targets {
        cancel.check()?;
        let rotation = (doc.page_rotation(page) + delta).rem_euclid(360);
        doc.get_dict_mut(page)?.insert("Rotate".into(), Object::Integer(rotation));
    }
    log::debug!("Rotated pages by {} degrees", delta);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::tests::{content_of, sample_doc};

    fn contents(doc: &Document) -> Vec<String> {
        doc.page_refs().unwrap().into_iter().map(|p| content_of(doc, p)).collect()
    }

    #[test]
    fn test_delete_pages() {
        let mut doc = sample_doc(&["a", "b", "c", "d"]);
        delete_pages(&mut doc, &[1, 3]).unwrap();
        assert_eq!(contents(&doc), vec!["a", "c"]);
        assert_eq!(doc.page_count().unwrap(), 2);
    }

    #[test]
    fn test_delete_ignores_out_of_range() {
        let mut doc = sample_doc(&["a", "b"]);
        let snapshot = |d: &Document| d.objects().map(|(r, o)| (r, o.clone())).collect::<Vec<_>>();
        let before = snapshot(&doc);
        delete_pages(&mut doc, &[7]).unwrap();
        assert_eq!(snapshot(&doc), before);

        delete_pages(&mut doc, &[0, 9]).unwrap();
        assert_eq!(contents(&doc), vec!["b"]);
    }

    #[test]
    fn test_delete_every_page_fails() {
        let mut doc = sample_doc(&["a", "b"]);
        assert!(matches!(delete_pages(&mut doc, &[0, 1, 1]), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_reorder_pages() {
        let mut doc = sample_doc(&["a", "b", "c"]);
        reorder_pages(&mut doc, &[2, 0, 1]).unwrap();
        assert_eq!(contents(&doc), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_reorder_rejects_non_permutation() {
        let mut doc = sample_doc(&["a", "b", "c"]);
        for order in [&[0, 0, 1][..], &[0, 1], &[0, 1, 3], &[0, 1, 2, 3]] {
            assert!(matches!(reorder_pages(&mut doc, order), Err(Error::InvalidPermutation(_))));
        }
        assert_eq!(contents(&doc), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(0).unwrap(), 0);
        assert_eq!(normalize_rotation(-90).unwrap(), 270);
        assert_eq!(normalize_rotation(-270).unwrap(), 90);
        assert_eq!(normalize_rotation(180).unwrap(), 180);
        assert!(matches!(normalize_rotation(45), Err(Error::InvalidParameter(_))));
        assert!(matches!(normalize_rotation(360), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_rotate_all_and_compose() {
        let cancel = CancellationToken::new();
        let mut doc = sample_doc(&["a", "b"]);
        rotate_pages(&mut doc, 90, None, &cancel).unwrap();
        rotate_pages(&mut doc, 270, None, &cancel).unwrap();
        for page in doc.page_refs().unwrap() {
            assert_eq!(doc.page_rotation(page), 0);
        }
    }

    #[test]
    fn test_rotate_subset_adds_to_inherited() {
        let cancel = CancellationToken::new();
        let mut doc = sample_doc(&["a", "b"]);
        let root = doc.pages_root().unwrap();
        doc.get_dict_mut(root).unwrap().insert("Rotate".into(), Object::Integer(90));

        rotate_pages(&mut doc, 180, Some(&[1]), &cancel).unwrap();
        let pages = doc.page_refs().unwrap();
        assert_eq!(doc.page_rotation(pages[0]), 90);
        assert_eq!(doc.page_rotation(pages[1]), 270);
    }

    #[test]
    fn test_rotate_subset_out_of_range() {
        let mut doc = sample_doc(&["a"]);
        let result = rotate_pages(&mut doc, 90, Some(&[3]), &CancellationToken::new());
        assert!(matches!(result, Err(Error::PageIndexOutOfRange { index: 3, count: 1 })));
    }
}
