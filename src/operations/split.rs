//! Splitting a document into page ranges.

use crate::config::CancellationToken;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use std::collections::BTreeMap;

/// Build one document per 1-based inclusive range.
///
/// Each part holds a fresh catalog and page tree plus only the objects
/// reachable from its pages (and the Info dictionary). All ranges are
/// validated before any part is built.
///
/// # Errors
///
/// * [`Error::InvalidInput`] for an empty range list
/// * [`Error::PageIndexOutOfRange`] when a bound is 0 or past the last page
/// * [`Error::InvalidParameter`] when a range starts after it ends
pub fn split(doc: &Document, ranges: &[(usize, usize)], cancel: &CancellationToken) -> Result<Vec<Document>> {
    if ranges.is_empty() {
        return Err(Error::InvalidInput("no page ranges given".into()));
    }
    let pages = doc.page_refs()?;
    let count = pages.len();
    for &(start, end) in ranges {
        if start == 0 {
            return Err(Error::PageIndexOutOfRange { index: start, count });
        }
        if end > count {
            return Err(Error::PageIndexOutOfRange { index: end, count });
        }
        if start > end {
            return Err(Error::InvalidParameter(format!("range {}-{} starts after it ends", start, end)));
        }
    }

    // Inherited attributes must travel with the pages
    let mut source = doc.clone();
    for &page in &pages {
        source.materialize_inherited(page)?;
    }

    let info = source.trailer().get("Info").and_then(|o| o.as_reference());
    let mut parts = Vec::with_capacity(ranges.len());
    for &(start, end) in ranges {
        cancel.check()?;
        let selected = &pages[start - 1..end];
        parts.push(extract(&source, selected, info)?);
        log::debug!("Built part with pages {}-{}", start, end);
    }
    log::info!("Split {} pages into {} parts", count, parts.len());
    Ok(parts)
}

fn extract(source: &Document, pages: &[ObjectRef], info: Option<ObjectRef>) -> Result<Document> {
    let mut roots = pages.to_vec();
    roots.extend(info);
    let objects: BTreeMap<ObjectRef, Object> = source
        .reachable_from(&roots)
        .into_iter()
        .filter_map(|r| source.get(r).map(|o| (r, o.clone())))
        .collect();

    let mut trailer = Dict::new();
    for key in ["ID", "Info"] {
        if let Some(value) = source.trailer().get(key) {
            trailer.insert(key.to_string(), value.clone());
        }
    }

    let mut part = Document::from_parts(source.version(), objects, trailer);
    let pages_root = part.add_object(Object::Dictionary(Dict::from([
        ("Type".to_string(), Object::Name("Pages".into())),
        ("Kids".to_string(), Object::Array(Vec::new())),
        ("Count".to_string(), Object::Integer(0)),
    ])));
    let catalog = part.add_object(Object::Dictionary(Dict::from([
        ("Type".to_string(), Object::Name("Catalog".into())),
        ("Pages".to_string(), Object::Reference(pages_root)),
    ])));
    part.trailer_mut().insert("Root".into(), Object::Reference(catalog));
    part.flatten_page_tree(pages)?;
    part.set_encryption(source.encryption_state().cloned());
    Ok(part)
}
