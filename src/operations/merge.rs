//! Merging documents.

use crate::config::CancellationToken;
use crate::document::Document;
use crate::error::{Error, Result};

/// Concatenate the pages of `documents` in order into the first document.
///
/// Objects of every later document are renumbered above the current maximum
/// id before they are moved over, so ids never collide. Inherited page
/// attributes are copied onto each page before it is re-parented under the
/// first document's page tree root. The first document's catalog, Info and
/// security settings are kept.
pub fn merge(documents: Vec<Document>, cancel: &CancellationToken) -> Result<Document> {
    let mut documents = documents.into_iter();
    let mut base = documents
        .next()
        .ok_or_else(|| Error::InvalidInput("no documents to merge".into()))?;
    let mut pages = base.page_refs()?;
    let mut merged = 1;

    for mut other in documents {
        cancel.check()?;
        other.renumber(base.max_id())?;
        let other_pages = other.page_refs()?;
        for &page in &other_pages {
            other.materialize_inherited(page)?;
        }
        base.require_version(other.version());
        log::debug!("Merging {} pages from document {}", other_pages.len(), merged + 1);
        base.absorb(other);
        pages.extend(other_pages);
        merged += 1;
    }

    if merged > 1 {
        base.flatten_page_tree(&pages)?;
    }
    log::info!("Merged {} documents into {} pages", merged, pages.len());
    Ok(base)
}
