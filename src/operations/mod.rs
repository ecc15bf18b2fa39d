//! Page-level operations on a parsed [`Document`](crate::document::Document).
//!
//! Every operation mutates or builds documents in memory; parsing and
//! serialization happen in the [`engine`](crate::engine) facade. Operations
//! that loop over pages, ranges or inputs poll a
//! [`CancellationToken`](crate::config::CancellationToken) between steps.

mod images;
mod merge;
mod metadata;
mod overlay;
mod pages;
mod split;

pub use images::{ImageInput, images_to_pdf};
pub use merge::merge;
pub use metadata::{PRODUCER, pdf_date, parse_pdf_date, update_metadata};
pub use overlay::{PageNumberOptions, PagePosition, WatermarkKind, WatermarkOptions, add_page_numbers, watermark};
pub use pages::{delete_pages, normalize_rotation, reorder_pages, rotate_pages};
pub use split::split;

use crate::error::{Error, Result};
use crate::object::ObjectRef;

/// Page references for 0-based `indices`, failing on the first index out of range.
pub(crate) fn select_pages(pages: &[ObjectRef], indices: &[usize]) -> Result<Vec<ObjectRef>> {
    indices
        .iter()
        .map(|&index| {
            pages.get(index).copied().ok_or(Error::PageIndexOutOfRange {
                index,
                count: pages.len(),
            })
        })
        .collect()
}
