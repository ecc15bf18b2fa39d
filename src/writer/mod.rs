//! PDF writing.
//!
//! ## Architecture
//!
//! ```text
//! Document
//!     ↓
//! [PdfWriter] (live-object walk, renumbering, encryption, xref)
//!     ↓
//! [ObjectSerializer] (serializes PDF objects)
//!     ↓
//! PDF bytes
//! ```
//!
//! [`ContentStreamBuilder`] and [`ImageData`] produce the new objects that
//! page operations splice into a document before it is written.
//!
//! ## Example
//!
//! ```
//! use minitools_pdf::document::Document;
//! use minitools_pdf::writer;
//!
//! let bytes = writer::serialize(&Document::new()).unwrap();
//! assert!(bytes.starts_with(b"%PDF-1.7"));
//! ```

mod content;
mod image;
mod object_serializer;
mod pdf_writer;

pub use content::{ContentStreamBuilder, ContentStreamOp, helvetica_text_width, opacity_gstate, standard_font};
pub use image::{ColorSpace, ImageData, ImageFormat};
pub use object_serializer::ObjectSerializer;
pub use pdf_writer::{PdfWriter, serialize, serialize_with};

#[cfg(test)]
pub(crate) use image::tests::{jpeg_header, png_bytes};
