//! Byte-in, byte-out facade over the reader, the page operations and the writer.
//!
//! Every call parses its input buffers, runs one operation on the resulting
//! [`Document`]s and serializes the result. Nothing is shared between
//! calls. The free functions use [`EngineConfig::default`]; an [`Engine`]
//! carries custom limits and a cancellation token.
//!
//! # Example
//!
//! ```
//! use minitools_pdf::engine;
//! use minitools_pdf::operations::ImageInput;
//!
//! # fn png() -> Vec<u8> {
//! #     let img = image::RgbImage::from_pixel(4, 4, image::Rgb([255, 0, 0]));
//! #     let mut out = std::io::Cursor::new(Vec::new());
//! #     image::DynamicImage::ImageRgb8(img).write_to(&mut out, image::ImageFormat::Png).unwrap();
//! #     out.into_inner()
//! # }
//! let pdf = engine::images_to_pdf(&[ImageInput::new(png()), ImageInput::new(png())])?;
//! let rotated = engine::rotate_pdf(&pdf, 90, Some(&[1]))?;
//! assert_eq!(engine::page_count(&rotated)?, 2);
//! # Ok::<(), minitools_pdf::error::Error>(())
//! ```

use crate::config::EngineConfig;
use crate::document::{Document, DocumentInfo};
use crate::encryption::{EncryptionConfig, EncryptionWriteHandler};
use crate::error::{Error, Result};
use crate::operations::{self, ImageInput, PageNumberOptions, WatermarkOptions};
use crate::{reader, writer};
use serde::Deserialize;
use std::io::{Cursor, Write};

/// Result of a split: a bare PDF for a single part, a zip archive otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitOutput {
    /// The only part
    Pdf(Vec<u8>),
    /// `split_1.pdf`, `split_2.pdf`, ... bundled as a zip archive
    Zip(Vec<u8>),
}

impl SplitOutput {
    /// MIME type of the payload.
    pub fn content_type(&self) -> &'static str {
        match self {
            SplitOutput::Pdf(_) => "application/pdf",
            SplitOutput::Zip(_) => "application/zip",
        }
    }

    /// The payload bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            SplitOutput::Pdf(bytes) | SplitOutput::Zip(bytes) => bytes,
        }
    }
}

/// PDF engine with explicit configuration.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    /// Create an engine.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn load(&self, data: &[u8]) -> Result<Document> {
        reader::parse_with_password(data, "", &self.config.reader)
    }

    fn save(&self, doc: &Document) -> Result<Vec<u8>> {
        writer::serialize_with(doc, &self.config.writer)
    }

    /// Concatenate the pages of every input in order.
    pub fn merge(&self, inputs: &[&[u8]]) -> Result<Vec<u8>> {
        let documents = inputs
            .iter()
            .map(|data| {
                self.config.cancel.check()?;
                self.load(data)
            })
            .collect::<Result<Vec<_>>>()?;
        let merged = operations::merge(documents, &self.config.cancel)?;
        self.save(&merged)
    }

    /// One PDF per 1-based inclusive range.
    pub fn split(&self, data: &[u8], ranges: &[(usize, usize)]) -> Result<Vec<Vec<u8>>> {
        let doc = self.load(data)?;
        operations::split(&doc, ranges, &self.config.cancel)?
            .iter()
            .map(|part| self.save(part))
            .collect()
    }

    /// Split, bundling the parts as a zip archive when there is more than one.
    pub fn split_to_zip(&self, data: &[u8], ranges: &[(usize, usize)]) -> Result<SplitOutput> {
        let mut parts = self.split(data, ranges)?;
        if parts.len() == 1 {
            return Ok(SplitOutput::Pdf(parts.remove(0)));
        }
        Ok(SplitOutput::Zip(zip_parts(&parts)?))
    }

    /// Rotate all pages, or the given 0-based pages, by a quarter-turn multiple.
    pub fn rotate(&self, data: &[u8], degrees: i32, pages: Option<&[usize]>) -> Result<Vec<u8>> {
        let mut doc = self.load(data)?;
        operations::rotate_pages(&mut doc, degrees, pages, &self.config.cancel)?;
        self.save(&doc)
    }

    /// Remove the given 0-based pages.
    pub fn delete_pages(&self, data: &[u8], pages: &[usize]) -> Result<Vec<u8>> {
        let mut doc = self.load(data)?;
        operations::delete_pages(&mut doc, pages)?;
        self.save(&doc)
    }

    /// Rearrange pages; `order[i]` is the old index of new page `i`.
    pub fn reorder_pages(&self, data: &[u8], order: &[usize]) -> Result<Vec<u8>> {
        let mut doc = self.load(data)?;
        operations::reorder_pages(&mut doc, order)?;
        self.save(&doc)
    }

    /// Stamp a watermark.
    pub fn watermark(&self, data: &[u8], options: &WatermarkOptions) -> Result<Vec<u8>> {
        let mut doc = self.load(data)?;
        operations::watermark(&mut doc, options, &self.config.cancel)?;
        self.save(&doc)
    }

    /// Stamp page numbers.
    pub fn add_page_numbers(&self, data: &[u8], options: &PageNumberOptions) -> Result<Vec<u8>> {
        let mut doc = self.load(data)?;
        operations::add_page_numbers(&mut doc, options, &self.config.cancel)?;
        self.save(&doc)
    }

    /// Encrypt with the standard security handler.
    pub fn lock(&self, data: &[u8], config: &EncryptionConfig) -> Result<Vec<u8>> {
        let mut doc = self.load(data)?;
        let file_id = doc.ensure_file_id();
        let handler = EncryptionWriteHandler::create(config, &file_id)?;
        doc.set_encryption(Some(handler));
        log::info!("Locking document with {:?}", config.algorithm);
        self.save(&doc)
    }

    /// Remove encryption, authenticating with the user or the owner password.
    ///
    /// An unencrypted input is rewritten unchanged.
    pub fn unlock(&self, data: &[u8], password: &str) -> Result<Vec<u8>> {
        let mut doc = reader::parse_with_password(data, password, &self.config.reader)?;
        if doc.is_encrypted() {
            doc.set_encryption(None);
            log::info!("Removed document encryption");
        }
        self.save(&doc)
    }

    /// One page per image.
    pub fn images_to_pdf(&self, images: &[ImageInput]) -> Result<Vec<u8>> {
        let doc = operations::images_to_pdf(images, &self.config.cancel)?;
        self.save(&doc)
    }

    /// Number of pages.
    pub fn page_count(&self, data: &[u8]) -> Result<usize> {
        self.load(data)?.page_count()
    }

    /// Info dictionary contents.
    pub fn metadata(&self, data: &[u8]) -> Result<DocumentInfo> {
        Ok(self.load(data)?.info())
    }

    /// Merge `info` into the Info dictionary, stamping `ModDate` and `Producer`.
    pub fn set_metadata(&self, data: &[u8], info: &DocumentInfo) -> Result<Vec<u8>> {
        let mut doc = self.load(data)?;
        operations::update_metadata(&mut doc, info);
        self.save(&doc)
    }
}

fn zip_parts(parts: &[Vec<u8>]) -> Result<Vec<u8>> {
    let mut archive = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (index, part) in parts.iter().enumerate() {
        archive.start_file(format!("split_{}.pdf", index + 1), options)?;
        archive.write_all(part)?;
    }
    Ok(archive.finish()?.into_inner())
}

/// Merge PDFs in order.
pub fn merge_pdf(inputs: &[&[u8]]) -> Result<Vec<u8>> {
    Engine::default().merge(inputs)
}

/// Split a PDF into 1-based inclusive ranges.
pub fn split_pdf(data: &[u8], ranges: &[(usize, usize)]) -> Result<Vec<Vec<u8>>> {
    Engine::default().split(data, ranges)
}

/// Split a PDF, zipping the parts when there is more than one.
pub fn split_pdf_to_zip(data: &[u8], ranges: &[(usize, usize)]) -> Result<SplitOutput> {
    Engine::default().split_to_zip(data, ranges)
}

/// Rotate pages.
pub fn rotate_pdf(data: &[u8], degrees: i32, pages: Option<&[usize]>) -> Result<Vec<u8>> {
    Engine::default().rotate(data, degrees, pages)
}

/// Delete 0-based pages.
pub fn delete_pages(data: &[u8], pages: &[usize]) -> Result<Vec<u8>> {
    Engine::default().delete_pages(data, pages)
}

/// Reorder pages.
pub fn reorder_pages(data: &[u8], order: &[usize]) -> Result<Vec<u8>> {
    Engine::default().reorder_pages(data, order)
}

/// Stamp a watermark.
pub fn watermark_pdf(data: &[u8], options: &WatermarkOptions) -> Result<Vec<u8>> {
    Engine::default().watermark(data, options)
}

/// Stamp page numbers.
pub fn add_page_numbers(data: &[u8], options: &PageNumberOptions) -> Result<Vec<u8>> {
    Engine::default().add_page_numbers(data, options)
}

/// Encrypt a PDF.
pub fn lock_pdf(data: &[u8], config: &EncryptionConfig) -> Result<Vec<u8>> {
    Engine::default().lock(data, config)
}

/// Decrypt a PDF.
pub fn unlock_pdf(data: &[u8], password: &str) -> Result<Vec<u8>> {
    Engine::default().unlock(data, password)
}

/// Build a PDF from images.
pub fn images_to_pdf(images: &[ImageInput]) -> Result<Vec<u8>> {
    Engine::default().images_to_pdf(images)
}

/// Count pages.
pub fn page_count(data: &[u8]) -> Result<usize> {
    Engine::default().page_count(data)
}

/// Read document metadata.
pub fn get_metadata(data: &[u8]) -> Result<DocumentInfo> {
    Engine::default().metadata(data)
}

/// Update document metadata.
pub fn set_metadata(data: &[u8], info: &DocumentInfo) -> Result<Vec<u8>> {
    Engine::default().set_metadata(data, info)
}

fn from_json<'de, T: Deserialize<'de>>(field: &str, value: &'de str) -> Result<T> {
    serde_json::from_str(value).map_err(|e| Error::InvalidInput(format!("invalid {} field: {}", field, e)))
}

/// Parse a `pages` form field: a JSON array of 0-based indices.
pub fn parse_page_list(value: &str) -> Result<Vec<usize>> {
    from_json("pages", value)
}

/// Parse a `ranges` form field: a JSON array of `[start, end]` pairs, 1-based.
pub fn parse_ranges(value: &str) -> Result<Vec<(usize, usize)>> {
    let pairs: Vec<[usize; 2]> = from_json("ranges", value)?;
    Ok(pairs.into_iter().map(|[start, end]| (start, end)).collect())
}

/// Parse a `rotation` form field: a JSON number of degrees.
pub fn parse_rotation(value: &str) -> Result<i32> {
    from_json("rotation", value)
}
