//! Building a document from images.

use crate::config::CancellationToken;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::writer::{ContentStreamBuilder, ImageData, ImageFormat, ObjectSerializer};

/// An uploaded image with its declared MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    /// Encoded JPEG or PNG bytes
    pub data: Vec<u8>,
    /// Declared type such as `image/png`; sniffed from the bytes when absent
    pub mime_type: Option<String>,
}

impl ImageInput {
    /// Image whose format is detected from its bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, mime_type: None }
    }

    /// Image with a declared MIME type.
    pub fn with_mime_type(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: Some(mime_type.into()),
        }
    }

    fn decode(&self) -> Result<ImageData> {
        let format = match &self.mime_type {
            Some(mime) => ImageFormat::from_mime(mime)
                .ok_or_else(|| Error::InvalidParameter(format!("unsupported image type {}", mime)))?,
            None => ImageFormat::sniff(&self.data)
                .ok_or_else(|| Error::InvalidInput("data is neither JPEG nor PNG".into()))?,
        };
        match format {
            ImageFormat::Jpeg => ImageData::from_jpeg(self.data.clone()),
            ImageFormat::Png => ImageData::from_png(&self.data),
        }
    }
}

/// One page per image, each page exactly the image's pixel size (1px = 1pt).
pub fn images_to_pdf(images: &[ImageInput], cancel: &CancellationToken) -> Result<Document> {
    if images.is_empty() {
        return Err(Error::InvalidInput("no images given".into()));
    }

    let mut doc = Document::new();
    let root = doc.pages_root()?;
    let mut pages: Vec<ObjectRef> = Vec::with_capacity(images.len());
    for (index, input) in images.iter().enumerate() {
        cancel.check()?;
        let image = input.decode()?;
        let xobject = image.add_to(&mut doc);
        let (width, height) = (f64::from(image.width), f64::from(image.height));

        let mut content = ContentStreamBuilder::new();
        content.draw_image("Im1", 0.0, 0.0, width, height);
        let contents = doc.add_object(ObjectSerializer::stream(vec![], content.build()));

        let page = doc.add_object(ObjectSerializer::dict(vec![
            ("Type", ObjectSerializer::name("Page")),
            ("Parent", ObjectSerializer::reference(root)),
            ("MediaBox", ObjectSerializer::rect(0.0, 0.0, width, height)),
            ("Contents", ObjectSerializer::reference(contents)),
            (
                "Resources",
                ObjectSerializer::dict(vec![(
                    "XObject",
                    ObjectSerializer::dict(vec![("Im1", Object::Reference(xobject))]),
                )]),
            ),
        ]));
        pages.push(page);
        log::debug!("Image {} placed on a {}x{} page", index + 1, image.width, image.height);
    }

    doc.flatten_page_tree(&pages)?;
    log::info!("Built {} pages from images", pages.len());
    Ok(doc)
}
