//! Content overlays: watermarks and page numbers.
//!
//! An overlay never edits existing content streams. The page's `/Contents`
//! becomes `[open, existing..., close]` where `open` is `q` and `close` is
//! `Q q <overlay> Q`, so graphics state set by the original content cannot
//! leak into the overlay. Resources are copied onto the page as a direct
//! dictionary before new entries are added, which leaves resource
//! dictionaries shared with other pages untouched.

use super::select_pages;
use crate::config::CancellationToken;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::writer::{
    ContentStreamBuilder, ImageData, ObjectSerializer, helvetica_text_width, opacity_gstate, standard_font,
};
use serde::{Deserialize, Serialize};

/// What a watermark draws.
#[derive(Debug, Clone, PartialEq)]
pub enum WatermarkKind {
    /// Helvetica text
    Text {
        /// The watermark text
        text: String,
        /// Font size in points
        font_size: f64,
        /// Fill color (RGB, 0.0-1.0)
        color: (f64, f64, f64),
    },
    /// A JPEG or PNG image
    Image {
        /// Encoded image bytes
        data: Vec<u8>,
        /// Image width as a fraction of the page width
        scale: f64,
    },
}

/// Watermark settings.
///
/// The watermark is centered on each page's MediaBox and rotated
/// counter-clockwise around its center.
///
/// # Example
///
/// ```
/// use minitools_pdf::operations::WatermarkOptions;
///
/// let options = WatermarkOptions::text("DRAFT")
///     .with_font_size(60.0)
///     .with_opacity(0.2)
///     .with_pages(vec![0, 2]);
/// assert_eq!(options.rotation, 45.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkOptions {
    /// Text or image
    pub kind: WatermarkKind,
    /// Opacity (0.0 = transparent, 1.0 = opaque)
    pub opacity: f64,
    /// Rotation in degrees (counter-clockwise)
    pub rotation: f64,
    /// 0-based pages to stamp; all pages when `None`
    pub pages: Option<Vec<usize>>,
}

impl WatermarkOptions {
    /// Gray 48pt text at 30% opacity, rotated 45 degrees.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: WatermarkKind::Text {
                text: text.into(),
                font_size: 48.0,
                color: (0.5, 0.5, 0.5),
            },
            opacity: 0.3,
            rotation: 45.0,
            pages: None,
        }
    }

    /// An image spanning half the page width at 30% opacity, unrotated.
    pub fn image(data: Vec<u8>) -> Self {
        Self {
            kind: WatermarkKind::Image { data, scale: 0.5 },
            opacity: 0.3,
            rotation: 0.0,
            pages: None,
        }
    }

    /// Red "CONFIDENTIAL".
    pub fn confidential() -> Self {
        Self::text("CONFIDENTIAL").with_color(0.8, 0.0, 0.0)
    }

    /// Gray "DRAFT".
    pub fn draft() -> Self {
        Self::text("DRAFT")
    }

    /// Set the opacity.
    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    /// Set the rotation angle in degrees.
    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }

    /// Set the font size of a text watermark.
    pub fn with_font_size(mut self, size: f64) -> Self {
        if let WatermarkKind::Text { font_size, .. } = &mut self.kind {
            *font_size = size;
        }
        self
    }

    /// Set the color of a text watermark.
    pub fn with_color(mut self, r: f64, g: f64, b: f64) -> Self {
        if let WatermarkKind::Text { color, .. } = &mut self.kind {
            *color = (r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0));
        }
        self
    }

    /// Set the width of an image watermark relative to the page width.
    pub fn with_scale(mut self, page_fraction: f64) -> Self {
        if let WatermarkKind::Image { scale, .. } = &mut self.kind {
            *scale = page_fraction;
        }
        self
    }

    /// Restrict the watermark to the given 0-based pages.
    pub fn with_pages(mut self, pages: Vec<usize>) -> Self {
        self.pages = Some(pages);
        self
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(Error::InvalidParameter(format!("opacity must be within 0..1, got {}", self.opacity)));
        }
        if !self.rotation.is_finite() {
            return Err(Error::InvalidParameter("rotation must be finite".into()));
        }
        match &self.kind {
            WatermarkKind::Text { text, .. } if text.is_empty() => {
                Err(Error::InvalidParameter("watermark text is empty".into()))
            },
            WatermarkKind::Text { font_size, .. } if !(*font_size > 0.0) => {
                Err(Error::InvalidParameter(format!("font size must be positive, got {}", font_size)))
            },
            WatermarkKind::Image { scale, .. } if !(*scale > 0.0) => {
                Err(Error::InvalidParameter(format!("image scale must be positive, got {}", scale)))
            },
            _ => Ok(()),
        }
    }
}

/// Where page numbers are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PagePosition {
    /// Top margin, left aligned
    TopLeft,
    /// Top margin, centered
    TopCenter,
    /// Top margin, right aligned
    TopRight,
    /// Bottom margin, left aligned
    BottomLeft,
    /// Bottom margin, centered
    #[default]
    BottomCenter,
    /// Bottom margin, right aligned
    BottomRight,
}

/// Page number settings.
///
/// `format` may contain `{n}` (the page's number) and `{total}` (the number
/// of the last page). Numbering counts every page of the document from
/// `start`, even when only a subset is stamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageNumberOptions {
    /// Placement on the page
    pub position: PagePosition,
    /// Label template
    pub format: String,
    /// Number of the first page
    pub start: usize,
    /// Font size in points
    pub font_size: f64,
    /// Distance from the MediaBox edges in points
    pub margin: f64,
    /// Fill color (RGB, 0.0-1.0)
    pub color: [f64; 3],
    /// 0-based pages to stamp; all pages when `None`
    pub pages: Option<Vec<usize>>,
}

impl Default for PageNumberOptions {
    fn default() -> Self {
        Self {
            position: PagePosition::BottomCenter,
            format: "{n}".to_string(),
            start: 1,
            font_size: 12.0,
            margin: 36.0,
            color: [0.0, 0.0, 0.0],
            pages: None,
        }
    }
}

impl PageNumberOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the placement.
    pub fn with_position(mut self, position: PagePosition) -> Self {
        self.position = position;
        self
    }

    /// Set the label template.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Set the number of the first page.
    pub fn with_start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    /// Set the font size.
    pub fn with_font_size(mut self, size: f64) -> Self {
        self.font_size = size;
        self
    }

    /// Set the margin.
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Restrict numbering to the given 0-based pages.
    pub fn with_pages(mut self, pages: Vec<usize>) -> Self {
        self.pages = Some(pages);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.format.is_empty() {
            return Err(Error::InvalidParameter("page number format is empty".into()));
        }
        if !(self.font_size > 0.0) {
            return Err(Error::InvalidParameter(format!("font size must be positive, got {}", self.font_size)));
        }
        if !(self.margin >= 0.0) {
            return Err(Error::InvalidParameter(format!("margin must not be negative, got {}", self.margin)));
        }
        Ok(())
    }

    fn label(&self, index: usize, page_count: usize) -> String {
        let total = self.start + page_count.saturating_sub(1);
        self.format
            .replace("{n}", &(self.start + index).to_string())
            .replace("{total}", &total.to_string())
    }
}

/// Stamp a text or image watermark onto the selected pages.
pub fn watermark(doc: &mut Document, options: &WatermarkOptions, cancel: &CancellationToken) -> Result<()> {
    options.validate()?;
    let all = doc.page_refs()?;
    let targets = match &options.pages {
        Some(indices) => select_pages(&all, indices)?,
        None => all,
    };

    let gstate = doc.add_object(opacity_gstate(options.opacity));
    let mark = match &options.kind {
        WatermarkKind::Text { .. } => Mark::Font(doc.add_object(standard_font("Helvetica"))),
        WatermarkKind::Image { data, .. } => {
            let image = ImageData::from_bytes(data)?;
            let aspect = image.aspect_ratio();
            Mark::Image(image.add_to(doc), aspect)
        },
    };

    for &page in &targets {
        cancel.check()?;
        let (category, prefix, target) = match mark {
            Mark::Font(font) => ("Font", "WmF", font),
            Mark::Image(image, _) => ("XObject", "WmIm", image),
        };
        let names = register_resources(doc, page, &[("ExtGState", "WmGs", gstate), (category, prefix, target)])?;

        let [x0, y0, x1, y1] = doc.media_box(page);
        let mut content = ContentStreamBuilder::new();
        content
            .set_ext_gstate(&names[0])
            .translate_rotate((x0 + x1) / 2.0, (y0 + y1) / 2.0, options.rotation);
        match (&options.kind, mark) {
            (WatermarkKind::Text { text, font_size, color }, _) => {
                let width = helvetica_text_width(text, *font_size);
                content
                    .set_fill_color(color.0, color.1, color.2)
                    .text(&names[1], *font_size, -width / 2.0, -font_size * 0.35, text);
            },
            (WatermarkKind::Image { scale, .. }, Mark::Image(_, aspect)) => {
                let width = (x1 - x0) * scale;
                let height = width / aspect;
                content.draw_image(&names[1], -width / 2.0, -height / 2.0, width, height);
            },
            (WatermarkKind::Image { .. }, Mark::Font(_)) => {},
        }
        wrap_contents(doc, page, content.build())?;
    }
    log::info!("Watermarked {} pages", targets.len());
    Ok(())
}

/// Stamp page number labels onto the selected pages.
pub fn add_page_numbers(doc: &mut Document, options: &PageNumberOptions, cancel: &CancellationToken) -> Result<()> {
    options.validate()?;
    let all = doc.page_refs()?;
    let targets: Vec<(usize, ObjectRef)> = match &options.pages {
        Some(indices) => indices.iter().copied().zip(select_pages(&all, indices)?).collect(),
        None => all.iter().copied().enumerate().collect(),
    };

    let font = doc.add_object(standard_font("Helvetica"));
    let size = options.font_size;
    for &(index, page) in &targets {
        cancel.check()?;
        let names = register_resources(doc, page, &[("Font", "PnF", font)])?;
        let label = options.label(index, all.len());
        let width = helvetica_text_width(&label, size);

        let [x0, y0, x1, y1] = doc.media_box(page);
        let x = match options.position {
            PagePosition::TopLeft | PagePosition::BottomLeft => x0 + options.margin,
            PagePosition::TopCenter | PagePosition::BottomCenter => (x0 + x1 - width) / 2.0,
            PagePosition::TopRight | PagePosition::BottomRight => x1 - options.margin - width,
        };
        let y = match options.position {
            PagePosition::TopLeft | PagePosition::TopCenter | PagePosition::TopRight => y1 - options.margin - size,
            _ => y0 + options.margin,
        };

        let [r, g, b] = options.color;
        let mut content = ContentStreamBuilder::new();
        content.set_fill_color(r, g, b).text(&names[0], size, x, y, &label);
        wrap_contents(doc, page, content.build())?;
    }
    log::info!("Numbered {} pages", targets.len());
    Ok(())
}

#[derive(Clone, Copy)]
enum Mark {
    Font(ObjectRef),
    Image(ObjectRef, f64),
}

/// Add `(category, name prefix, target)` entries to the page's resources,
/// returning the names chosen. A numeric suffix keeps names unique.
fn register_resources(doc: &mut Document, page: ObjectRef, wanted: &[(&str, &str, ObjectRef)]) -> Result<Vec<String>> {
    let mut resources = match doc.inherited_attribute(page, "Resources") {
        Some(Object::Dictionary(dict)) => dict,
        _ => Dict::new(),
    };
    let mut names = Vec::with_capacity(wanted.len());
    for &(category, prefix, target) in wanted {
        let mut entries = resources
            .get(category)
            .map(|o| doc.resolve(o))
            .and_then(|o| o.as_dict())
            .cloned()
            .unwrap_or_default();
        let name = (1..)
            .map(|n| format!("{}{}", prefix, n))
            .find(|candidate| !entries.contains_key(candidate))
            .unwrap_or_else(|| prefix.to_string());
        entries.insert(name.clone(), Object::Reference(target));
        resources.insert(category.to_string(), Object::Dictionary(entries));
        names.push(name);
    }
    doc.get_dict_mut(page)?.insert("Resources".into(), Object::Dictionary(resources));
    Ok(names)
}

/// Bracket the page's content with `q`/`Q` and append `overlay` after it.
fn wrap_contents(doc: &mut Document, page: ObjectRef, overlay: Vec<u8>) -> Result<()> {
    let existing = match doc.get_dict(page)?.get("Contents") {
        Some(Object::Reference(r)) => match doc.get(*r) {
            Some(Object::Array(items)) => items.clone(),
            Some(_) => vec![Object::Reference(*r)],
            None => Vec::new(),
        },
        Some(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let open = doc.add_object(ObjectSerializer::stream(vec![], b"q\n".to_vec()));
    let mut body = b"Q\nq\n".to_vec();
    body.extend_from_slice(&overlay);
    body.extend_from_slice(b"Q\n");
    let close = doc.add_object(ObjectSerializer::stream(vec![], body));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open));
    contents.extend(existing);
    contents.push(Object::Reference(close));
    doc.get_dict_mut(page)?.insert("Contents".into(), Object::Array(contents));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::tests::sample_doc;
    use crate::writer::png_bytes;

    fn streams(doc: &Document, page: ObjectRef) -> Vec<String> {
        doc.get_dict(page).unwrap()["Contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|o| {
                let data = doc.get(o.as_reference().unwrap()).unwrap().decode_stream_data(0).unwrap();
                String::from_utf8_lossy(&data).into_owned()
            })
            .collect()
    }

    fn resources(doc: &Document, page: ObjectRef) -> &Dict {
        doc.get_dict(page).unwrap()["Resources"].as_dict().unwrap()
    }

    #[test]
    fn test_text_watermark_wraps_content() {
        let mut doc = sample_doc(&["0 0 m 10 10 l S", "BT ET"]);
        watermark(&mut doc, &WatermarkOptions::confidential(), &CancellationToken::new()).unwrap();

        let page = doc.page_refs().unwrap()[0];
        let parts = streams(&doc, page);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "q\n");
        assert_eq!(parts[1], "0 0 m 10 10 l S");
        assert!(parts[2].starts_with("Q\nq\n/WmGs1 gs\n"));
        assert!(parts[2].contains("0.8 0 0 rg"));
        assert!(parts[2].contains("/WmF1 48 Tf"));
        assert!(parts[2].contains("(CONFIDENTIAL) Tj"));
        assert!(parts[2].ends_with("Q\n"));

        let res = resources(&doc, page);
        assert!(res["Font"].as_dict().unwrap().contains_key("WmF1"));
        let gs = res["ExtGState"].as_dict().unwrap()["WmGs1"].as_reference().unwrap();
        assert_eq!(doc.get_dict(gs).unwrap()["ca"], Object::Real(0.3));
    }

    #[test]
    fn test_watermark_centered_on_media_box() {
        let mut doc = sample_doc(&["a"]);
        let options = WatermarkOptions::text("X").with_rotation(0.0);
        watermark(&mut doc, &options, &CancellationToken::new()).unwrap();
        let page = doc.page_refs().unwrap()[0];
        assert!(streams(&doc, page)[2].contains("1 0 0 1 150 200 cm"));
    }

    #[test]
    fn test_watermark_resource_names_do_not_collide() {
        let mut doc = sample_doc(&["a"]);
        let page = doc.page_refs().unwrap()[0];
        let shared = doc.add_object(ObjectSerializer::dict(vec![(
            "Font",
            ObjectSerializer::dict(vec![("WmF1", ObjectSerializer::name("Existing"))]),
        )]));
        doc.get_dict_mut(page).unwrap().insert("Resources".into(), Object::Reference(shared));

        watermark(&mut doc, &WatermarkOptions::draft(), &CancellationToken::new()).unwrap();

        let fonts = resources(&doc, page)["Font"].as_dict().unwrap();
        assert_eq!(fonts["WmF1"], ObjectSerializer::name("Existing"));
        assert!(fonts.contains_key("WmF2"));
        assert!(streams(&doc, page)[2].contains("/WmF2 48 Tf"));
        // The shared dictionary is untouched
        let original = doc.get_dict(shared).unwrap()["Font"].as_dict().unwrap();
        assert_eq!(original.len(), 1);
    }

    #[test]
    fn test_watermark_page_subset() {
        let mut doc = sample_doc(&["a", "b", "c"]);
        let options = WatermarkOptions::draft().with_pages(vec![1]);
        watermark(&mut doc, &options, &CancellationToken::new()).unwrap();
        let pages = doc.page_refs().unwrap();
        assert!(doc.get_dict(pages[0]).unwrap()["Contents"].as_reference().is_some());
        assert_eq!(streams(&doc, pages[1]).len(), 3);
        assert!(doc.get_dict(pages[2]).unwrap()["Contents"].as_reference().is_some());
    }

    #[test]
    fn test_image_watermark() {
        let mut doc = sample_doc(&["a"]);
        let options = WatermarkOptions::image(png_bytes(4, 2, 255)).with_scale(0.5);
        watermark(&mut doc, &options, &CancellationToken::new()).unwrap();
        let page = doc.page_refs().unwrap()[0];
        let xobjects = resources(&doc, page)["XObject"].as_dict().unwrap();
        let image = xobjects["WmIm1"].as_reference().unwrap();
        assert_eq!(doc.get(image).unwrap().as_dict().unwrap()["Width"], Object::Integer(4));
        // 150 x 75 image centered at the origin of the rotated space
        assert!(streams(&doc, page)[2].contains("150 0 0 75 -75 -37.5 cm\n/WmIm1 Do"));
    }

    #[test]
    fn test_watermark_invalid_options() {
        let cancel = CancellationToken::new();
        let mut doc = sample_doc(&["a"]);
        for options in [
            WatermarkOptions::draft().with_opacity(1.5),
            WatermarkOptions::text(""),
            WatermarkOptions::draft().with_font_size(0.0),
            WatermarkOptions::image(vec![1, 2, 3]).with_scale(-1.0),
        ] {
            assert!(matches!(watermark(&mut doc, &options, &cancel), Err(Error::InvalidParameter(_))));
        }
        let options = WatermarkOptions::draft().with_pages(vec![4]);
        assert!(matches!(
            watermark(&mut doc, &options, &cancel),
            Err(Error::PageIndexOutOfRange { index: 4, count: 1 })
        ));
        let options = WatermarkOptions::image(b"not an image".to_vec());
        assert!(matches!(watermark(&mut doc, &options, &cancel), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_page_numbers_format() {
        let mut doc = sample_doc(&["a", "b", "c"]);
        let options = PageNumberOptions::new().with_format("Page {n} of {total}");
        add_page_numbers(&mut doc, &options, &CancellationToken::new()).unwrap();
        let pages = doc.page_refs().unwrap();
        assert!(streams(&doc, pages[0])[2].contains("(Page 1 of 3) Tj"));
        assert!(streams(&doc, pages[2])[2].contains("(Page 3 of 3) Tj"));
    }

    #[test]
    fn test_page_numbers_position_and_subset() {
        let mut doc = sample_doc(&["a", "b"]);
        let options = PageNumberOptions::new()
            .with_position(PagePosition::BottomLeft)
            .with_start(10)
            .with_pages(vec![1]);
        add_page_numbers(&mut doc, &options, &CancellationToken::new()).unwrap();
        let pages = doc.page_refs().unwrap();
        assert!(doc.get_dict(pages[0]).unwrap()["Contents"].as_reference().is_some());
        let overlay = &streams(&doc, pages[1])[2];
        assert!(overlay.contains("1 0 0 1 36 36 Tm"));
        assert!(overlay.contains("(11) Tj"));
    }

    #[test]
    fn test_page_numbers_top_right() {
        let mut doc = sample_doc(&["a"]);
        let options = PageNumberOptions::new()
            .with_position(PagePosition::TopRight)
            .with_font_size(10.0)
            .with_margin(20.0);
        add_page_numbers(&mut doc, &options, &CancellationToken::new()).unwrap();
        let page = doc.page_refs().unwrap()[0];
        // "1" is 5.56pt wide at 10pt
        assert!(streams(&doc, page)[2].contains("1 0 0 1 274.44 370 Tm"));
    }

    #[test]
    fn test_placement_ignores_inherited_rotate() {
        let cancel = CancellationToken::new();
        let rotated = || {
            let mut doc = sample_doc(&["a"]);
            let root = doc.pages_root().unwrap();
            doc.get_dict_mut(root).unwrap().insert("Rotate".into(), Object::Integer(90));
            doc
        };
        let watermark_options = WatermarkOptions::text("X").with_rotation(0.0);
        let number_options = PageNumberOptions::new().with_position(PagePosition::TopRight);

        let mut plain = sample_doc(&["a"]);
        let mut turned = rotated();
        watermark(&mut plain, &watermark_options, &cancel).unwrap();
        watermark(&mut turned, &watermark_options, &cancel).unwrap();
        let page = turned.page_refs().unwrap()[0];
        assert_eq!(turned.page_rotation(page), 90);
        let overlay = &streams(&turned, page)[2];
        assert!(overlay.contains("1 0 0 1 150 200 cm"));
        assert_eq!(overlay, &streams(&plain, plain.page_refs().unwrap()[0])[2]);

        let mut plain = sample_doc(&["a"]);
        let mut turned = rotated();
        add_page_numbers(&mut plain, &number_options, &cancel).unwrap();
        add_page_numbers(&mut turned, &number_options, &cancel).unwrap();
        let page = turned.page_refs().unwrap()[0];
        assert_eq!(streams(&turned, page)[2], streams(&plain, plain.page_refs().unwrap()[0])[2]);
    }

    #[test]
    fn test_page_number_options_from_json() {
        let options: PageNumberOptions =
            serde_json::from_str(r#"{"position":"top-center","format":"{n}/{total}","fontSize":9}"#).unwrap();
        assert_eq!(options.position, PagePosition::TopCenter);
        assert_eq!(options.format, "{n}/{total}");
        assert_eq!(options.font_size, 9.0);
        assert_eq!(options.start, 1);
        assert_eq!(options.margin, 36.0);
    }

    #[test]
    fn test_page_numbers_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut doc = sample_doc(&["a"]);
        assert!(matches!(
            add_page_numbers(&mut doc, &PageNumberOptions::new(), &cancel),
            Err(Error::Cancelled)
        ));
    }
}
