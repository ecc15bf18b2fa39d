//! PDF content stream builder.
//!
//! Builds the small content streams used for page overlays (watermarks,
//! page numbers) and image pages, per ISO 32000-1:2008 Sections 8-9.

use crate::object::Object;

/// Operations that can be added to a content stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentStreamOp {
    /// Save graphics state (q)
    SaveState,
    /// Restore graphics state (Q)
    RestoreState,
    /// Concatenate transformation matrix (cm)
    Transform(f64, f64, f64, f64, f64, f64),
    /// Set graphics state from an ExtGState resource (gs)
    SetExtGState(String),
    /// Set fill color RGB (rg)
    SetFillColorRGB(f64, f64, f64),
    /// Begin text object (BT)
    BeginText,
    /// End text object (ET)
    EndText,
    /// Set font resource and size (Tf)
    SetFont(String, f64),
    /// Set text matrix (Tm)
    SetTextMatrix(f64, f64, f64, f64, f64, f64),
    /// Show text (Tj), WinAnsi-encoded
    ShowText(String),
    /// Paint XObject (Do)
    PaintXObject(String),
}

/// Builder for PDF content streams.
#[derive(Debug, Default, Clone)]
pub struct ContentStreamBuilder {
    operations: Vec<ContentStreamOp>,
}

impl ContentStreamBuilder {
    /// Create a new content stream builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation to the stream.
    pub fn op(&mut self, op: ContentStreamOp) -> &mut Self {
        self.operations.push(op);
        self
    }

    /// Save graphics state.
    pub fn save_state(&mut self) -> &mut Self {
        self.op(ContentStreamOp::SaveState)
    }

    /// Restore graphics state.
    pub fn restore_state(&mut self) -> &mut Self {
        self.op(ContentStreamOp::RestoreState)
    }

    /// Concatenate a matrix onto the CTM.
    pub fn transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> &mut Self {
        self.op(ContentStreamOp::Transform(a, b, c, d, e, f))
    }

    /// Translate, then rotate counter-clockwise by `degrees`.
    pub fn translate_rotate(&mut self, tx: f64, ty: f64, degrees: f64) -> &mut Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        self.transform(cos, sin, -sin, cos, tx, ty)
    }

    /// Apply an ExtGState resource.
    pub fn set_ext_gstate(&mut self, name: &str) -> &mut Self {
        self.op(ContentStreamOp::SetExtGState(name.to_string()))
    }

    /// Set the RGB fill color (components 0..1).
    pub fn set_fill_color(&mut self, r: f64, g: f64, b: f64) -> &mut Self {
        self.op(ContentStreamOp::SetFillColorRGB(r, g, b))
    }

    /// Show `text` with its baseline origin at `(x, y)` in the current space.
    pub fn text(&mut self, font: &str, size: f64, x: f64, y: f64, text: &str) -> &mut Self {
        self.op(ContentStreamOp::BeginText)
            .op(ContentStreamOp::SetFont(font.to_string(), size))
            .op(ContentStreamOp::SetTextMatrix(1.0, 0.0, 0.0, 1.0, x, y))
            .op(ContentStreamOp::ShowText(text.to_string()))
            .op(ContentStreamOp::EndText)
    }

    /// Paint an image XObject scaled to `width` x `height` at `(x, y)`.
    pub fn draw_image(&mut self, name: &str, x: f64, y: f64, width: f64, height: f64) -> &mut Self {
        self.save_state()
            .transform(width, 0.0, 0.0, height, x, y)
            .op(ContentStreamOp::PaintXObject(name.to_string()))
            .restore_state()
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether no operation was added.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Build the content stream bytes.
    pub fn build(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for op in &self.operations {
            write_op(&mut buf, op);
            buf.push(b'\n');
        }
        buf
    }
}

fn write_op(w: &mut Vec<u8>, op: &ContentStreamOp) {
    let line = match op {
        ContentStreamOp::SaveState => "q".to_string(),
        ContentStreamOp::RestoreState => "Q".to_string(),
        ContentStreamOp::Transform(a, b, c, d, e, f) => {
            format!("{} {} {} {} {} {} cm", num(*a), num(*b), num(*c), num(*d), num(*e), num(*f))
        },
        ContentStreamOp::SetExtGState(name) => format!("/{} gs", name),
        ContentStreamOp::SetFillColorRGB(r, g, b) => format!("{} {} {} rg", num(*r), num(*g), num(*b)),
        ContentStreamOp::BeginText => "BT".to_string(),
        ContentStreamOp::EndText => "ET".to_string(),
        ContentStreamOp::SetFont(name, size) => format!("/{} {} Tf", name, num(*size)),
        ContentStreamOp::SetTextMatrix(a, b, c, d, e, f) => {
            format!("{} {} {} {} {} {} Tm", num(*a), num(*b), num(*c), num(*d), num(*e), num(*f))
        },
        ContentStreamOp::ShowText(text) => {
            w.push(b'(');
            write_escaped(w, text);
            w.extend_from_slice(b") Tj");
            return;
        },
        ContentStreamOp::PaintXObject(name) => format!("/{} Do", name),
    };
    w.extend_from_slice(line.as_bytes());
}

/// Number with at most 4 decimals and no trailing zeros.
fn num(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let formatted = format!("{:.4}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Escape text for a literal string in WinAnsi encoding.
///
/// Characters outside Latin-1 have no code in the standard 14 fonts and are
/// replaced by `?`.
fn write_escaped(w: &mut Vec<u8>, text: &str) {
    for ch in text.chars() {
        let code = u32::from(ch);
        let byte = if code < 256 { code as u8 } else { b'?' };
        match byte {
            b'(' | b')' | b'\\' => {
                w.push(b'\\');
                w.push(byte);
            },
            b'\n' => w.extend_from_slice(b"\\n"),
            b'\r' => w.extend_from_slice(b"\\r"),
            _ => w.push(byte),
        }
    }
}

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // space - /
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0 - 9
    278, 278, 584, 584, 584, 556, 1015, // : - @
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A - M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N - Z
    278, 278, 278, 469, 556, 333, // [ - `
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a - m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n - z
    334, 260, 334, 584, // { - ~
];

/// Width of `text` set in Helvetica at `size` points.
pub fn helvetica_text_width(text: &str, size: f64) -> f64 {
    let units: u32 = text
        .chars()
        .map(|c| match u32::from(c) {
            code @ 32..=126 => u32::from(HELVETICA_WIDTHS[(code - 32) as usize]),
            _ => 556,
        })
        .sum();
    f64::from(units) * size / 1000.0
}

/// A Type1 font dictionary for one of the standard 14 fonts.
pub fn standard_font(base_font: &str) -> Object {
    super::ObjectSerializer::dict(vec![
        ("Type", Object::Name("Font".into())),
        ("Subtype", Object::Name("Type1".into())),
        ("BaseFont", Object::Name(base_font.into())),
        ("Encoding", Object::Name("WinAnsiEncoding".into())),
    ])
}

/// An ExtGState dictionary setting both fill and stroke opacity.
pub fn opacity_gstate(opacity: f64) -> Object {
    super::ObjectSerializer::dict(vec![
        ("Type", Object::Name("ExtGState".into())),
        ("ca", Object::Real(opacity)),
        ("CA", Object::Real(opacity)),
    ])
}
