//! Image XObjects.
//!
//! Per PDF spec Section 8.9, images are embedded as Image XObjects.
//!
//! - **JPEG**: embedded unchanged with the `DCTDecode` filter; dimensions
//!   and component count come from the SOF marker; Adobe CMYK gets an
//!   inverting `/Decode`
//! - **PNG**: decoded with the `image` crate and re-encoded as Flate-compressed
//!   samples; an alpha channel becomes a separate `/SMask` image

use crate::decoders::flate_encode;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};

/// Encoded image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// JPEG image (DCTDecode filter)
    Jpeg,
    /// PNG image
    Png,
}

impl ImageFormat {
    /// Detect the format from magic bytes.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xFF, 0xD8]) {
            Some(ImageFormat::Jpeg)
        } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else {
            None
        }
    }

    /// Format for a MIME type.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageFormat::Jpeg),
            "image/png" => Some(ImageFormat::Png),
            _ => None,
        }
    }
}

/// Color space for image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// Grayscale (1 component per pixel)
    DeviceGray,
    /// RGB color (3 components per pixel)
    DeviceRGB,
    /// CMYK color (4 components per pixel)
    DeviceCMYK,
}

impl ColorSpace {
    /// Get the PDF name for this color space.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRGB => "DeviceRGB",
            ColorSpace::DeviceCMYK => "DeviceCMYK",
        }
    }
}

/// Image data ready for embedding.
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Color space
    pub color_space: ColorSpace,
    /// Source format
    pub format: ImageFormat,
    /// Encoded sample data (JPEG bytes or Flate-compressed samples)
    pub data: Vec<u8>,
    /// Flate-compressed 8-bit alpha channel
    pub soft_mask: Option<Vec<u8>>,
    /// CMYK samples are stored inverted, as Adobe applications write them
    pub inverted: bool,
}

impl ImageData {
    /// Load a JPEG image. The bytes are embedded without transcoding.
    pub fn from_jpeg(data: Vec<u8>) -> Result<Self> {
        let header = parse_jpeg_header(&data)?;
        Ok(Self {
            width: header.width,
            height: header.height,
            color_space: header.color_space,
            format: ImageFormat::Jpeg,
            data,
            soft_mask: None,
            inverted: header.adobe && header.color_space == ColorSpace::DeviceCMYK,
        })
    }

    /// Load a PNG image.
    pub fn from_png(data: &[u8]) -> Result<Self> {
        use image::GenericImageView;

        let img = image::load_from_memory_with_format(data, image::ImageFormat::Png)
            .map_err(|e| Error::InvalidInput(format!("cannot decode PNG: {}", e)))?;
        let (width, height) = img.dimensions();

        let (color_space, pixels, alpha) = match img.color() {
            image::ColorType::L8 | image::ColorType::L16 => {
                (ColorSpace::DeviceGray, img.to_luma8().into_raw(), None)
            },
            image::ColorType::La8 | image::ColorType::La16 => {
                let la = img.to_luma_alpha8();
                let mut gray = Vec::with_capacity((width * height) as usize);
                let mut alpha_channel = Vec::with_capacity((width * height) as usize);
                for pixel in la.pixels() {
                    gray.push(pixel.0[0]);
                    alpha_channel.push(pixel.0[1]);
                }
                (ColorSpace::DeviceGray, gray, Some(alpha_channel))
            },
            image::ColorType::Rgba8 | image::ColorType::Rgba16 => {
                let rgba = img.to_rgba8();
                let mut rgb = Vec::with_capacity((width * height * 3) as usize);
                let mut alpha_channel = Vec::with_capacity((width * height) as usize);
                for pixel in rgba.pixels() {
                    rgb.extend_from_slice(&pixel.0[..3]);
                    alpha_channel.push(pixel.0[3]);
                }
                (ColorSpace::DeviceRGB, rgb, Some(alpha_channel))
            },
            _ => (ColorSpace::DeviceRGB, img.to_rgb8().into_raw(), None),
        };

        // Fully opaque alpha adds nothing
        let alpha = alpha.filter(|a| a.iter().any(|&v| v != 255));

        Ok(Self {
            width,
            height,
            color_space,
            format: ImageFormat::Png,
            data: flate_encode(&pixels)?,
            soft_mask: alpha.map(|a| flate_encode(&a)).transpose()?,
            inverted: false,
        })
    }

    /// Load an image, detecting the format from magic bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        match ImageFormat::sniff(data) {
            Some(ImageFormat::Jpeg) => Self::from_jpeg(data.to_vec()),
            Some(ImageFormat::Png) => Self::from_png(data),
            None => Err(Error::InvalidInput("data is neither JPEG nor PNG".into())),
        }
    }

    /// Image XObject dictionary (without `/SMask`).
    fn xobject_dict(&self) -> Dict {
        let mut dict = Dict::new();
        dict.insert("Type".into(), Object::Name("XObject".into()));
        dict.insert("Subtype".into(), Object::Name("Image".into()));
        dict.insert("Width".into(), Object::Integer(self.width as i64));
        dict.insert("Height".into(), Object::Integer(self.height as i64));
        dict.insert("ColorSpace".into(), Object::Name(self.color_space.pdf_name().into()));
        dict.insert("BitsPerComponent".into(), Object::Integer(8));
        let filter = match self.format {
            ImageFormat::Jpeg => "DCTDecode",
            ImageFormat::Png => "FlateDecode",
        };
        dict.insert("Filter".into(), Object::Name(filter.into()));
        if self.inverted {
            let decode = [1, 0, 1, 0, 1, 0, 1, 0].map(Object::Integer);
            dict.insert("Decode".into(), Object::Array(decode.to_vec()));
        }
        dict
    }

    /// Add the image (and its soft mask) to `doc`, returning the XObject reference.
    pub fn add_to(&self, doc: &mut Document) -> ObjectRef {
        let mut dict = self.xobject_dict();
        if let Some(mask) = &self.soft_mask {
            let mut mask_dict = Dict::new();
            mask_dict.insert("Type".into(), Object::Name("XObject".into()));
            mask_dict.insert("Subtype".into(), Object::Name("Image".into()));
            mask_dict.insert("Width".into(), Object::Integer(self.width as i64));
            mask_dict.insert("Height".into(), Object::Integer(self.height as i64));
            mask_dict.insert("ColorSpace".into(), Object::Name("DeviceGray".into()));
            mask_dict.insert("BitsPerComponent".into(), Object::Integer(8));
            mask_dict.insert("Filter".into(), Object::Name("FlateDecode".into()));
            let mask_ref = doc.add_object(Object::Stream {
                dict: mask_dict,
                data: bytes::Bytes::from(mask.clone()),
            });
            dict.insert("SMask".into(), Object::Reference(mask_ref));
        }
        doc.add_object(Object::Stream {
            dict,
            data: bytes::Bytes::from(self.data.clone()),
        })
    }

    /// Width over height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// What the marker segments before the scan say about a JPEG.
struct JpegHeader {
    width: u32,
    height: u32,
    color_space: ColorSpace,
    /// An APP14 "Adobe" segment precedes the frame
    adobe: bool,
}

/// Parse the JPEG SOF marker for dimensions and color space.
fn parse_jpeg_header(data: &[u8]) -> Result<JpegHeader> {
    let invalid = |msg: &str| Error::InvalidInput(format!("invalid JPEG: {}", msg));
    if !data.starts_with(&[0xFF, 0xD8]) {
        return Err(invalid("missing SOI marker"));
    }

    let mut pos = 2;
    let mut adobe = false;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        pos += 2;

        // Fill bytes, standalone markers
        if marker == 0xFF || marker == 0x00 || marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            continue;
        }
        if marker == 0xD9 || marker == 0xDA {
            break;
        }

        if matches!(
            marker,
            0xC0 | 0xC1 | 0xC2 | 0xC3 | 0xC5 | 0xC6 | 0xC7 | 0xC9 | 0xCA | 0xCB | 0xCD | 0xCE | 0xCF
        ) {
            let header = data.get(pos..pos + 8).ok_or_else(|| invalid("truncated frame header"))?;
            let height = u16::from_be_bytes([header[3], header[4]]) as u32;
            let width = u16::from_be_bytes([header[5], header[6]]) as u32;
            let color_space = match header[7] {
                1 => ColorSpace::DeviceGray,
                3 => ColorSpace::DeviceRGB,
                4 => ColorSpace::DeviceCMYK,
                n => return Err(invalid(&format!("{} color components", n))),
            };
            if width == 0 || height == 0 {
                return Err(invalid("zero dimension"));
            }
            return Ok(JpegHeader {
                width,
                height,
                color_space,
                adobe,
            });
        }

        let length = data
            .get(pos..pos + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]) as usize)
            .ok_or_else(|| invalid("truncated segment"))?;
        if marker == 0xEE && data.get(pos + 2..pos + 7) == Some(b"Adobe".as_slice()) {
            adobe = true;
        }
        pos += length;
    }

    Err(invalid("no frame header found"))
}
