//! Stream filters.
//!
//! The engine only needs to decode streams it must look inside (cross-reference
//! streams, object streams, and content for comparison in tests). Image filters
//! such as DCTDecode are passed through untouched because page data is never
//! re-encoded.
//!
//! Decoders can be chained together in a filter pipeline.

use crate::error::{Error, Result};

mod ascii;
mod flate;
mod predictor;

pub use ascii::{Ascii85Decoder, AsciiHexDecoder};
pub use flate::{FlateDecoder, flate_encode};
pub use predictor::{DecodeParams, decode_predictor};

/// Filters that describe image encodings the engine never needs to decode.
const PASSTHROUGH_FILTERS: &[&str] = &["DCTDecode", "JPXDecode", "CCITTFaxDecode", "JBIG2Decode"];

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Filter name as it appears in `/Filter` (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

fn decoder_for(name: &str) -> Option<Box<dyn StreamDecoder>> {
    match name {
        "FlateDecode" | "Fl" => Some(Box::new(FlateDecoder)),
        "ASCIIHexDecode" | "AHx" => Some(Box::new(AsciiHexDecoder)),
        "ASCII85Decode" | "A85" => Some(Box::new(Ascii85Decoder)),
        _ => None,
    }
}

/// Whether a filter name is one this module can decode.
pub fn is_supported(name: &str) -> bool {
    decoder_for(name).is_some() || PASSTHROUGH_FILTERS.contains(&name)
}

/// Decode stream data through a filter pipeline, then undo any predictor.
///
/// `max_size` bounds the output of every stage (0 disables the check) so a
/// tiny compressed stream cannot expand without limit.
pub fn decode_stream(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
    max_size: usize,
) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for name in filters {
        if PASSTHROUGH_FILTERS.contains(&name.as_str()) {
            log::trace!("Leaving {} data encoded", name);
            return Ok(current);
        }
        let decoder = decoder_for(name)
            .ok_or_else(|| Error::malformed(format!("unsupported stream filter /{}", name)))?;
        current = decoder.decode(&current)?;

        if max_size > 0 && current.len() > max_size {
            return Err(Error::malformed(format!(
                "decoded stream of {} bytes exceeds limit of {} bytes",
                current.len(),
                max_size
            )));
        }
    }

    if let Some(params) = params {
        if params.predictor > 1 {
            current = decode_predictor(&current, params)?;
        }
    }

    Ok(current)
}
