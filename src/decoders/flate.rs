//! FlateDecode (zlib/deflate).
//!
//! Decoding falls back through several strategies because real-world PDFs ship
//! with damaged zlib headers and truncated streams.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::Compression;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use libflate::zlib::Decoder as LibflateDecoder;
use std::io::{Read, Write};

/// FlateDecode filter implementation.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let zlib_err = match ZlibDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => return Ok(output),
            Err(e) => e,
        };

        // Truncated streams still carry usable data
        if !output.is_empty() {
            log::warn!(
                "FlateDecode partial recovery: {} bytes before corruption: {}",
                output.len(),
                zlib_err
            );
            return Ok(output);
        }

        log::debug!("Zlib decode failed ({}), trying raw deflate", zlib_err);
        output.clear();
        if DeflateDecoder::new(input).read_to_end(&mut output).is_ok() || !output.is_empty() {
            return Ok(output);
        }

        log::debug!("Raw deflate failed, trying libflate");
        output.clear();
        if let Ok(mut decoder) = LibflateDecoder::new(input) {
            if decoder.read_to_end(&mut output).is_ok() || !output.is_empty() {
                return Ok(output);
            }
        }

        Err(Error::malformed(format!("FlateDecode failed: {}", zlib_err)))
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

/// Compress data with zlib at the default level.
pub fn flate_encode(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
