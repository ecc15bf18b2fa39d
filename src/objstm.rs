//! Object stream parsing (PDF 1.5+).
//!
//! An object stream (`/Type /ObjStm`) packs `/N` non-stream objects into one
//! compressed stream. The decoded data starts with `N` pairs of integers
//! `(object number, offset)`; offsets are relative to `/First`.
//!
//! ```text
//! 10 0 11 15 12 28      % pairs
//! << /Type /Font ... >> % object 10 at offset 0
//! [ 0 0 612 792 ]       % object 11 at offset 15
//! ```

use crate::error::{Error, Result};
use crate::lexer::{Token, token};
use crate::object::Object;
use crate::parser::{ParseContext, parse_object_with, to_error};

/// Parse an object stream into `(object number, object)` in stream-index order.
///
/// The container must already be decrypted; objects inside an object stream
/// are never encrypted individually.
pub fn parse_object_stream(
    stream_obj: &Object,
    ctx: &ParseContext<'_>,
    max_size: usize,
) -> Result<Vec<(u32, Object)>> {
    let dict = match stream_obj {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::malformed(format!(
                "object stream is a {}, not a stream",
                other.type_name()
            )));
        },
    };
    if let Some(kind) = stream_obj.dict_type() {
        if kind != "ObjStm" {
            return Err(Error::malformed(format!("expected /Type /ObjStm, got /{}", kind)));
        }
    }

    let count = dict
        .get("N")
        .and_then(|o| o.as_integer())
        .filter(|n| (0..=1_000_000).contains(n))
        .ok_or_else(|| Error::malformed("object stream has no valid /N"))? as usize;
    let first = dict
        .get("First")
        .and_then(|o| o.as_integer())
        .filter(|n| *n >= 0)
        .ok_or_else(|| Error::malformed("object stream has no valid /First"))? as usize;

    let decoded = stream_obj.decode_stream_data(max_size)?;
    if decoded.len() < first {
        return Err(Error::malformed(format!(
            "object stream data is {} bytes, /First is {}",
            decoded.len(),
            first
        )));
    }

    let pairs = parse_pairs(&decoded[..first], count)?;
    let body = &decoded[first..];

    let mut objects = Vec::with_capacity(count);
    for (obj_num, offset) in pairs {
        if offset >= body.len() {
            return Err(Error::malformed(format!(
                "object {} offset {} lies outside its object stream",
                obj_num, offset
            )));
        }
        let (_, obj) = parse_object_with(&body[offset..], ctx)
            .map_err(|e| to_error(body, e, &format!("object {} in object stream", obj_num)))?;
        objects.push((obj_num, obj));
    }

    log::trace!("Expanded object stream with {} objects", objects.len());
    Ok(objects)
}

fn parse_pairs(data: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut pairs = Vec::with_capacity(count);
    let mut rest = data;
    for _ in 0..count {
        let mut next_int = || -> Result<i64> {
            match token(rest) {
                Ok((after, Token::Integer(n))) if n >= 0 => {
                    rest = after;
                    Ok(n)
                },
                _ => Err(Error::malformed("object stream header is truncated")),
            }
        };
        let obj_num = next_int().and_then(|n| {
            u32::try_from(n).map_err(|_| Error::malformed(format!("object number {} in object stream is out of range", n)))
        })?;
        let offset = next_int()? as usize;
        pairs.push((obj_num, offset));
    }
    Ok(pairs)
}
