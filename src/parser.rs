//! PDF object parser.
//!
//! Combines lexer tokens into objects by recursive descent: arrays,
//! dictionaries, streams and `n g R` references. Functions return nom
//! `IResult`s. Structural violations that must abort the whole document
//! (unbalanced nesting, a stream whose `/Length` does not land on
//! `endstream`) are reported as `nom::Err::Failure` so callers never retry
//! past them.

use crate::decoders::{AsciiHexDecoder, StreamDecoder};
use crate::error::{Error, Result};
use crate::lexer::{Token, bare_keyword, is_whitespace, token};
use crate::object::{Dict, Object, ObjectRef};
use nom::IResult;

/// Resolves an indirect `/Length` to a byte count.
pub type LengthResolver<'r> = dyn Fn(ObjectRef) -> Option<usize> + 'r;

/// Settings threaded through a parse.
#[derive(Clone, Copy)]
pub struct ParseContext<'r> {
    /// Maximum array/dictionary nesting
    pub max_nesting: usize,
    /// Lookup for indirect stream lengths
    pub resolve_length: Option<&'r LengthResolver<'r>>,
}

impl Default for ParseContext<'_> {
    fn default() -> Self {
        Self {
            max_nesting: 100,
            resolve_length: None,
        }
    }
}

fn fail<T>(input: &[u8], kind: nom::error::ErrorKind) -> IResult<&[u8], T> {
    Err(nom::Err::Failure(nom::error::Error::new(input, kind)))
}

fn soft_fail<T>(input: &[u8]) -> IResult<&[u8], T> {
    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))
}

/// Decode escape sequences in a literal string (ISO 32000-1, 7.3.4.2).
///
/// ```
/// # use minitools_pdf::parser::decode_literal_string;
/// assert_eq!(decode_literal_string(b"Section \\247 1"), b"Section \xa7 1");
/// ```
pub fn decode_literal_string(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        let c = raw[i];
        if c == b'\r' {
            // Unescaped EOL of any kind reads as a single LF
            out.push(b'\n');
            i += if raw.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
            continue;
        }
        if c != b'\\' || i + 1 >= raw.len() {
            out.push(c);
            i += 1;
            continue;
        }

        let next = raw[i + 1];
        i += 2;
        match next {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'(' | b')' | b'\\' => out.push(next),
            b'\n' => {},
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut value = (next - b'0') as u32;
                for _ in 0..2 {
                    match raw.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + (d - b'0') as u32;
                            i += 1;
                        },
                        _ => break,
                    }
                }
                out.push((value & 0xFF) as u8);
            },
            // Unknown escapes drop the backslash
            other => out.push(other),
        }
    }

    out
}

/// Parse a single object with default settings.
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    parse_object_with(input, &ParseContext::default())
}

/// Parse a single object.
pub fn parse_object_with<'a>(input: &'a [u8], ctx: &ParseContext<'_>) -> IResult<&'a [u8], Object> {
    parse_value(input, ctx, 0)
}

fn parse_value<'a>(input: &'a [u8], ctx: &ParseContext<'_>, depth: usize) -> IResult<&'a [u8], Object> {
    let (rest, tok) = token(input)?;

    match tok {
        Token::Null => Ok((rest, Object::Null)),
        Token::True => Ok((rest, Object::Boolean(true))),
        Token::False => Ok((rest, Object::Boolean(false))),
        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::Name(name) => Ok((rest, Object::Name(name))),
        Token::LiteralString(raw) => Ok((rest, Object::String(decode_literal_string(raw)))),
        Token::HexString(raw) => match AsciiHexDecoder.decode(raw) {
            Ok(bytes) => Ok((rest, Object::String(bytes))),
            Err(_) => fail(input, nom::error::ErrorKind::HexDigit),
        },
        Token::Integer(i) => {
            // `id gen R` needs two tokens of lookahead
            if let Ok((after_gen, Token::Integer(gen))) = token(rest) {
                if let Ok((after_r, Token::R)) = token(after_gen) {
                    return match (u32::try_from(i), u16::try_from(gen)) {
                        (Ok(id), Ok(gen)) => Ok((after_r, Object::Reference(ObjectRef::new(id, gen)))),
                        _ => fail(input, nom::error::ErrorKind::TooLarge),
                    };
                }
            }
            Ok((rest, Object::Integer(i)))
        },
        Token::ArrayStart => {
            if depth >= ctx.max_nesting {
                return fail(input, nom::error::ErrorKind::TooLarge);
            }
            parse_array(rest, ctx, depth + 1)
        },
        Token::DictStart => {
            if depth >= ctx.max_nesting {
                return fail(input, nom::error::ErrorKind::TooLarge);
            }
            let (after_dict, dict) = parse_dictionary(rest, ctx, depth + 1)?;
            match token(after_dict) {
                Ok((after_kw, Token::StreamStart)) => {
                    let (after_stream, data) = parse_stream_data(after_kw, &dict, ctx)?;
                    Ok((
                        after_stream,
                        Object::Stream {
                            dict,
                            data: bytes::Bytes::from(data),
                        },
                    ))
                },
                _ => Ok((after_dict, Object::Dictionary(dict))),
            }
        },
        _ => soft_fail(input),
    }
}

fn parse_array<'a>(input: &'a [u8], ctx: &ParseContext<'_>, depth: usize) -> IResult<&'a [u8], Object> {
    let mut items = Vec::new();
    let mut remaining = input;

    loop {
        match token(remaining) {
            Ok((rest, Token::ArrayEnd)) => return Ok((rest, Object::Array(items))),
            Ok(_) => match parse_value(remaining, ctx, depth) {
                Ok((rest, obj)) => {
                    items.push(obj);
                    remaining = rest;
                },
                Err(nom::Err::Error(_)) => return fail(remaining, nom::error::ErrorKind::Char),
                Err(e) => return Err(e),
            },
            // Ran off the end without `]`
            Err(_) => return fail(remaining, nom::error::ErrorKind::Eof),
        }
    }
}

fn parse_dictionary<'a>(input: &'a [u8], ctx: &ParseContext<'_>, depth: usize) -> IResult<&'a [u8], Dict> {
    let mut dict = Dict::new();
    let mut remaining = input;

    loop {
        match token(remaining) {
            Ok((rest, Token::DictEnd)) => return Ok((rest, dict)),
            Ok((rest, Token::Name(key))) => match parse_value(rest, ctx, depth) {
                Ok((after, value)) => {
                    // A null value is equivalent to an absent entry
                    if !value.is_null() {
                        dict.insert(key, value);
                    }
                    remaining = after;
                },
                Err(nom::Err::Error(_)) => return fail(rest, nom::error::ErrorKind::Char),
                Err(e) => return Err(e),
            },
            Ok(_) => return fail(remaining, nom::error::ErrorKind::Tag),
            Err(_) => return fail(remaining, nom::error::ErrorKind::Eof),
        }
    }
}

/// Body of a stream after the `stream` keyword.
fn parse_stream_data<'a>(
    input: &'a [u8],
    dict: &Dict,
    ctx: &ParseContext<'_>,
) -> IResult<&'a [u8], Vec<u8>> {
    let body = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        input
    };

    let declared = match dict.get("Length") {
        Some(Object::Integer(n)) if *n >= 0 => Some(*n as usize),
        Some(Object::Reference(r)) => ctx.resolve_length.and_then(|resolve| resolve(*r)),
        _ => None,
    };

    match declared {
        Some(length) => {
            if length > body.len() {
                log::debug!("Stream Length {} runs past end of input", length);
                return fail(body, nom::error::ErrorKind::Eof);
            }
            let after = skip_eol_ws(&body[length..]);
            match token(after) {
                Ok((rest, Token::StreamEnd)) => Ok((rest, body[..length].to_vec())),
                _ => {
                    log::debug!("Stream Length {} does not end at endstream", length);
                    fail(after, nom::error::ErrorKind::LengthValue)
                },
            }
        },
        None => {
            log::warn!("Stream without a usable /Length, scanning for endstream");
            let pos = find_keyword(body, b"endstream")
                .ok_or_else(|| nom::Err::Failure(nom::error::Error::new(body, nom::error::ErrorKind::Eof)))?;
            let mut end = pos;
            while end > 0 && matches!(body[end - 1], b'\r' | b'\n') {
                end -= 1;
            }
            Ok((&body[pos + b"endstream".len()..], body[..end].to_vec()))
        },
    }
}

fn skip_eol_ws(input: &[u8]) -> &[u8] {
    let n = input.iter().take_while(|&&c| is_whitespace(c)).count();
    &input[n..]
}

/// Position of the first occurrence of `needle`.
pub fn find_keyword(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Position of the last occurrence of `needle`.
pub fn rfind_keyword(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Parse `id gen obj <object> endobj` at the start of `input`.
///
/// A missing `endobj` is tolerated.
pub fn parse_indirect_object<'a>(
    input: &'a [u8],
    ctx: &ParseContext<'_>,
) -> IResult<&'a [u8], (ObjectRef, Object)> {
    let (rest, id) = match token(input)? {
        (rest, Token::Integer(id)) if id >= 0 => match u32::try_from(id) {
            Ok(id) => (rest, id),
            Err(_) => return fail(input, nom::error::ErrorKind::TooLarge),
        },
        _ => return soft_fail(input),
    };
    let (rest, gen) = match token(rest)? {
        (rest, Token::Integer(gen)) if (0..=u16::MAX as i64).contains(&gen) => (rest, gen as u16),
        _ => return soft_fail(input),
    };
    let rest = match token(rest)? {
        (rest, Token::ObjStart) => rest,
        _ => return soft_fail(input),
    };

    let (rest, obj) = parse_object_with(rest, ctx)?;
    let rest = match token(rest) {
        Ok((after, Token::ObjEnd)) => after,
        _ => {
            log::trace!("Object {} {} has no endobj", id, gen);
            rest
        },
    };

    Ok((rest, (ObjectRef::new(id, gen), obj)))
}

/// Parse a trailer: `trailer << ... >>`.
pub fn parse_trailer(input: &[u8]) -> Result<Dict> {
    let (rest, kw) = bare_keyword(input).map_err(|_| Error::malformed("trailer keyword not found"))?;
    if kw != b"trailer" {
        return Err(Error::malformed("trailer keyword not found"));
    }
    match parse_object(rest) {
        Ok((_, Object::Dictionary(dict))) => Ok(dict),
        _ => Err(Error::malformed("trailer is not a dictionary")),
    }
}

/// Convert a nom failure into a document error, reporting the byte offset in `whole`.
pub fn to_error(whole: &[u8], err: nom::Err<nom::error::Error<&[u8]>>, what: &str) -> Error {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let offset = whole.len().saturating_sub(e.input.len());
            let reason = match e.code {
                nom::error::ErrorKind::LengthValue => "stream Length inconsistent with endstream",
                nom::error::ErrorKind::TooLarge => "nesting too deep",
                nom::error::ErrorKind::Eof => "unexpected end of data",
                nom::error::ErrorKind::HexDigit => "invalid hex string",
                _ => "unexpected token",
            };
            Error::malformed(format!("{} at byte {}: {}", what, offset, reason))
        },
        nom::Err::Incomplete(_) => Error::malformed(format!("{}: truncated input", what)),
    }
}
