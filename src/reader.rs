//! Binary reader: bytes to [`Document`].
//!
//! Loading is eager. The cross-reference chain is merged first, then every
//! in-use object is parsed, decrypted when the file carries `/Encrypt`, and
//! objects packed in object streams are expanded into the arena. Container
//! object streams and xref streams are dropped afterwards since the writer
//! always emits plain objects and a classic table.

use crate::config::ReaderOptions;
use crate::document::{Document, MAX_OBJECT_ID};
use crate::encryption::EncryptionHandler;
use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::{LengthResolver, ParseContext, find_keyword, parse_indirect_object, to_error};
use crate::xref::{CrossRefTable, XRefEntry, find_startxref, parse_xref_chain};
use std::collections::{BTreeMap, HashMap};

/// How far into the file the `%PDF-` header is searched for.
const HEADER_WINDOW: usize = 1024;

/// Trailer keys that only describe the xref section they came from.
const SECTION_KEYS: [&str; 10] = [
    "Prev", "XRefStm", "Size", "Encrypt", "Type", "W", "Index", "Filter", "DecodeParms", "Length",
];

/// Parse an unencrypted document, or one that opens with the empty password.
pub fn parse(data: &[u8]) -> Result<Document> {
    parse_with_password(data, "", &ReaderOptions::default())
}

/// Parse a document, authenticating with `password` when it is encrypted.
///
/// # Errors
///
/// * [`Error::MalformedDocument`] when the structure cannot be read
/// * [`Error::UnsupportedEncryption`] for unknown security handlers
/// * [`Error::IncorrectPassword`] when the password matches neither user nor owner
pub fn parse_with_password(data: &[u8], password: &str, options: &ReaderOptions) -> Result<Document> {
    let (data, version) = locate_header(data)?;
    log::debug!("Parsing PDF {}.{} ({} bytes)", version.0, version.1, data.len());

    let plain_ctx = ParseContext {
        max_nesting: options.max_nesting,
        resolve_length: None,
    };
    let start = find_startxref(data)?;
    let xref = parse_xref_chain(data, start, options.max_xref_chain, &plain_ctx)?;
    log::debug!("Cross-reference table has {} entries", xref.len());

    let resolver: &LengthResolver<'_> = &|r: ObjectRef| indirect_length(data, &xref, r, &plain_ctx);
    let ctx = ParseContext {
        max_nesting: options.max_nesting,
        resolve_length: Some(resolver),
    };

    let mut objects = load_objects(data, &xref, &ctx)?;
    let mut trailer = xref.trailer().clone();

    let encryption = match trailer.get("Encrypt").cloned() {
        Some(encrypt) => Some(open_encryption(&mut objects, &trailer, &encrypt, password)?),
        None => None,
    };

    expand_object_streams(&mut objects, &xref, &plain_ctx, options.max_decompressed_size)?;
    objects.retain(|r, obj| {
        let container = matches!(obj.dict_type(), Some("ObjStm") | Some("XRef")) && matches!(obj, Object::Stream { .. });
        !container && !xref.is_xref_stream(r.id)
    });

    if let Some(top) = objects.keys().next_back().filter(|r| r.id > MAX_OBJECT_ID) {
        return Err(Error::malformed(format!(
            "object number {} exceeds the limit of {}",
            top.id, MAX_OBJECT_ID
        )));
    }

    for key in SECTION_KEYS {
        trailer.remove(key);
    }
    if trailer.get("Root").and_then(|o| o.as_reference()).is_none() {
        return Err(Error::malformed("trailer has no /Root"));
    }

    log::debug!("Loaded {} objects", objects.len());
    let mut doc = Document::from_parts(version, objects, trailer);
    doc.set_encryption(encryption);
    Ok(doc)
}

/// Find `%PDF-M.m`, returning the data from the header onwards and the version.
fn locate_header(data: &[u8]) -> Result<(&[u8], (u8, u8))> {
    let window = &data[..data.len().min(HEADER_WINDOW)];
    let pos = find_keyword(window, b"%PDF-").ok_or_else(|| Error::malformed("%PDF- header not found"))?;
    if pos > 0 {
        log::warn!("Skipping {} bytes before the %PDF- header", pos);
    }
    let data = &data[pos..];
    let version = match data.get(5..8) {
        Some([major, b'.', minor]) if major.is_ascii_digit() && minor.is_ascii_digit() => {
            (major - b'0', minor - b'0')
        },
        _ => return Err(Error::malformed("header has no valid version")),
    };
    Ok((data, version))
}

/// Value of an indirect `/Length` stored as a plain object.
fn indirect_length(data: &[u8], xref: &CrossRefTable, r: ObjectRef, ctx: &ParseContext<'_>) -> Option<usize> {
    let XRefEntry::InUse { offset, .. } = xref.get(r.id)? else {
        return None;
    };
    let (_, (_, obj)) = parse_indirect_object(data.get(*offset..)?, ctx).ok()?;
    obj.as_integer().filter(|n| *n >= 0).map(|n| n as usize)
}

fn load_objects(data: &[u8], xref: &CrossRefTable, ctx: &ParseContext<'_>) -> Result<BTreeMap<ObjectRef, Object>> {
    let mut objects = BTreeMap::new();
    for (id, entry) in xref.iter() {
        let XRefEntry::InUse { offset, gen } = entry else {
            continue;
        };
        if id == 0 || xref.is_xref_stream(id) {
            continue;
        }
        let slice = data
            .get(offset..)
            .ok_or_else(|| Error::malformed(format!("object {} offset {} is past end of file", id, offset)))?;
        let (_, (r, obj)) =
            parse_indirect_object(slice, ctx).map_err(|e| to_error(data, e, &format!("object {} {}", id, gen)))?;
        if r.id != id {
            return Err(Error::malformed(format!(
                "xref points object {} at offset {}, found object {}",
                id, offset, r.id
            )));
        }
        if r.gen != gen {
            log::warn!("Object {} has generation {} in xref but {} in file", id, gen, r.gen);
        }
        objects.insert(r, obj);
    }
    Ok(objects)
}

/// Authenticate, decrypt every object in place and drop the encryption dictionary.
fn open_encryption(
    objects: &mut BTreeMap<ObjectRef, Object>,
    trailer: &Dict,
    encrypt: &Object,
    password: &str,
) -> Result<EncryptionHandler> {
    let (encrypt_ref, dict) = match encrypt {
        Object::Reference(r) => (
            Some(*r),
            objects
                .get(r)
                .and_then(|o| o.as_dict())
                .cloned()
                .ok_or_else(|| Error::malformed("/Encrypt does not reference a dictionary"))?,
        ),
        Object::Dictionary(d) => (None, d.clone()),
        other => return Err(Error::malformed(format!("/Encrypt is a {}", other.type_name()))),
    };

    let file_id = trailer
        .get("ID")
        .and_then(|o| o.as_array())
        .and_then(|a| a.first())
        .and_then(|o| o.as_string())
        .unwrap_or_default();

    let handler = EncryptionHandler::open(&dict, file_id, password)?;
    if let Some(r) = encrypt_ref {
        objects.remove(&r);
    }
    for (r, obj) in objects.iter_mut() {
        handler.decrypt_object(*r, obj)?;
    }
    log::info!("Decrypted document ({})", handler.algorithm());
    Ok(handler)
}

fn expand_object_streams(
    objects: &mut BTreeMap<ObjectRef, Object>,
    xref: &CrossRefTable,
    ctx: &ParseContext<'_>,
    max_size: usize,
) -> Result<()> {
    let mut wanted: BTreeMap<u32, Vec<(u32, usize)>> = BTreeMap::new();
    for (id, entry) in xref.iter() {
        if let XRefEntry::Compressed { stream, index } = entry {
            wanted.entry(stream).or_default().push((id, index));
        }
    }

    for (stream_id, members) in wanted {
        let container = objects
            .iter()
            .find(|(r, _)| r.id == stream_id)
            .map(|(_, o)| o)
            .ok_or_else(|| Error::malformed(format!("object stream {} is missing", stream_id)))?;
        let parsed = parse_object_stream(container, ctx, max_size)?;
        let by_number: HashMap<u32, &Object> = parsed.iter().map(|(n, o)| (*n, o)).collect();

        for (id, index) in members {
            let found = match parsed.get(index) {
                Some((n, obj)) if *n == id => Some(obj),
                _ => by_number.get(&id).copied(),
            };
            match found {
                Some(obj) => {
                    objects.insert(ObjectRef::new(id, 0), obj.clone());
                },
                None => log::warn!("Object {} not found in object stream {}", id, stream_id),
            }
        }
    }
    Ok(())
}
