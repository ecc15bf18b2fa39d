//! PDF document writer.
//!
//! Always performs a full rewrite: header, every live object, a classic xref
//! table, trailer and `startxref`. Live objects are those reachable from the
//! trailer's `/Root` and `/Info`; they are renumbered densely from 1 in
//! discovery order, so pruned objects leave no gaps.

use super::object_serializer::ObjectSerializer;
use crate::config::WriterOptions;
use crate::decoders::flate_encode;
use crate::document::Document;
use crate::encryption::{Algorithm, EncryptionWriteHandler, random_bytes};
use crate::error::Result;
use crate::object::{Object, ObjectRef};
use indexmap::IndexSet;
use std::collections::HashMap;

/// Binary marker line written after the header.
const BINARY_MARKER: &[u8] = b"%\xE2\xE3\xCF\xD3\n";

/// Streams shorter than this are not worth compressing.
const MIN_COMPRESS_LEN: usize = 64;

/// Serialize a document with default options.
pub fn serialize(doc: &Document) -> Result<Vec<u8>> {
    serialize_with(doc, &WriterOptions::default())
}

/// Serialize a document.
pub fn serialize_with(doc: &Document, options: &WriterOptions) -> Result<Vec<u8>> {
    PdfWriter::new(doc, *options).finish()
}

/// Writes one document.
pub struct PdfWriter<'a> {
    doc: &'a Document,
    options: WriterOptions,
    serializer: ObjectSerializer,
}

impl<'a> PdfWriter<'a> {
    /// Create a writer for `doc`.
    pub fn new(doc: &'a Document, options: WriterOptions) -> Self {
        Self {
            doc,
            options,
            serializer: ObjectSerializer::compact(),
        }
    }

    /// Objects reachable from `/Root` and `/Info`, in discovery order.
    ///
    /// References are followed in sorted key order so the numbering is stable.
    fn live_objects(&self) -> IndexSet<ObjectRef> {
        let mut live = IndexSet::new();
        let mut queue = std::collections::VecDeque::new();
        for key in ["Root", "Info"] {
            if let Some(r) = self.doc.trailer().get(key).and_then(|o| o.as_reference()) {
                queue.push_back(r);
            }
        }
        while let Some(r) = queue.pop_front() {
            let Some(obj) = self.doc.get(r) else { continue };
            if !live.insert(r) {
                continue;
            }
            for child in sorted_references(obj) {
                if !live.contains(&child) {
                    queue.push_back(child);
                }
            }
        }
        live
    }

    /// Header version, raised to what the security handler needs.
    fn header_version(&self) -> (u8, u8) {
        let required = match self.doc.encryption_state().map(|h| h.algorithm()) {
            Some(Algorithm::Aes256) => (1, 7),
            Some(Algorithm::Aes128) => (1, 6),
            Some(Algorithm::Rc4_128) => (1, 4),
            _ => (1, 0),
        };
        self.doc.version().max(required)
    }

    /// Build the complete PDF file.
    pub fn finish(self) -> Result<Vec<u8>> {
        let live = self.live_objects();
        let numbering: HashMap<ObjectRef, ObjectRef> = live
            .iter()
            .enumerate()
            .map(|(i, r)| (*r, ObjectRef::new(i as u32 + 1, 0)))
            .collect();
        log::debug!(
            "Writing {} live objects ({} in arena)",
            live.len(),
            self.doc.object_count()
        );

        let encrypt = self.doc.encryption_state().map(EncryptionWriteHandler::new);

        let (major, minor) = self.header_version();
        let mut output = format!("%PDF-{}.{}\n", major, minor).into_bytes();
        output.extend_from_slice(BINARY_MARKER);

        let mut offsets = Vec::with_capacity(live.len() + 1);
        for old in &live {
            let new = numbering[old];
            let Some(original) = self.doc.get(*old) else { continue };
            let mut obj = original.clone();
            renumber_references(&mut obj, &numbering);
            if self.options.compress_streams {
                compress_stream(&mut obj)?;
            }
            if let Some(handler) = &encrypt {
                handler.encrypt_object(new, &mut obj)?;
            }
            offsets.push(output.len());
            output.extend_from_slice(&self.serializer.serialize_indirect(new, &obj));
        }

        // Encryption dictionary, written in clear
        let encrypt_ref = match self.doc.encryption_state() {
            Some(handler) => {
                let r = ObjectRef::new(offsets.len() as u32 + 1, 0);
                offsets.push(output.len());
                let dict = Object::Dictionary(handler.encrypt_dict().clone());
                output.extend_from_slice(&self.serializer.serialize_indirect(r, &dict));
                Some(r)
            },
            None => None,
        };

        let xref_start = output.len();
        let size = offsets.len() + 1;
        output.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", size).as_bytes());
        for offset in &offsets {
            output.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }

        let mut trailer = vec![("Size", ObjectSerializer::integer(size as i64))];
        for key in ["Root", "Info"] {
            if let Some(r) = self.doc.trailer().get(key).and_then(|o| o.as_reference()) {
                if let Some(new) = numbering.get(&r) {
                    trailer.push((key, ObjectSerializer::reference(*new)));
                }
            }
        }
        trailer.push(("ID", self.file_id()));
        if let Some(r) = encrypt_ref {
            trailer.push(("Encrypt", ObjectSerializer::reference(r)));
        }

        output.extend_from_slice(b"trailer\n");
        output.extend_from_slice(&self.serializer.serialize(&ObjectSerializer::dict(trailer)));
        output.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_start).as_bytes());

        log::debug!("Wrote {} bytes", output.len());
        Ok(output)
    }

    /// Existing `/ID` when well formed, else a fresh random pair. An
    /// encrypted document always gets the identifier its key was derived from.
    fn file_id(&self) -> Object {
        let keyed = self.doc.encryption_state().map(|h| h.file_id());
        let existing = self.doc.trailer().get("ID").and_then(|o| o.as_array()).filter(|a| {
            a.len() == 2
                && a.iter().all(|o| o.as_string().is_some())
                && keyed.map_or(true, |id| a[0].as_string() == Some(id))
        });
        match (existing, keyed) {
            (Some(pair), _) => Object::Array(pair.clone()),
            (None, Some(id)) => Object::Array(vec![Object::String(id.to_vec()), Object::String(id.to_vec())]),
            (None, None) => {
                let id = random_bytes(16);
                Object::Array(vec![Object::String(id.clone()), Object::String(id)])
            },
        }
    }
}

/// References of an object in sorted-key order.
fn sorted_references(obj: &Object) -> Vec<ObjectRef> {
    let mut out = Vec::new();
    collect_sorted(obj, &mut out);
    out
}

fn collect_sorted(obj: &Object, out: &mut Vec<ObjectRef>) {
    match obj {
        Object::Reference(r) => out.push(*r),
        Object::Array(items) => items.iter().for_each(|o| collect_sorted(o, out)),
        Object::Dictionary(dict) | Object::Stream { dict, .. } => {
            let mut keys: Vec<&String> = dict.keys().collect();
            keys.sort();
            for key in keys {
                collect_sorted(&dict[key], out);
            }
        },
        _ => {},
    }
}

/// Rewrite references to their new numbers. References to objects that are
/// not written become `null`.
fn renumber_references(obj: &mut Object, numbering: &HashMap<ObjectRef, ObjectRef>) {
    match obj {
        Object::Reference(r) => match numbering.get(r) {
            Some(new) => *r = *new,
            None => {
                log::debug!("Dangling reference {} written as null", r);
                *obj = Object::Null;
            },
        },
        Object::Array(items) => items.iter_mut().for_each(|o| renumber_references(o, numbering)),
        Object::Dictionary(dict) | Object::Stream { dict, .. } => {
            dict.values_mut().for_each(|o| renumber_references(o, numbering))
        },
        _ => {},
    }
}

/// Flate-compress an unfiltered stream. Metadata stays readable.
fn compress_stream(obj: &mut Object) -> Result<()> {
    let Object::Stream { dict, data } = obj else {
        return Ok(());
    };
    let is_metadata = dict.get("Type").and_then(|t| t.as_name()) == Some("Metadata");
    if dict.contains_key("Filter") || is_metadata || data.len() < MIN_COMPRESS_LEN {
        return Ok(());
    }
    let compressed = flate_encode(data)?;
    if compressed.len() < data.len() {
        *data = bytes::Bytes::from(compressed);
        dict.insert("Filter".into(), Object::Name("FlateDecode".into()));
        dict.remove("DecodeParms");
    }
    Ok(())
}
