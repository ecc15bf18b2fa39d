//! PDF document model.
//!
//! A [`Document`] is an arena of indirect objects keyed by [`ObjectRef`]
//! plus the trailer dictionary. Objects refer to each other only through
//! references, so page operations work by rewriting `(id, gen)` pairs and
//! the writer decides what is live by walking from the trailer.

use crate::encryption::{EncryptionHandler, random_bytes};
use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Page attributes inherited from ancestor `Pages` nodes (ISO 32000-1, Table 30).
pub const INHERITABLE_KEYS: [&str; 4] = ["MediaBox", "CropBox", "Resources", "Rotate"];

/// US Letter, used when no MediaBox is present anywhere in the tree.
pub const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Largest object number accepted from a file (ISO 32000-1, Annex C).
pub const MAX_OBJECT_ID: u32 = 8_388_607;

/// Maximum number of references followed by [`Document::resolve`].
const MAX_RESOLVE_DEPTH: usize = 32;

/// Maximum page tree depth.
const MAX_TREE_DEPTH: usize = 256;

static NULL: Object = Object::Null;

/// Document metadata (Info dictionary).
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    /// Document title
    pub title: Option<String>,
    /// Document author
    pub author: Option<String>,
    /// Document subject
    pub subject: Option<String>,
    /// Document keywords
    pub keywords: Option<String>,
    /// Creator application
    pub creator: Option<String>,
    /// PDF producer
    pub producer: Option<String>,
    /// Creation date (PDF date format)
    pub creation_date: Option<String>,
    /// Modification date (PDF date format)
    pub mod_date: Option<String>,
}

impl DocumentInfo {
    const FIELDS: [&'static str; 8] = [
        "Title",
        "Author",
        "Subject",
        "Keywords",
        "Creator",
        "Producer",
        "CreationDate",
        "ModDate",
    ];

    /// Create a new empty DocumentInfo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the author.
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set the subject.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the keywords.
    pub fn keywords(mut self, keywords: impl Into<String>) -> Self {
        self.keywords = Some(keywords.into());
        self
    }

    /// Set the creator.
    pub fn creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    fn field(&self, key: &str) -> Option<&String> {
        match key {
            "Title" => self.title.as_ref(),
            "Author" => self.author.as_ref(),
            "Subject" => self.subject.as_ref(),
            "Keywords" => self.keywords.as_ref(),
            "Creator" => self.creator.as_ref(),
            "Producer" => self.producer.as_ref(),
            "CreationDate" => self.creation_date.as_ref(),
            "ModDate" => self.mod_date.as_ref(),
            _ => None,
        }
    }

    fn field_mut(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key {
            "Title" => Some(&mut self.title),
            "Author" => Some(&mut self.author),
            "Subject" => Some(&mut self.subject),
            "Keywords" => Some(&mut self.keywords),
            "Creator" => Some(&mut self.creator),
            "Producer" => Some(&mut self.producer),
            "CreationDate" => Some(&mut self.creation_date),
            "ModDate" => Some(&mut self.mod_date),
            _ => None,
        }
    }

    /// Read from an Info dictionary. Non-string values are ignored.
    pub fn from_dict(dict: &Dict) -> Self {
        let mut info = Self::default();
        for key in Self::FIELDS {
            if let (Some(text), Some(slot)) = (dict.get(key).and_then(|o| o.as_string()), info.field_mut(key)) {
                *slot = Some(decode_text_string(text));
            }
        }
        info
    }

    /// Write present fields into an Info dictionary, keeping unrelated keys.
    pub fn apply_to(&self, dict: &mut Dict) {
        for key in Self::FIELDS {
            if let Some(value) = self.field(key) {
                dict.insert(key.to_string(), Object::String(encode_text_string(value)));
            }
        }
    }
}

/// Decode a PDF text string: UTF-16BE with BOM, UTF-8 with BOM, else PDFDocEncoding.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    // PDFDocEncoding agrees with Latin-1 for the printable range
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode a text string: plain bytes for ASCII, UTF-16BE with BOM otherwise.
pub fn encode_text_string(text: &str) -> Vec<u8> {
    if text.is_ascii() {
        return text.as_bytes().to_vec();
    }
    let mut out = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}

/// An in-memory PDF document.
///
/// # Example
///
/// ```
/// use minitools_pdf::document::Document;
///
/// let doc = Document::new();
/// assert_eq!(doc.page_count().unwrap(), 0);
/// assert_eq!(doc.version(), (1, 7));
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    /// PDF version (major, minor)
    version: (u8, u8),
    /// Indirect objects
    objects: BTreeMap<ObjectRef, Object>,
    /// Trailer dictionary (without /Encrypt, which lives in the handler)
    trailer: Dict,
    /// Security handler applied on write
    encryption: Option<EncryptionHandler>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document: a catalog and a page tree with no pages.
    pub fn new() -> Self {
        let mut doc = Self::from_parts((1, 7), BTreeMap::new(), Dict::new());
        let pages = doc.add_object(Object::Dictionary(Dict::from([
            ("Type".to_string(), Object::Name("Pages".into())),
            ("Kids".to_string(), Object::Array(Vec::new())),
            ("Count".to_string(), Object::Integer(0)),
        ])));
        let catalog = doc.add_object(Object::Dictionary(Dict::from([
            ("Type".to_string(), Object::Name("Catalog".into())),
            ("Pages".to_string(), Object::Reference(pages)),
        ])));
        doc.trailer.insert("Root".into(), Object::Reference(catalog));
        doc
    }

    /// Assemble a document from parsed parts.
    pub(crate) fn from_parts(version: (u8, u8), objects: BTreeMap<ObjectRef, Object>, trailer: Dict) -> Self {
        Self {
            version,
            objects,
            trailer,
            encryption: None,
        }
    }

    /// PDF version from the header.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Set the version written in the header.
    pub fn set_version(&mut self, version: (u8, u8)) {
        self.version = version;
    }

    /// Raise the version to at least `version`.
    pub fn require_version(&mut self, version: (u8, u8)) {
        self.version = self.version.max(version);
    }

    /// Trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Mutable trailer dictionary.
    pub fn trailer_mut(&mut self) -> &mut Dict {
        &mut self.trailer
    }

    /// Look up an object.
    pub fn get(&self, r: ObjectRef) -> Option<&Object> {
        self.objects.get(&r)
    }

    /// Look up an object for modification.
    pub fn get_mut(&mut self, r: ObjectRef) -> Option<&mut Object> {
        self.objects.get_mut(&r)
    }

    /// Follow references until a direct object. Dangling references resolve to `null`.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        let mut current = obj;
        for _ in 0..MAX_RESOLVE_DEPTH {
            match current {
                Object::Reference(r) => current = self.objects.get(r).unwrap_or(&NULL),
                _ => return current,
            }
        }
        log::warn!("Reference chain longer than {} links, treating as null", MAX_RESOLVE_DEPTH);
        &NULL
    }

    /// Dictionary of a Dictionary or Stream object behind `r`.
    pub fn get_dict(&self, r: ObjectRef) -> Result<&Dict> {
        self.get(r)
            .and_then(|o| o.as_dict())
            .ok_or_else(|| Error::malformed(format!("object {} is missing or not a dictionary", r)))
    }

    /// Mutable dictionary behind `r`.
    pub fn get_dict_mut(&mut self, r: ObjectRef) -> Result<&mut Dict> {
        self.get_mut(r)
            .and_then(|o| o.as_dict_mut())
            .ok_or_else(|| Error::malformed(format!("object {} is missing or not a dictionary", r)))
    }

    /// Add an object under the next free number.
    pub fn add_object(&mut self, obj: Object) -> ObjectRef {
        let r = ObjectRef::new(self.next_id(), 0);
        self.objects.insert(r, obj);
        r
    }

    /// One past the highest number, or the lowest unused one when the top is taken.
    fn next_id(&self) -> u32 {
        self.max_id().checked_add(1).unwrap_or_else(|| {
            let mut candidate = 1;
            for r in self.objects.keys() {
                if r.id > candidate {
                    break;
                }
                candidate = r.id.saturating_add(1);
            }
            candidate
        })
    }

    /// Insert or replace an object.
    pub fn set_object(&mut self, r: ObjectRef, obj: Object) {
        self.objects.insert(r, obj);
    }

    /// Remove an object, returning it.
    pub fn remove_object(&mut self, r: ObjectRef) -> Option<Object> {
        self.objects.remove(&r)
    }

    /// Highest object number in use (0 when empty).
    pub fn max_id(&self) -> u32 {
        self.objects.keys().next_back().map(|r| r.id).unwrap_or(0)
    }

    /// Number of objects in the arena.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Iterate objects in number order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectRef, &Object)> {
        self.objects.iter().map(|(r, o)| (*r, o))
    }

    /// Iterate objects mutably in number order.
    pub fn objects_mut(&mut self) -> impl Iterator<Item = (ObjectRef, &mut Object)> {
        self.objects.iter_mut().map(|(r, o)| (*r, o))
    }

    /// Reference to the catalog (`/Root`).
    pub fn catalog_ref(&self) -> Result<ObjectRef> {
        self.trailer
            .get("Root")
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::malformed("trailer has no /Root reference"))
    }

    /// The catalog dictionary.
    pub fn catalog(&self) -> Result<&Dict> {
        self.get_dict(self.catalog_ref()?)
    }

    /// Reference to the root of the page tree.
    pub fn pages_root(&self) -> Result<ObjectRef> {
        self.catalog()?
            .get("Pages")
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::malformed("catalog has no /Pages reference"))
    }

    /// All page leaves in document order (pre-order traversal of `/Kids`).
    ///
    /// A node reached twice means the tree has a cycle or a shared subtree
    /// and fails with [`Error::MalformedDocument`].
    pub fn page_refs(&self) -> Result<Vec<ObjectRef>> {
        let root = self.pages_root()?;
        let mut pages = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![(root, 0usize)];

        while let Some((node, depth)) = stack.pop() {
            if !seen.insert(node) {
                return Err(Error::malformed(format!("page tree node {} is reachable twice", node)));
            }
            if depth > MAX_TREE_DEPTH {
                return Err(Error::malformed("page tree is too deep"));
            }
            let Some(dict) = self.get(node).and_then(|o| o.as_dict()) else {
                log::warn!("Page tree entry {} is missing, skipping", node);
                continue;
            };

            let kids = dict.get("Kids").map(|k| self.resolve(k)).and_then(|k| k.as_array());
            match (dict.get("Type").and_then(|t| t.as_name()), kids) {
                (Some("Page"), _) => pages.push(node),
                (Some("Pages"), None) => log::warn!("Pages node {} has no /Kids, skipping", node),
                (_, None) => pages.push(node),
                (_, Some(kids)) => {
                    for kid in kids.iter().rev() {
                        match kid.as_reference() {
                            Some(kid_ref) => stack.push((kid_ref, depth + 1)),
                            None => log::warn!("Non-reference entry in /Kids of {}, skipping", node),
                        }
                    }
                },
            }
        }
        Ok(pages)
    }

    /// Number of pages.
    pub fn page_count(&self) -> Result<usize> {
        Ok(self.page_refs()?.len())
    }

    /// Look up a page attribute, walking `/Parent` links when it is inheritable.
    pub fn inherited_attribute(&self, page: ObjectRef, key: &str) -> Option<Object> {
        let mut node = Some(page);
        let mut seen = HashSet::new();
        while let Some(r) = node {
            if !seen.insert(r) {
                break;
            }
            let dict = self.get(r)?.as_dict()?;
            if let Some(value) = dict.get(key) {
                return Some(self.resolve(value).clone());
            }
            if !INHERITABLE_KEYS.contains(&key) {
                return None;
            }
            node = dict.get("Parent").and_then(|p| p.as_reference());
        }
        None
    }

    /// MediaBox of a page, defaulting to US Letter.
    pub fn media_box(&self, page: ObjectRef) -> [f64; 4] {
        let rect = self
            .inherited_attribute(page, "MediaBox")
            .and_then(|o| o.as_array().cloned())
            .map(|a| a.iter().map(|v| self.resolve(v).as_number()).collect::<Option<Vec<f64>>>());
        match rect {
            Some(Some(v)) if v.len() == 4 => {
                [v[0].min(v[2]), v[1].min(v[3]), v[0].max(v[2]), v[1].max(v[3])]
            },
            _ => DEFAULT_MEDIA_BOX,
        }
    }

    /// Effective `/Rotate` of a page, normalized to 0, 90, 180 or 270.
    pub fn page_rotation(&self, page: ObjectRef) -> i64 {
        self.inherited_attribute(page, "Rotate")
            .and_then(|o| o.as_number())
            .map(|deg| ((deg as i64 / 90) * 90).rem_euclid(360))
            .unwrap_or(0)
    }

    /// Copy inherited attributes onto the page itself.
    ///
    /// A missing MediaBox is set to US Letter so the page stays valid once
    /// moved under a different parent.
    pub fn materialize_inherited(&mut self, page: ObjectRef) -> Result<()> {
        let mut found: Vec<(&str, Object)> = INHERITABLE_KEYS
            .iter()
            .filter_map(|&key| self.inherited_attribute(page, key).map(|v| (key, v)))
            .collect();
        if !found.iter().any(|(k, _)| *k == "MediaBox") {
            found.push(("MediaBox", Object::Array(DEFAULT_MEDIA_BOX.iter().map(|&v| Object::Real(v)).collect())));
        }
        let dict = self.get_dict_mut(page)?;
        for (key, value) in found {
            dict.entry(key.to_string()).or_insert(value);
        }
        Ok(())
    }

    /// Replace the page tree with a single `Pages` node whose kids are `pages`.
    ///
    /// Inherited attributes are copied onto each page first. Intermediate
    /// nodes become unreachable and are dropped by the writer.
    pub fn flatten_page_tree(&mut self, pages: &[ObjectRef]) -> Result<()> {
        for &page in pages {
            self.materialize_inherited(page)?;
        }
        let root = self.pages_root()?;
        for &page in pages {
            self.get_dict_mut(page)?.insert("Parent".into(), Object::Reference(root));
        }

        let root_dict = self.get_dict_mut(root)?;
        root_dict.insert("Type".into(), Object::Name("Pages".into()));
        root_dict.insert(
            "Kids".into(),
            Object::Array(pages.iter().map(|&p| Object::Reference(p)).collect()),
        );
        root_dict.insert("Count".into(), Object::Integer(pages.len() as i64));
        root_dict.remove("Parent");
        for key in INHERITABLE_KEYS {
            root_dict.remove(key);
        }
        Ok(())
    }

    /// Transitive closure of references from `roots`, including the roots.
    ///
    /// `/Parent` links of page tree nodes are not followed, so the closure of
    /// a set of pages does not pull in the rest of the tree.
    pub fn reachable_from(&self, roots: &[ObjectRef]) -> BTreeSet<ObjectRef> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<ObjectRef> = roots.to_vec();
        while let Some(r) = stack.pop() {
            if !seen.insert(r) {
                continue;
            }
            let Some(obj) = self.get(r) else { continue };
            let page_node = matches!(obj.dict_type(), Some("Page") | Some("Pages"));
            match obj.as_dict() {
                Some(dict) => {
                    for (key, value) in dict {
                        if page_node && key == "Parent" {
                            continue;
                        }
                        value.for_each_reference(&mut |child| {
                            if !seen.contains(&child) {
                                stack.push(child)
                            }
                        });
                    }
                },
                None => obj.for_each_reference(&mut |child| {
                    if !seen.contains(&child) {
                        stack.push(child)
                    }
                }),
            }
        }
        seen
    }

    /// Add `offset` to every object number and every reference, including the trailer's.
    ///
    /// References to objects that do not exist denote `null` and are replaced
    /// by it, so they can never land on an object of another document.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedDocument`] when a shifted number would not fit in 32 bits.
    pub fn renumber(&mut self, offset: u32) -> Result<()> {
        if offset == 0 {
            return Ok(());
        }
        if let Some(top) = self.objects.keys().next_back() {
            if top.id.checked_add(offset).is_none() {
                return Err(Error::malformed(format!(
                    "object {} cannot be renumbered by {} without overflow",
                    top, offset
                )));
            }
        }

        let live: HashSet<ObjectRef> = self.objects.keys().copied().collect();
        let mut dangling = 0usize;
        let mut rewrite = |value: &mut Object| {
            value.replace_dangling(&live, &mut dangling);
            value.map_references(&mut |r| ObjectRef::new(r.id + offset, r.gen));
        };

        let old = std::mem::take(&mut self.objects);
        self.objects = old
            .into_iter()
            .map(|(r, mut obj)| {
                rewrite(&mut obj);
                (ObjectRef::new(r.id + offset, r.gen), obj)
            })
            .collect();
        for value in self.trailer.values_mut() {
            rewrite(value);
        }
        if dangling > 0 {
            log::debug!("Replaced {} references to missing objects with null", dangling);
        }
        Ok(())
    }

    /// Move every object of `other` into this document. Numbers must not collide.
    pub(crate) fn absorb(&mut self, other: Document) {
        self.objects.extend(other.objects);
    }

    /// Document metadata. Missing Info reads as empty.
    pub fn info(&self) -> DocumentInfo {
        self.trailer
            .get("Info")
            .map(|o| self.resolve(o))
            .and_then(|o| o.as_dict())
            .map(DocumentInfo::from_dict)
            .unwrap_or_default()
    }

    /// Merge `info` into the Info dictionary, creating it when absent.
    pub fn set_info(&mut self, info: &DocumentInfo) {
        let existing = self.trailer.get("Info").and_then(|o| o.as_reference());
        match existing.and_then(|r| self.get_mut(r)).and_then(|o| o.as_dict_mut()) {
            Some(dict) => info.apply_to(dict),
            None => {
                let mut dict = match self.trailer.get("Info") {
                    Some(Object::Dictionary(d)) => d.clone(),
                    _ => Dict::new(),
                };
                info.apply_to(&mut dict);
                let r = self.add_object(Object::Dictionary(dict));
                self.trailer.insert("Info".into(), Object::Reference(r));
            },
        }
    }

    /// First element of the trailer `/ID`, if present.
    pub fn file_id(&self) -> Option<&[u8]> {
        self.trailer
            .get("ID")
            .and_then(|o| o.as_array())
            .and_then(|a| a.first())
            .and_then(|o| o.as_string())
    }

    /// First element of the trailer `/ID`, generating a fresh pair unless a
    /// well-formed one (two strings) is present.
    pub fn ensure_file_id(&mut self) -> Vec<u8> {
        let well_formed = self
            .trailer
            .get("ID")
            .and_then(|o| o.as_array())
            .is_some_and(|a| a.len() == 2 && a.iter().all(|o| o.as_string().is_some()));
        if !well_formed {
            let id = random_bytes(16);
            self.trailer.insert(
                "ID".into(),
                Object::Array(vec![Object::String(id.clone()), Object::String(id)]),
            );
        }
        self.file_id().map(<[u8]>::to_vec).unwrap_or_default()
    }

    /// Security handler applied when writing, if any.
    pub fn encryption_state(&self) -> Option<&EncryptionHandler> {
        self.encryption.as_ref()
    }

    /// Install or clear the security handler.
    pub fn set_encryption(&mut self, handler: Option<EncryptionHandler>) {
        self.encryption = handler;
    }

    /// Whether the document is written encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(entries: Vec<(&str, Object)>) -> Object {
        Object::Dictionary(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn reference(id: u32) -> Object {
        Object::Reference(ObjectRef::new(id, 0))
    }

    /// Root (2) -> [page 3, node 4 -> [page 5, page 6]]; MediaBox and Rotate on the root.
    fn nested_doc() -> Document {
        let mut objects = BTreeMap::new();
        objects.insert(ObjectRef::new(1, 0), dict(vec![("Type", Object::Name("Catalog".into())), ("Pages", reference(2))]));
        objects.insert(
            ObjectRef::new(2, 0),
            dict(vec![
                ("Type", Object::Name("Pages".into())),
                ("Kids", Object::Array(vec![reference(3), reference(4)])),
                ("Count", Object::Integer(3)),
                ("MediaBox", Object::Array(vec![Object::Integer(0), Object::Integer(0), Object::Integer(300), Object::Integer(400)])),
                ("Rotate", Object::Integer(90)),
            ]),
        );
        objects.insert(ObjectRef::new(3, 0), dict(vec![("Type", Object::Name("Page".into())), ("Parent", reference(2))]));
        objects.insert(
            ObjectRef::new(4, 0),
            dict(vec![
                ("Type", Object::Name("Pages".into())),
                ("Kids", Object::Array(vec![reference(5), reference(6)])),
                ("Parent", reference(2)),
                ("Count", Object::Integer(2)),
            ]),
        );
        objects.insert(
            ObjectRef::new(5, 0),
            dict(vec![("Type", Object::Name("Page".into())), ("Parent", reference(4)), ("Contents", reference(7))]),
        );
        objects.insert(
            ObjectRef::new(6, 0),
            dict(vec![("Type", Object::Name("Page".into())), ("Parent", reference(4)), ("Rotate", Object::Integer(-90))]),
        );
        objects.insert(
            ObjectRef::new(7, 0),
            Object::Stream {
                dict: Dict::new(),
                data: bytes::Bytes::from_static(b"0 0 m"),
            },
        );
        let trailer = Dict::from([("Root".to_string(), reference(1))]);
        Document::from_parts((1, 4), objects, trailer)
    }

    #[test]
    fn test_new_document_is_empty() {
        let doc = Document::new();
        assert_eq!(doc.page_count().unwrap(), 0);
        assert_eq!(doc.catalog().unwrap()["Type"].as_name(), Some("Catalog"));
    }

    #[test]
    fn test_page_refs_preorder() {
        let doc = nested_doc();
        let ids: Vec<u32> = doc.page_refs().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 5, 6]);
    }

    #[test]
    fn test_pages_node_without_kids_is_skipped() {
        let mut doc = nested_doc();
        doc.get_dict_mut(ObjectRef::new(4, 0)).unwrap().remove("Kids");
        let ids: Vec<u32> = doc.page_refs().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3]);

        // An untyped leaf still counts
        doc.get_dict_mut(ObjectRef::new(4, 0)).unwrap().remove("Type");
        assert_eq!(doc.page_count().unwrap(), 2);
    }

    #[test]
    fn test_page_tree_cycle_detected() {
        let mut doc = nested_doc();
        doc.get_dict_mut(ObjectRef::new(4, 0))
            .unwrap()
            .insert("Kids".into(), Object::Array(vec![reference(5), reference(2)]));
        assert!(matches!(doc.page_refs(), Err(Error::MalformedDocument(_))));
    }

    #[test]
    fn test_inherited_attributes() {
        let doc = nested_doc();
        assert_eq!(doc.media_box(ObjectRef::new(5, 0)), [0.0, 0.0, 300.0, 400.0]);
        assert_eq!(doc.page_rotation(ObjectRef::new(5, 0)), 90);
        assert_eq!(doc.page_rotation(ObjectRef::new(6, 0)), 270);
        assert!(doc.inherited_attribute(ObjectRef::new(5, 0), "Contents").is_some());
        assert!(doc.inherited_attribute(ObjectRef::new(3, 0), "Contents").is_none());
    }

    #[test]
    fn test_missing_media_box_defaults_to_letter() {
        let doc = Document::new();
        assert_eq!(doc.media_box(ObjectRef::new(99, 0)), DEFAULT_MEDIA_BOX);
    }

    #[test]
    fn test_flatten_keeps_geometry() {
        let mut doc = nested_doc();
        let pages = vec![ObjectRef::new(6, 0), ObjectRef::new(3, 0)];
        doc.flatten_page_tree(&pages).unwrap();
        assert_eq!(doc.page_refs().unwrap(), pages);
        assert_eq!(doc.media_box(ObjectRef::new(6, 0)), [0.0, 0.0, 300.0, 400.0]);
        assert_eq!(doc.page_rotation(ObjectRef::new(6, 0)), 270);
        assert_eq!(doc.page_rotation(ObjectRef::new(3, 0)), 90);
        assert_eq!(doc.get_dict(ObjectRef::new(2, 0)).unwrap()["Count"].as_integer(), Some(2));
    }

    #[test]
    fn test_reachable_from_page_skips_parent() {
        let doc = nested_doc();
        let reach = doc.reachable_from(&[ObjectRef::new(5, 0)]);
        let ids: Vec<u32> = reach.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5, 7]);
    }

    #[test]
    fn test_renumber_shifts_everything() {
        let mut doc = nested_doc();
        doc.renumber(10).unwrap();
        assert_eq!(doc.catalog_ref().unwrap(), ObjectRef::new(11, 0));
        let ids: Vec<u32> = doc.page_refs().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![13, 15, 16]);
        assert_eq!(doc.max_id(), 17);
    }

    #[test]
    fn test_add_object_allocates_after_max() {
        let mut doc = nested_doc();
        assert_eq!(doc.add_object(Object::Null), ObjectRef::new(8, 0));
    }

    #[test]
    fn test_add_object_at_top_of_number_space() {
        let mut doc = nested_doc();
        doc.set_object(ObjectRef::new(u32::MAX, 0), Object::Null);
        assert_eq!(doc.add_object(Object::Integer(1)), ObjectRef::new(8, 0));
        assert_eq!(doc.get(ObjectRef::new(u32::MAX, 0)), Some(&Object::Null));
    }

    #[test]
    fn test_renumber_nulls_dangling_references() {
        let mut doc = nested_doc();
        doc.get_dict_mut(ObjectRef::new(3, 0))
            .unwrap()
            .insert("Thumb".into(), Object::Reference(ObjectRef::new(u32::MAX, 0)));
        doc.renumber(100).unwrap();
        let page = doc.get_dict(ObjectRef::new(103, 0)).unwrap();
        assert_eq!(page["Thumb"], Object::Null);
        assert_eq!(page["Parent"], reference(102));
    }

    #[test]
    fn test_renumber_overflow_is_malformed() {
        let mut doc = nested_doc();
        doc.set_object(ObjectRef::new(u32::MAX - 5, 0), Object::Null);
        assert!(matches!(doc.renumber(10), Err(Error::MalformedDocument(_))));
        assert!(doc.get(ObjectRef::new(1, 0)).is_some());
    }

    #[test]
    fn test_resolve_dangling_is_null() {
        let doc = nested_doc();
        assert!(doc.resolve(&reference(42)).is_null());
        assert_eq!(doc.resolve(&Object::Integer(3)), &Object::Integer(3));
    }

    #[test]
    fn test_info_round_trip_with_unicode() {
        let mut doc = Document::new();
        assert_eq!(doc.info(), DocumentInfo::default());
        doc.set_info(&DocumentInfo::new().title("Über").author("Ada"));
        let info = doc.info();
        assert_eq!(info.title.as_deref(), Some("Über"));
        assert_eq!(info.author.as_deref(), Some("Ada"));
        assert!(info.subject.is_none());
    }

    #[test]
    fn test_text_string_encoding() {
        assert_eq!(encode_text_string("abc"), b"abc");
        let utf16 = encode_text_string("é");
        assert_eq!(utf16, vec![0xFE, 0xFF, 0x00, 0xE9]);
        assert_eq!(decode_text_string(&utf16), "é");
        assert_eq!(decode_text_string(b"caf\xe9"), "café");
    }

    #[test]
    fn test_ensure_file_id() {
        let mut doc = Document::new();
        assert!(doc.file_id().is_none());
        let id = doc.ensure_file_id();
        assert_eq!(id.len(), 16);
        assert_eq!(doc.ensure_file_id(), id);

        doc.trailer_mut().insert("ID".into(), Object::Array(vec![Object::String(b"one".to_vec())]));
        let replaced = doc.ensure_file_id();
        assert_eq!(replaced.len(), 16);
        assert_eq!(doc.file_id(), Some(replaced.as_slice()));
    }
}
