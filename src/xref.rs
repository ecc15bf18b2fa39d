//! Cross-reference table parser.
//!
//! The xref maps object numbers to where their definitions live: a byte
//! offset for plain objects, or a container object stream plus an index for
//! compressed ones. Classic tables (PDF 1.0-1.4), cross-reference streams
//! (PDF 1.5+) and hybrid files (`/XRefStm`) are all supported, and `/Prev`
//! chains are followed so incremental updates resolve to the newest revision.

use crate::error::{Error, Result};
use crate::lexer::is_whitespace;
use crate::object::{Dict, Object};
use crate::parser::{ParseContext, parse_indirect_object, parse_trailer, rfind_keyword, to_error};
use std::collections::{BTreeMap, HashSet};

/// How far back from EOF `startxref` is searched for.
const STARTXREF_WINDOW: usize = 4096;

/// Cross-reference table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free (deleted or never used) object number
    Free,
    /// Object stored at a byte offset
    InUse {
        /// Byte offset of `id gen obj`
        offset: usize,
        /// Generation number
        gen: u16,
    },
    /// Object stored inside an object stream
    Compressed {
        /// Object number of the containing `/ObjStm`
        stream: u32,
        /// Index within that stream
        index: usize,
    },
}

/// Merged cross-reference information for a whole file.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: BTreeMap<u32, XRefEntry>,
    trailer: Dict,
    /// Object numbers of cross-reference streams, which are not document objects
    xref_stream_ids: HashSet<u32>,
}

impl CrossRefTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trailer of the newest revision.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Look up an entry.
    pub fn get(&self, id: u32) -> Option<&XRefEntry> {
        self.entries.get(&id)
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, id: u32, entry: XRefEntry) {
        self.entries.insert(id, entry);
    }

    /// Iterate entries in object-number order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, XRefEntry)> + '_ {
        self.entries.iter().map(|(id, e)| (*id, *e))
    }

    /// Whether `id` is a cross-reference stream seen while parsing.
    pub fn is_xref_stream(&self, id: u32) -> bool {
        self.xref_stream_ids.contains(&id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fill in entries from an older revision. Entries already present win.
    fn merge_older(&mut self, older: CrossRefTable) {
        for (id, entry) in older.entries {
            self.entries.entry(id).or_insert(entry);
        }
        self.xref_stream_ids.extend(older.xref_stream_ids);
    }
}

/// Locate the offset following the last `startxref` keyword.
pub fn find_startxref(data: &[u8]) -> Result<usize> {
    let window_start = data.len().saturating_sub(STARTXREF_WINDOW);
    let tail = &data[window_start..];
    let pos = rfind_keyword(tail, b"startxref").ok_or_else(|| Error::malformed("startxref not found"))?;

    let digits: String = tail[pos + b"startxref".len()..]
        .iter()
        .skip_while(|&&c| is_whitespace(c))
        .take_while(|c| c.is_ascii_digit())
        .map(|&c| c as char)
        .collect();
    let offset = digits
        .parse::<usize>()
        .map_err(|_| Error::malformed("startxref is not followed by an offset"))?;
    if offset >= data.len() {
        return Err(Error::malformed(format!("startxref offset {} is past end of file", offset)));
    }
    Ok(offset)
}

/// Parse the xref section at `start` and every older section reachable through `/Prev`.
pub fn parse_xref_chain(data: &[u8], start: usize, max_chain: usize, ctx: &ParseContext<'_>) -> Result<CrossRefTable> {
    let mut visited = HashSet::new();
    let mut next = Some(start);
    let mut merged: Option<CrossRefTable> = None;

    while let Some(offset) = next.take() {
        if !visited.insert(offset) {
            log::warn!("Cycle in /Prev chain at offset {}, stopping", offset);
            break;
        }
        if visited.len() > max_chain {
            return Err(Error::malformed(format!("xref /Prev chain longer than {}", max_chain)));
        }

        let section = parse_section(data, offset, ctx)?;
        next = section
            .trailer
            .get("Prev")
            .and_then(|p| p.as_integer())
            .filter(|p| *p >= 0)
            .map(|p| p as usize);
        log::debug!(
            "Parsed xref section at {} with {} entries{}",
            offset,
            section.len(),
            next.map(|p| format!(", /Prev {}", p)).unwrap_or_default()
        );

        merged = Some(match merged {
            None => section,
            Some(mut newer) => {
                newer.merge_older(section);
                newer
            },
        });
    }

    let table = merged.ok_or_else(|| Error::malformed("no cross-reference section"))?;
    if table.is_empty() {
        return Err(Error::malformed("cross-reference table has no entries"));
    }
    Ok(table)
}

/// Parse one revision's xref: a classic table (plus hybrid stream) or an xref stream.
fn parse_section(data: &[u8], offset: usize, ctx: &ParseContext<'_>) -> Result<CrossRefTable> {
    if offset >= data.len() {
        return Err(Error::malformed(format!("xref offset {} is out of bounds", offset)));
    }
    let skipped = data[offset..].iter().take_while(|&&c| is_whitespace(c)).count();
    let at = &data[offset + skipped..];

    if at.starts_with(b"xref") {
        let mut table = parse_classic_table(data, offset + skipped)?;
        if let Some(stm_offset) = table
            .trailer
            .get("XRefStm")
            .and_then(|o| o.as_integer())
            .filter(|o| *o >= 0)
        {
            let hybrid = parse_xref_stream(data, stm_offset as usize, ctx)?;
            for (id, entry) in hybrid.entries {
                let replace = matches!(table.entries.get(&id), None | Some(XRefEntry::Free));
                if replace {
                    table.entries.insert(id, entry);
                }
            }
            table.xref_stream_ids.extend(hybrid.xref_stream_ids);
        }
        Ok(table)
    } else if at.first().is_some_and(|c| c.is_ascii_digit()) {
        parse_xref_stream(data, offset + skipped, ctx)
    } else {
        Err(Error::malformed(format!("no xref table or xref stream at offset {}", offset)))
    }
}

/// Whitespace-separated words; xref lines may end in CR, LF or CRLF.
struct Words<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Words<'a> {
    fn peek(&self) -> Option<&'a [u8]> {
        let start = self.pos + self.data[self.pos..].iter().take_while(|&&c| is_whitespace(c)).count();
        let len = self.data[start..].iter().take_while(|&&c| !is_whitespace(c)).count();
        (len > 0).then(|| &self.data[start..start + len])
    }

    fn next(&mut self) -> Option<&'a [u8]> {
        let start = self.pos + self.data[self.pos..].iter().take_while(|&&c| is_whitespace(c)).count();
        let len = self.data[start..].iter().take_while(|&&c| !is_whitespace(c)).count();
        self.pos = start + len;
        (len > 0).then(|| &self.data[start..start + len])
    }

    fn number(&mut self) -> Result<u64> {
        let word = self.next().ok_or_else(|| Error::malformed("xref table is truncated"))?;
        std::str::from_utf8(word)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                Error::malformed(format!("invalid number in xref table: {:?}", String::from_utf8_lossy(word)))
            })
    }
}

/// Parse a classic `xref` table followed by its `trailer`.
///
/// ```text
/// xref
/// 0 3
/// 0000000000 65535 f
/// 0000000017 00000 n
/// 0000000081 00000 n
/// trailer
/// << /Size 3 /Root 1 0 R >>
/// ```
fn parse_classic_table(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let mut words = Words {
        data,
        pos: offset + b"xref".len(),
    };
    let mut table = CrossRefTable::new();

    loop {
        match words.peek() {
            Some(w) if w.starts_with(b"trailer") => break,
            Some(_) => {},
            None => return Err(Error::malformed("xref table has no trailer")),
        }
        let first = object_number(words.number()?)?;
        let count = object_number(words.number()?)?;
        for i in 0..count {
            let field1 = words.number()?;
            let gen = words.number()?;
            let kind = words.next().ok_or_else(|| Error::malformed("xref table is truncated"))?;
            let id = first
                .checked_add(i)
                .ok_or_else(|| Error::malformed("xref object number overflow"))?;
            let entry = match kind {
                b"n" => XRefEntry::InUse {
                    offset: field1 as usize,
                    gen: gen.min(u16::MAX as u64) as u16,
                },
                b"f" => XRefEntry::Free,
                other => {
                    return Err(Error::malformed(format!(
                        "invalid xref entry type {:?}",
                        String::from_utf8_lossy(other)
                    )));
                },
            };
            // Object 0 is always the head of the free list
            if id == 0 && matches!(entry, XRefEntry::InUse { offset: 0, .. }) {
                continue;
            }
            table.entries.insert(id, entry);
        }
    }

    table.trailer = parse_trailer(&data[words.pos..])?;
    Ok(table)
}

/// Parse a cross-reference stream object at `offset`.
fn parse_xref_stream(data: &[u8], offset: usize, ctx: &ParseContext<'_>) -> Result<CrossRefTable> {
    if offset >= data.len() {
        return Err(Error::malformed(format!("xref stream offset {} is out of bounds", offset)));
    }
    let (_, (obj_ref, obj)) = parse_indirect_object(&data[offset..], ctx)
        .map_err(|e| to_error(data, e, "xref stream"))?;
    let Object::Stream { dict, .. } = &obj else {
        return Err(Error::malformed(format!("object at xref offset {} is not a stream", offset)));
    };
    if obj.dict_type() != Some("XRef") {
        return Err(Error::malformed("xref stream lacks /Type /XRef"));
    }

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(|w| w.as_array())
        .map(|w| w.iter().filter_map(|o| o.as_integer()).map(|n| n.max(0) as usize).collect())
        .unwrap_or_default();
    if widths.len() != 3 || widths.iter().any(|&w| w > 8) {
        return Err(Error::malformed("xref stream has an invalid /W array"));
    }
    let size = dict
        .get("Size")
        .and_then(|o| o.as_integer())
        .filter(|n| *n >= 0)
        .ok_or_else(|| Error::malformed("xref stream has no /Size"))
        .and_then(object_number)?;

    let ranges: Vec<(u32, u32)> = match dict.get("Index").and_then(|o| o.as_array()) {
        Some(index) => index
            .chunks(2)
            .map(|pair| match pair {
                [start, count] => match (start.as_integer(), count.as_integer()) {
                    (Some(s), Some(c)) => Ok((object_number(s)?, object_number(c)?)),
                    _ => Err(Error::malformed("xref stream /Index has invalid entries")),
                },
                _ => Err(Error::malformed("xref stream /Index has odd length")),
            })
            .collect::<Result<_>>()?,
        None => vec![(0, size)],
    };

    let decoded = obj.decode_stream_data(0)?;
    let entry_len: usize = widths.iter().sum();
    let mut table = CrossRefTable::new();
    let mut records = decoded.chunks_exact(entry_len.max(1));

    for (start, count) in ranges {
        for i in 0..count {
            let record = records
                .next()
                .ok_or_else(|| Error::malformed("xref stream data is truncated"))?;
            let (f1, rest) = record.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);
            // Type defaults to 1 when its field is absent
            let kind = if widths[0] == 0 { 1 } else { read_be(f1) };
            let entry = match kind {
                0 => XRefEntry::Free,
                1 => XRefEntry::InUse {
                    offset: read_be(f2) as usize,
                    gen: read_be(f3) as u16,
                },
                2 => XRefEntry::Compressed {
                    stream: object_number(read_be(f2))?,
                    index: read_be(f3) as usize,
                },
                // Unknown types are to be ignored (ISO 32000-1, 7.5.8.3)
                _ => continue,
            };
            let id = start
                .checked_add(i)
                .ok_or_else(|| Error::malformed("xref object number overflow"))?;
            table.entries.insert(id, entry);
        }
    }

    table.xref_stream_ids.insert(obj_ref.id);
    table.trailer = dict.clone();
    Ok(table)
}

/// An object number or count, which must fit in 32 bits.
fn object_number<N>(n: N) -> Result<u32>
where
    N: TryInto<u32> + Copy + std::fmt::Display,
{
    n.try_into()
        .map_err(|_| Error::malformed(format!("object number {} is out of range", n)))
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}
