//! PDF object types.
//!
//! Objects never point at each other directly: an edge in the object graph is a
//! [`Object::Reference`] holding an `(id, gen)` pair that is looked up through
//! the owning [`Document`](crate::document::Document). Renumbering and pruning
//! are therefore plain rewrites over these pairs.

use crate::decoders::{self, DecodeParams};
use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};

/// Dictionary payload shared by `Dictionary` and `Stream` objects.
pub type Dict = HashMap<String, Object>;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String (byte array)
    String(Vec<u8>),
    /// Name (without the leading /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(Dict),
    /// Stream (dictionary + raw, still-filtered data)
    Stream {
        /// Stream dictionary
        dict: Dict,
        /// Stream data
        data: bytes::Bytes,
    },
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

impl Object {
    /// Human-readable type name, without data.
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream { .. } => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Integer or real as `f64`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Mutable dictionary access, for Dictionary and Stream objects.
    pub fn as_dict_mut(&mut self) -> Option<&mut Dict> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to cast to string (bytes).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// `/Type` of a dictionary or stream.
    pub fn dict_type(&self) -> Option<&str> {
        self.as_dict()?.get("Type")?.as_name()
    }

    /// Call `f` for every reference contained in this object, recursively.
    pub fn for_each_reference(&self, f: &mut impl FnMut(ObjectRef)) {
        match self {
            Object::Reference(r) => f(*r),
            Object::Array(items) => items.iter().for_each(|o| o.for_each_reference(f)),
            Object::Dictionary(dict) | Object::Stream { dict, .. } => {
                dict.values().for_each(|o| o.for_each_reference(f))
            },
            _ => {},
        }
    }

    /// Rewrite every reference in place through `f`.
    pub fn map_references(&mut self, f: &mut impl FnMut(ObjectRef) -> ObjectRef) {
        match self {
            Object::Reference(r) => *r = f(*r),
            Object::Array(items) => items.iter_mut().for_each(|o| o.map_references(f)),
            Object::Dictionary(dict) | Object::Stream { dict, .. } => {
                dict.values_mut().for_each(|o| o.map_references(f))
            },
            _ => {},
        }
    }

    /// Replace references whose target is not in `live` with `null`, counting them.
    pub fn replace_dangling(&mut self, live: &HashSet<ObjectRef>, count: &mut usize) {
        match self {
            Object::Reference(r) if !live.contains(r) => {
                *self = Object::Null;
                *count += 1;
            },
            Object::Array(items) => items.iter_mut().for_each(|o| o.replace_dangling(live, count)),
            Object::Dictionary(dict) | Object::Stream { dict, .. } => {
                dict.values_mut().for_each(|o| o.replace_dangling(live, count))
            },
            _ => {},
        }
    }

    /// Apply `f` to every string contained in this object, recursively.
    ///
    /// Used by the encryption layer; stream payloads are handled separately.
    pub fn map_strings(&mut self, f: &mut impl FnMut(&[u8]) -> Result<Vec<u8>>) -> Result<()> {
        match self {
            Object::String(s) => *s = f(s)?,
            Object::Array(items) => {
                for item in items {
                    item.map_strings(f)?;
                }
            },
            Object::Dictionary(dict) | Object::Stream { dict, .. } => {
                for value in dict.values_mut() {
                    value.map_strings(f)?;
                }
            },
            _ => {},
        }
        Ok(())
    }

    /// Decode stream data through its `/Filter` pipeline.
    ///
    /// `max_size` bounds decompressed output (0 disables the bound).
    pub fn decode_stream_data(&self, max_size: usize) -> Result<Vec<u8>> {
        let Object::Stream { dict, data } = self else {
            return Err(Error::malformed(format!("expected a stream, found {}", self.type_name())));
        };

        let filters = dict.get("Filter").map(filter_names).unwrap_or_default();
        if filters.is_empty() {
            return Ok(data.to_vec());
        }
        let params = decode_params(dict.get("DecodeParms"));
        decoders::decode_stream(data, &filters, params.as_ref(), max_size)
    }
}

/// Filter names from a `/Filter` entry, which is either a Name or an Array of Names.
pub fn filter_names(filter_obj: &Object) -> Vec<String> {
    match filter_obj {
        Object::Name(name) => vec![name.clone()],
        Object::Array(arr) => arr
            .iter()
            .filter_map(|obj| obj.as_name().map(|s| s.to_string()))
            .collect(),
        _ => vec![],
    }
}

/// Predictor parameters from `/DecodeParms` (a dictionary, or an array whose
/// first dictionary applies).
fn decode_params(params_obj: Option<&Object>) -> Option<DecodeParams> {
    let dict = match params_obj? {
        Object::Dictionary(d) => d,
        Object::Array(arr) => arr.iter().find_map(|obj| obj.as_dict())?,
        _ => return None,
    };
    let get = |key: &str, default: i64| dict.get(key).and_then(|o| o.as_integer()).unwrap_or(default);

    Some(DecodeParams {
        predictor: get("Predictor", 1),
        columns: get("Columns", 1).max(1) as usize,
        colors: get("Colors", 1).max(1) as usize,
        bits_per_component: get("BitsPerComponent", 8).max(1) as usize,
    })
}
