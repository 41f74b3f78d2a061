//! Metadata codec: nested structures to flat object metadata and back.
//!
//! Object stores attach only flat `string -> string` metadata to an object.
//! [`flatten`] turns any JSON value into such a mapping and [`unflatten`]
//! rebuilds the exact value from it.
//!
//! Keys follow the grammar in [`path`]. Every value is the compact JSON text
//! of one leaf: a scalar, `{}` or `[]`. Leaf types therefore survive the trip,
//! so the boolean `true` (`true`) never collides with the string `"true"`
//! (`"true"` with quotes).
//!
//! ```
//! use serde_json::json;
//! use storj_backup::codec::{flatten, unflatten};
//!
//! let value = json!({"name": "Test", "folders": ["media"], "protected": false});
//! let flat = flatten(&value);
//! assert_eq!(flat["folders[0]"], r#""media""#);
//! assert_eq!(flat["protected"], "false");
//! assert_eq!(unflatten(&flat).unwrap(), value);
//! ```

pub mod path;


use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use path::{PathSegment, encode_path, parse_key};

/// Flat metadata as attached to a stored object.
pub type FlattenedMetadata = BTreeMap<String, String>;

/// Errors raised while encoding or decoding metadata.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CodecError {
    /// A key does not follow the path grammar.
    #[error("invalid metadata key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// A value is not the JSON text of a leaf.
    #[error("invalid metadata value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// The same path is used as a leaf, a mapping or a sequence at once.
    #[error("metadata key '{key}' conflicts with another entry")]
    Conflict { key: String },

    /// A sequence is missing one of its positions.
    #[error("sequence at '{key}' has missing elements")]
    SparseSequence { key: String },

    /// No entries at all.
    #[error("metadata is empty")]
    Empty,

    /// The structure could not be converted to a JSON value.
    #[error("failed to encode metadata: {0}")]
    Encode(String),

    /// The rebuilt structure does not match the expected type.
    #[error("failed to decode metadata: {0}")]
    Decode(String),
}

/// Flattens a JSON value into path-keyed leaf entries.
pub fn flatten(value: &Value) -> FlattenedMetadata {
    let mut out = FlattenedMetadata::new();
    let mut path = Vec::new();
    flatten_into(value, &mut path, &mut out);
    out
}

fn flatten_into(value: &Value, path: &mut Vec<PathSegment>, out: &mut FlattenedMetadata) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (name, child) in map {
                path.push(PathSegment::Key(name.clone()));
                flatten_into(child, path, out);
                path.pop();
            }
        },
        Value::Array(items) if !items.is_empty() => {
            for (index, child) in items.iter().enumerate() {
                path.push(PathSegment::Index(index));
                flatten_into(child, path, out);
                path.pop();
            }
        },
        leaf => {
            out.insert(encode_path(path), leaf.to_string());
        },
    }
}

/// Rebuilds the value that [`flatten`] produced `flat` from.
///
/// # Errors
///
/// Returns a [`CodecError`] if a key or value is malformed, if a path is used
/// both as a mapping and as a sequence (or as a leaf and a container), if a
/// sequence has gaps, or if `flat` is empty.
pub fn unflatten(flat: &FlattenedMetadata) -> Result<Value, CodecError> {
    if flat.is_empty() {
        return Err(CodecError::Empty);
    }

    let mut root = Node::Vacant;
    for (key, raw) in flat {
        let segments = parse_key(key)?;
        let leaf = parse_leaf(key, raw)?;
        root.insert(&segments, leaf, key)?;
    }

    root.finish(&mut Vec::new())
}

/// Serializes `value` and flattens it.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if `value` cannot be represented as JSON.
pub fn encode<T: Serialize>(value: &T) -> Result<FlattenedMetadata, CodecError> {
    let value = serde_json::to_value(value).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(flatten(&value))
}

/// Unflattens `flat` and deserializes the result.
///
/// # Errors
///
/// Returns a [`CodecError`] if unflattening fails or the structure does not
/// match `T`.
pub fn decode<T: DeserializeOwned>(flat: &FlattenedMetadata) -> Result<T, CodecError> {
    let value = unflatten(flat)?;
    serde_json::from_value(value).map_err(|e| CodecError::Decode(e.to_string()))
}

fn parse_leaf(key: &str, raw: &str) -> Result<Value, CodecError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| CodecError::InvalidValue {
        key: key.to_string(),
        reason: e.to_string(),
    })?;

    let is_leaf = match &value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => true,
    };
    if !is_leaf {
        return Err(CodecError::InvalidValue {
            key: key.to_string(),
            reason: "non-empty container".to_string(),
        });
    }

    Ok(value)
}

/// Partially rebuilt structure.
enum Node {
    Vacant,
    Leaf(Value),
    Map(BTreeMap<String, Node>),
    Seq(BTreeMap<usize, Node>),
}

impl Node {
    fn insert(&mut self, segments: &[PathSegment], leaf: Value, key: &str) -> Result<(), CodecError> {
        let conflict = || CodecError::Conflict {
            key: key.to_string(),
        };

        let Some((head, rest)) = segments.split_first() else {
            return match self {
                Self::Vacant => {
                    *self = Self::Leaf(leaf);
                    Ok(())
                },
                _ => Err(conflict()),
            };
        };

        if matches!(self, Self::Vacant) {
            *self = match head {
                PathSegment::Key(_) => Self::Map(BTreeMap::new()),
                PathSegment::Index(_) => Self::Seq(BTreeMap::new()),
            };
        }

        match (self, head) {
            (Self::Map(map), PathSegment::Key(name)) => map
                .entry(name.clone())
                .or_insert(Self::Vacant)
                .insert(rest, leaf, key),
            (Self::Seq(items), PathSegment::Index(index)) => items
                .entry(*index)
                .or_insert(Self::Vacant)
                .insert(rest, leaf, key),
            _ => Err(conflict()),
        }
    }

    fn finish(self, path: &mut Vec<PathSegment>) -> Result<Value, CodecError> {
        match self {
            // Only reachable for an empty root, which `unflatten` rejects.
            Self::Vacant => Err(CodecError::Empty),
            Self::Leaf(value) => Ok(value),
            Self::Map(map) => {
                let mut out = Map::new();
                for (name, child) in map {
                    path.push(PathSegment::Key(name.clone()));
                    let value = child.finish(path)?;
                    path.pop();
                    out.insert(name, value);
                }
                Ok(Value::Object(out))
            },
            Self::Seq(items) => {
                let dense = items.keys().enumerate().all(|(i, index)| i == *index);
                if !dense {
                    return Err(CodecError::SparseSequence {
                        key: encode_path(path),
                    });
                }
                let mut out = Vec::with_capacity(items.len());
                for (index, child) in items {
                    path.push(PathSegment::Index(index));
                    out.push(child.finish(path)?);
                    path.pop();
                }
                Ok(Value::Array(out))
            },
        }
    }
}
