//! Runtime data values flowing through Sakura trees.
//!
//! A `DataItem` is a tagged value tree; a `DataMap` is the variable scope of
//! a running tree. Both are deep-copied at every scope boundary (`Clone` is
//! the structural copy the loop and parallel policies rely on).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A variable scope: name -> value, in deterministic key order.
pub type DataMap = BTreeMap<String, DataItem>;

/// Marker for a declared-but-unset value. A scope containing this literal
/// is rejected before any blossom is dispatched.
pub const UNINITIALIZED: &str = "{{}}";

/// A single value in the Sakura data model.
///
/// The untagged serde representation makes `DataItem` interchangeable with
/// plain JSON: `42` is `Int`, `"x"` is `String`, objects are `Map`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataItem {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<DataItem>),
    Map(BTreeMap<String, DataItem>),
}

impl Default for DataItem {
    fn default() -> Self {
        DataItem::Null
    }
}

impl DataItem {
    /// Kind name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            DataItem::Null => "null",
            DataItem::Bool(_) => "bool",
            DataItem::Int(_) => "int",
            DataItem::Float(_) => "float",
            DataItem::String(_) => "string",
            DataItem::Array(_) => "array",
            DataItem::Map(_) => "map",
        }
    }

    pub fn is_value(&self) -> bool {
        !matches!(self, DataItem::Array(_) | DataItem::Map(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, DataItem::String(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, DataItem::Map(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, DataItem::Array(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataItem::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            DataItem::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[DataItem]> {
        match self {
            DataItem::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, DataItem>> {
        match self {
            DataItem::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Number of entries for containers, byte length for strings, 1 for
    /// every scalar.
    pub fn size(&self) -> usize {
        match self {
            DataItem::Array(items) => items.len(),
            DataItem::Map(map) => map.len(),
            DataItem::String(s) => s.len(),
            _ => 1,
        }
    }

    /// Serialize to canonical JSON text.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse JSON text into a value tree.
    pub fn from_json(text: &str) -> Result<DataItem, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Scalars render raw (no quotes), containers render as JSON. This is the
/// stringification used by `if`-comparison, `contains`, and the error
/// output, so it has to be stable.
impl fmt::Display for DataItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataItem::Null => Ok(()),
            DataItem::Bool(b) => write!(f, "{}", b),
            DataItem::Int(i) => write!(f, "{}", i),
            DataItem::Float(v) => write!(f, "{}", v),
            DataItem::String(s) => write!(f, "{}", s),
            DataItem::Array(_) | DataItem::Map(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<bool> for DataItem {
    fn from(v: bool) -> Self {
        DataItem::Bool(v)
    }
}

impl From<i64> for DataItem {
    fn from(v: i64) -> Self {
        DataItem::Int(v)
    }
}

impl From<f64> for DataItem {
    fn from(v: f64) -> Self {
        DataItem::Float(v)
    }
}

impl From<&str> for DataItem {
    fn from(v: &str) -> Self {
        DataItem::String(v.to_string())
    }
}

impl From<String> for DataItem {
    fn from(v: String) -> Self {
        DataItem::String(v)
    }
}
