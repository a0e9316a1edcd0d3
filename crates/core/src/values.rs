//! Value items: the declared inputs/outputs attached to every IR node.
//!
//! A `ValueItem` is a `DataItem` plus the information the resolver needs:
//! whether it is an identifier to look up in the scope, whether it is an
//! output capture, and the transformation functions to run over it. A
//! `ValueItemMap` groups the items of one node, with nested child maps for
//! grouped argument objects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::items::DataItem;

/// Direction of a value item at a node boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoType {
    /// Plain argument or literal.
    #[default]
    Plain,
    /// Declared input of the node.
    Input,
    /// Output capture: the entry key is the target variable, the item holds
    /// the produced-output name to copy from.
    Output,
}

/// One call in a value item's function pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<ValueItem>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: Vec<ValueItem>) -> Self {
        FunctionCall {
            name: name.into(),
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValueItem {
    #[serde(default)]
    pub item: DataItem,
    #[serde(default, skip_serializing_if = "is_plain")]
    pub io_type: IoType,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_identifier: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionCall>,
}

fn is_plain(io: &IoType) -> bool {
    *io == IoType::Plain
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl ValueItem {
    /// A literal value.
    pub fn literal(item: impl Into<DataItem>) -> Self {
        ValueItem {
            item: item.into(),
            ..ValueItem::default()
        }
    }

    /// A reference to a scope variable.
    pub fn identifier(name: impl Into<String>) -> Self {
        ValueItem {
            item: DataItem::String(name.into()),
            is_identifier: true,
            ..ValueItem::default()
        }
    }

    /// An input-tagged literal (tree/blossom parameter declaration).
    pub fn input(item: impl Into<DataItem>) -> Self {
        ValueItem {
            item: item.into(),
            io_type: IoType::Input,
            ..ValueItem::default()
        }
    }

    /// An output capture of the produced value named `produced`.
    pub fn output(produced: impl Into<String>) -> Self {
        ValueItem {
            item: DataItem::String(produced.into()),
            io_type: IoType::Output,
            ..ValueItem::default()
        }
    }

    pub fn with_functions(mut self, functions: Vec<FunctionCall>) -> Self {
        self.functions = functions;
        self
    }
}

/// Ordered name -> value-item mapping plus nested child maps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValueItemMap {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, ValueItem>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, ValueItemMap>,
}

impl ValueItemMap {
    pub fn new() -> Self {
        ValueItemMap::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ValueItem) {
        self.values.insert(name.into(), value);
    }

    pub fn insert_child(&mut self, name: impl Into<String>, child: ValueItemMap) {
        self.children.insert(name.into(), child);
    }

    pub fn get(&self, name: &str) -> Option<&ValueItem> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}
