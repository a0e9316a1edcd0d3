//! The Sakura tree IR.
//!
//! The runtime consumes an already-built IR; the concrete grammar and its
//! parser live outside this crate. Nodes deserialize from the tagged JSON
//! interchange form (see `interchange`). `Clone` is the structural copy
//! used by serial loops and parallel fan-out.

use serde::{Deserialize, Serialize};

use crate::values::{ValueItem, ValueItemMap};

/// One node of a Sakura tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SakuraItem {
    Sequential(SequentialPart),
    Parallel(ParallelPart),
    Tree(TreeItem),
    Subtree(SubtreeItem),
    BlossomGroup(BlossomGroupItem),
    Blossom(BlossomItem),
    If(IfBranch),
    ForEach(ForEachBranch),
    For(ForBranch),
}

impl SakuraItem {
    pub fn kind_name(&self) -> &'static str {
        match self {
            SakuraItem::Sequential(_) => "sequential",
            SakuraItem::Parallel(_) => "parallel",
            SakuraItem::Tree(_) => "tree",
            SakuraItem::Subtree(_) => "subtree",
            SakuraItem::BlossomGroup(_) => "blossom_group",
            SakuraItem::Blossom(_) => "blossom",
            SakuraItem::If(_) => "if",
            SakuraItem::ForEach(_) => "for_each",
            SakuraItem::For(_) => "for",
        }
    }
}

/// Ordered children, executed in source order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SequentialPart {
    #[serde(default)]
    pub children: Vec<SakuraItem>,
    #[serde(default, skip_serializing_if = "ValueItemMap::is_empty")]
    pub values: ValueItemMap,
}

/// Parallel fan-out. The child is always a `Sequential` whose children are
/// the independent branches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelPart {
    pub child: Box<SakuraItem>,
    #[serde(default, skip_serializing_if = "ValueItemMap::is_empty")]
    pub values: ValueItemMap,
}

/// A named, parameterised subroutine. `values` are the formal parameters
/// (with defaults); `body` is the executable content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeItem {
    pub id: String,
    #[serde(default)]
    pub root_path: String,
    #[serde(default)]
    pub relative_path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unparsed_content: String,
    pub body: Box<SakuraItem>,
    #[serde(default, skip_serializing_if = "ValueItemMap::is_empty")]
    pub values: ValueItemMap,
}

impl TreeItem {
    /// Path of the file this tree was loaded from.
    pub fn file_path(&self) -> String {
        format!("{}/{}", self.root_path, self.relative_path)
    }
}

/// A call to another tree, referenced by id or by a path relative to the
/// calling tree's file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtreeItem {
    pub name_or_path: String,
    #[serde(default, skip_serializing_if = "ValueItemMap::is_empty")]
    pub values: ValueItemMap,
}

/// A group of blossoms sharing a group type and default arguments. The id
/// is template-expanded at run time for human-readable output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlossomGroupItem {
    pub id: String,
    pub blossom_group_type: String,
    #[serde(default)]
    pub blossoms: Vec<BlossomItem>,
    #[serde(default, skip_serializing_if = "ValueItemMap::is_empty")]
    pub values: ValueItemMap,
}

/// A single action invocation, dispatched to the handler registered under
/// `(blossom_group_type, blossom_type)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlossomItem {
    pub blossom_type: String,
    #[serde(default)]
    pub blossom_group_type: String,
    #[serde(default)]
    pub blossom_name: String,
    #[serde(default, skip_serializing_if = "ValueItemMap::is_empty")]
    pub values: ValueItemMap,
}

/// Comparison relation of an `if` node. Stringified equality only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Equal,
    Unequal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfBranch {
    pub left: ValueItem,
    pub comparator: Comparator,
    pub right: ValueItem,
    pub then_body: Box<SakuraItem>,
    pub else_body: Box<SakuraItem>,
    #[serde(default, skip_serializing_if = "ValueItemMap::is_empty")]
    pub values: ValueItemMap,
}

/// Iteration over a resolved array. `values` are the post-aggregation
/// outputs merged after all iterations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForEachBranch {
    pub temp_var_name: String,
    #[serde(default)]
    pub parallel: bool,
    pub iterate_array: ValueItem,
    pub body: Box<SakuraItem>,
    #[serde(default, skip_serializing_if = "ValueItemMap::is_empty")]
    pub values: ValueItemMap,
}

/// Counter loop over `start..end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForBranch {
    pub temp_var_name: String,
    #[serde(default)]
    pub parallel: bool,
    pub start: ValueItem,
    pub end: ValueItem,
    pub body: Box<SakuraItem>,
    #[serde(default, skip_serializing_if = "ValueItemMap::is_empty")]
    pub values: ValueItemMap,
}
