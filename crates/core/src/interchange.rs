//! Tagged-JSON interchange form of the tree IR.
//!
//! The runtime consumes trees that are already parsed; hosts hand them over
//! in this JSON representation (each node an object with a `"kind"` tag).
//! The concrete Sakura text grammar stays outside the runtime.

use crate::error::{ErrorKind, SakuraError};
use crate::tree::{SakuraItem, TreeItem};

/// Deserialize a tree from interchange text. The top-level node must be a
/// `tree`.
pub fn tree_from_interchange(text: &str) -> Result<TreeItem, SakuraError> {
    let item: SakuraItem = serde_json::from_str(text).map_err(|err| {
        SakuraError::new(ErrorKind::Parse {
            message: err.to_string(),
        })
    })?;

    match item {
        SakuraItem::Tree(tree) => Ok(tree),
        other => Err(SakuraError::new(ErrorKind::Parse {
            message: format!("top-level node must be a tree, got {}", other.kind_name()),
        })),
    }
}

/// Serialize a tree back to interchange text.
pub fn tree_to_interchange(tree: &TreeItem) -> String {
    serde_json::to_string(&SakuraItem::Tree(tree.clone())).unwrap_or_default()
}
