//! Sakura language runtime core -- data model, value resolution, and the
//! interchange form of the tree IR.
//!
//! A Sakura program is a collection of trees: named, parameterised
//! subroutines composing blossoms (host-registered action handlers),
//! subtree calls, conditionals, and loops. This crate owns everything the
//! execution engine in `sakura-eval` needs that is not scheduling: the
//! value and tree data model, the resolver that turns declared values into
//! concrete ones, the override policies used at scope boundaries, the
//! blossom field schemas, and the error surface.

pub mod error;
pub mod fields;
pub mod functions;
pub mod interchange;
pub mod items;
pub mod resolve;
pub mod template;
pub mod tree;
pub mod values;

pub use error::{error_table, ErrorKind, ErrorSite, SakuraError};
pub use fields::{BlossomSchema, FieldDef, FieldIo, FieldType};
pub use interchange::{tree_from_interchange, tree_to_interchange};
pub use items::{DataItem, DataMap, UNINITIALIZED};
pub use resolve::{
    check_input, check_items, convert_value_map, fill_input_value_item_map,
    fill_output_value_item_map, fill_value_item, override_items, override_items_with,
    override_value_items, OverrideMode,
};
pub use template::{BasicTemplate, TemplateEngine};
pub use tree::{
    BlossomGroupItem, BlossomItem, Comparator, ForBranch, ForEachBranch, IfBranch, ParallelPart,
    SakuraItem, SequentialPart, SubtreeItem, TreeItem,
};
pub use values::{FunctionCall, IoType, ValueItem, ValueItemMap};
