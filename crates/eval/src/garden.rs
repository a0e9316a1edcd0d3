//! The garden: registry of trees, resources, templates, and files.
//!
//! Every map is keyed by id and rejects duplicate registration. Trees can
//! additionally be found by their relative file path, which is how subtree
//! references written as paths resolve.

use std::collections::BTreeMap;

use sakura_core::TreeItem;

#[derive(Debug, Default)]
pub struct SakuraGarden {
    trees: BTreeMap<String, TreeItem>,
    resources: BTreeMap<String, TreeItem>,
    templates: BTreeMap<String, String>,
    files: BTreeMap<String, Vec<u8>>,
}

impl SakuraGarden {
    pub fn new() -> Self {
        SakuraGarden::default()
    }

    /// Insert a tree. Returns false (leaving the garden unchanged) when the
    /// id is already taken.
    pub fn add_tree(&mut self, id: impl Into<String>, tree: TreeItem) -> bool {
        insert_unique(&mut self.trees, id.into(), tree)
    }

    pub fn get_tree(&self, id: &str) -> Option<&TreeItem> {
        self.trees.get(id)
    }

    /// Find a tree by file path: either its relative path or the full
    /// `root/relative` form a running plan carries.
    pub fn get_tree_by_path(&self, path: &str) -> Option<&TreeItem> {
        self.trees
            .values()
            .find(|tree| tree.relative_path == path || tree.file_path() == path)
    }

    pub fn add_resource(&mut self, id: impl Into<String>, resource: TreeItem) -> bool {
        insert_unique(&mut self.resources, id.into(), resource)
    }

    pub fn get_resource(&self, id: &str) -> Option<&TreeItem> {
        self.resources.get(id)
    }

    pub fn add_template(&mut self, id: impl Into<String>, content: impl Into<String>) -> bool {
        insert_unique(&mut self.templates, id.into(), content.into())
    }

    pub fn get_template(&self, id: &str) -> Option<&String> {
        self.templates.get(id)
    }

    pub fn add_file(&mut self, id: impl Into<String>, data: Vec<u8>) -> bool {
        insert_unique(&mut self.files, id.into(), data)
    }

    pub fn get_file(&self, id: &str) -> Option<&Vec<u8>> {
        self.files.get(id)
    }

    pub fn trees(&self) -> impl Iterator<Item = (&String, &TreeItem)> {
        self.trees.iter()
    }
}

fn insert_unique<V>(map: &mut BTreeMap<String, V>, key: String, value: V) -> bool {
    if map.contains_key(&key) {
        return false;
    }
    map.insert(key, value);
    true
}

/// Whether a subtree reference is a path (resolved against the calling
/// file) rather than an id.
pub fn is_path_reference(name_or_path: &str) -> bool {
    name_or_path.contains('/') || name_or_path.contains('.')
}

/// Resolve a reference relative to the parent directory of `file_path`,
/// folding `.` and `..` components.
pub fn resolve_relative_path(file_path: &str, reference: &str) -> String {
    let mut components: Vec<&str> = file_path.split('/').collect();
    components.pop();

    for part in reference.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            other => components.push(other),
        }
    }

    components.join("/")
}
