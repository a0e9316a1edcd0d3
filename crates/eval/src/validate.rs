//! Static validation of trees at registration time.
//!
//! The validator walks the IR and checks every blossom call against the
//! schema of its registered handler: unknown argument keys, missing
//! required inputs, and output captures naming undeclared outputs. A tree
//! only enters the garden when this pass accepts it, so a validated tree
//! dispatches exclusively to known blossoms or registered resources.

use sakura_core::{
    error_table, override_value_items, BlossomItem, BlossomSchema, ErrorKind, ErrorSite, IoType,
    OverrideMode, SakuraError, SakuraItem,
};

use crate::garden::SakuraGarden;
use crate::BlossomRegistry;

pub(crate) struct Validator<'a> {
    garden: &'a SakuraGarden,
    blossoms: &'a BlossomRegistry,
}

impl<'a> Validator<'a> {
    pub fn new(garden: &'a SakuraGarden, blossoms: &'a BlossomRegistry) -> Self {
        Validator { garden, blossoms }
    }

    /// Recursively check one IR node.
    pub fn check_item(&self, item: &SakuraItem, file_path: &str) -> Result<(), SakuraError> {
        match item {
            SakuraItem::Sequential(sequential) => {
                for child in &sequential.children {
                    self.check_item(child, file_path)?;
                }
                Ok(())
            }
            SakuraItem::Parallel(parallel) => self.check_item(&parallel.child, file_path),
            SakuraItem::Tree(tree) => self.check_item(&tree.body, &tree.file_path()),
            // Subtrees resolve at run time; nothing to check statically.
            SakuraItem::Subtree(_) => Ok(()),
            SakuraItem::BlossomGroup(group) => {
                for blossom in &group.blossoms {
                    // Mirror the engine: stamp group identity and propagate
                    // group values before checking the call.
                    let mut effective = blossom.clone();
                    effective.blossom_group_type = group.blossom_group_type.clone();
                    effective.blossom_name = group.id.clone();
                    override_value_items(
                        &mut effective.values,
                        &group.values,
                        OverrideMode::OnlyNonExisting,
                    );
                    self.check_blossom(&effective, file_path)?;
                }
                Ok(())
            }
            SakuraItem::Blossom(blossom) => self.check_blossom(blossom, file_path),
            SakuraItem::If(branch) => {
                self.check_item(&branch.then_body, file_path)?;
                self.check_item(&branch.else_body, file_path)
            }
            SakuraItem::ForEach(branch) => self.check_item(&branch.body, file_path),
            SakuraItem::For(branch) => self.check_item(&branch.body, file_path),
        }
    }

    fn check_blossom(&self, blossom: &BlossomItem, file_path: &str) -> Result<(), SakuraError> {
        // A blossom-type backed by a registered resource runs as a subtree
        // call; its values are the resource's concern.
        if self.garden.get_resource(&blossom.blossom_type).is_some() {
            return Ok(());
        }

        let site = ErrorSite {
            location: "validator".to_string(),
            blossom_type: blossom.blossom_type.clone(),
            blossom_group_type: blossom.blossom_group_type.clone(),
            blossom_name: blossom.blossom_name.clone(),
            blossom_file_path: file_path.to_string(),
            ..ErrorSite::default()
        };

        let handler = self
            .blossoms
            .get(&blossom.blossom_group_type)
            .and_then(|group| group.get(&blossom.blossom_type))
            .ok_or_else(|| {
                SakuraError::new(ErrorKind::UnknownBlossom {
                    group: blossom.blossom_group_type.clone(),
                    name: blossom.blossom_type.clone(),
                })
                .context(error_table(&site, "unknown blossom-type"))
            })?;

        validate_input(handler.schema(), blossom)
            .map_err(|err| {
                let message = err.kind.to_string();
                err.context(error_table(&site, &message))
            })
    }
}

/// Check a blossom call's value map against a handler schema.
pub(crate) fn validate_input(
    schema: &BlossomSchema,
    blossom: &BlossomItem,
) -> Result<(), SakuraError> {
    // Unknown argument keys, unless the schema carries the wildcard.
    if !schema.accepts_unknown_keys() {
        for (key, value_item) in &blossom.values.values {
            if value_item.io_type == IoType::Output {
                continue;
            }
            if !schema.has_input(key) {
                return Err(SakuraError::new(ErrorKind::UnknownKey { key: key.clone() }));
            }
        }
    }

    // Every required input has to appear in the value map.
    for (name, def) in schema.inputs() {
        if def.required && !blossom.values.contains(name) {
            return Err(SakuraError::new(ErrorKind::MissingKey { key: name.clone() }));
        }
    }

    // Output captures must name declared outputs.
    for (key, value_item) in &blossom.values.values {
        if value_item.io_type != IoType::Output {
            continue;
        }
        let produced = value_item.item.to_string();
        if !schema.has_output(&produced) {
            return Err(SakuraError::new(ErrorKind::UnknownOutputKey {
                key: key.clone(),
                produced,
            }));
        }
    }

    Ok(())
}
