//! The execution engine: dispatch over tree IR node kinds.
//!
//! Recursion stays on the executing worker; only `parallel` nodes and
//! parallel-flagged loops hand work to the queue. Every scope boundary goes
//! through one of the override policies; see `sakura_core::resolve`.

use std::mem;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use sakura_core::{
    check_items, convert_value_map, error_table, fill_input_value_item_map,
    fill_output_value_item_map, fill_value_item, override_items, override_items_with,
    override_value_items, BlossomGroupItem, BlossomItem, Comparator, DataItem, ErrorKind,
    ErrorSite, ForBranch, ForEachBranch, IfBranch, IoType, OverrideMode, ParallelPart,
    SakuraError, SakuraItem, SequentialPart, SubtreeItem, TreeItem, ValueItemMap,
};
use tracing::debug;

use crate::blossom::{grow_blossom, render_hierarchy, BlossomIO};
use crate::garden::{is_path_reference, resolve_relative_path};
use crate::plan::{ActiveCounter, GrowthPlan};
use crate::queue::POLL_INTERVAL;
use crate::runtime_check;
use crate::RuntimeInner;

/// Values a loop binds its temporary variable to.
pub(crate) enum LoopSource {
    Array(Vec<DataItem>),
    Range(i64, i64),
}

impl LoopSource {
    fn len(&self) -> usize {
        match self {
            LoopSource::Array(items) => items.len(),
            LoopSource::Range(start, end) => (end - start).max(0) as usize,
        }
    }

    fn binding(&self, index: usize) -> DataItem {
        match self {
            LoopSource::Array(items) => items[index].clone(),
            LoopSource::Range(start, _) => DataItem::Int(start + index as i64),
        }
    }
}

pub(crate) struct Engine<'a> {
    rt: &'a RuntimeInner,
}

impl<'a> Engine<'a> {
    pub fn new(rt: &'a RuntimeInner) -> Self {
        Engine { rt }
    }

    fn templates(&self) -> &dyn sakura_core::TemplateEngine {
        self.rt.templates.as_ref()
    }

    /// Central dispatch. A sibling failure inside the spawning region makes
    /// this a no-op returning success; the parent's failure state stands.
    pub fn process_item(
        &self,
        plan: &mut GrowthPlan,
        item: &mut SakuraItem,
    ) -> Result<(), SakuraError> {
        if let Some(parent) = &plan.parent_counter {
            if !parent.succeeded() {
                return Ok(());
            }
        }

        match item {
            SakuraItem::Sequential(sequential) => self.process_sequential(plan, sequential),
            SakuraItem::Parallel(parallel) => self.process_parallel(plan, parallel),
            SakuraItem::Tree(tree) => self.process_tree(plan, tree),
            SakuraItem::Subtree(subtree) => self.process_subtree(plan, subtree),
            SakuraItem::BlossomGroup(group) => self.process_blossom_group(plan, group),
            SakuraItem::Blossom(blossom) => self.process_blossom(plan, blossom),
            SakuraItem::If(branch) => self.process_if(plan, branch),
            SakuraItem::ForEach(branch) => self.process_for_each(plan, branch),
            SakuraItem::For(branch) => self.process_for(plan, branch),
        }
    }

    fn process_sequential(
        &self,
        plan: &mut GrowthPlan,
        sequential: &mut SequentialPart,
    ) -> Result<(), SakuraError> {
        for child in &mut sequential.children {
            self.process_item(plan, child)?;
        }
        Ok(())
    }

    fn process_parallel(
        &self,
        plan: &mut GrowthPlan,
        parallel: &mut ParallelPart,
    ) -> Result<(), SakuraError> {
        let SakuraItem::Sequential(branches) = parallel.child.as_ref() else {
            return Err(SakuraError::new(ErrorKind::Parse {
                message: "parallel node must contain a sequential part".to_string(),
            }));
        };
        self.spawn_parallel_subtrees(plan, &branches.children)
    }

    fn process_tree(&self, plan: &mut GrowthPlan, tree: &mut TreeItem) -> Result<(), SakuraError> {
        debug!(tree = %tree.id, "process tree");

        let uninitialized = check_items(&plan.items);
        if !uninitialized.is_empty() {
            return Err(SakuraError::new(ErrorKind::UninitialisedValue {
                names: uninitialized,
            }));
        }

        plan.hierarchy.push(format!("TREE: {}", tree.id));
        let previous_path = mem::replace(&mut plan.file_path, tree.file_path());

        let result = self.process_item(plan, &mut tree.body);

        plan.file_path = previous_path;
        plan.hierarchy.pop();
        result
    }

    fn process_subtree(
        &self,
        plan: &mut GrowthPlan,
        subtree: &mut SubtreeItem,
    ) -> Result<(), SakuraError> {
        let garden = self.rt.garden.read();
        let resolved = if is_path_reference(&subtree.name_or_path) {
            let relative = resolve_relative_path(&plan.file_path, &subtree.name_or_path);
            garden.get_tree_by_path(&relative).cloned()
        } else {
            garden.get_tree(&subtree.name_or_path).cloned()
        };
        drop(garden);

        let tree = resolved.ok_or_else(|| {
            SakuraError::new(ErrorKind::MissingSubtree {
                name: subtree.name_or_path.clone(),
            })
        })?;

        debug!(subtree = %tree.id, path = %tree.relative_path, "process subtree");
        self.run_subtree_call(plan, tree, subtree.values.clone())
    }

    /// Shared tail of subtree and resource calls: seed the callee scope
    /// from the filled arguments, run the tree, copy declared outputs back.
    fn run_subtree_call(
        &self,
        plan: &mut GrowthPlan,
        mut tree: TreeItem,
        mut values: ValueItemMap,
    ) -> Result<(), SakuraError> {
        fill_input_value_item_map(&mut values, &plan.items, self.templates())
            .map_err(|err| err.context("error while processing subtree-call"))?;

        let caller_scope = mem::take(&mut plan.items);

        override_value_items(&mut tree.values, &values, OverrideMode::All);
        override_items_with(&mut plan.items, &tree.values, OverrideMode::All);

        self.process_tree(plan, &mut tree)?;

        fill_output_value_item_map(&mut tree.values, &plan.items)?;

        plan.items = caller_scope;
        override_items_with(&mut plan.items, &tree.values, OverrideMode::OnlyExisting);
        Ok(())
    }

    fn process_blossom_group(
        &self,
        plan: &mut GrowthPlan,
        group: &mut BlossomGroupItem,
    ) -> Result<(), SakuraError> {
        group.id = self
            .rt
            .templates
            .render(&group.id, &plan.items)
            .map_err(|message| {
                SakuraError::new(ErrorKind::Template { message })
                    .context("error while expanding blossom-group id")
            })?;

        let mut breadcrumb = plan.hierarchy.clone();
        breadcrumb.push(format!("BLOSSOM-GROUP: {}", group.id));
        debug!("process blossom group\n{}", render_hierarchy(&breadcrumb));

        for blossom in &mut group.blossoms {
            // Resource first, registered handler second.
            let resource = self
                .rt
                .garden
                .read()
                .get_resource(&blossom.blossom_type)
                .cloned();
            if let Some(resource_tree) = resource {
                debug!(resource = %resource_tree.id, "process resource");
                self.run_subtree_call(plan, resource_tree, group.values.clone())?;
                continue;
            }

            blossom.blossom_group_type = group.blossom_group_type.clone();
            blossom.blossom_name = group.id.clone();
            override_value_items(&mut blossom.values, &group.values, OverrideMode::OnlyNonExisting);

            self.process_blossom(plan, blossom)?;
        }

        Ok(())
    }

    fn process_blossom(
        &self,
        plan: &mut GrowthPlan,
        blossom: &mut BlossomItem,
    ) -> Result<(), SakuraError> {
        debug!(
            group = %blossom.blossom_group_type,
            name = %blossom.blossom_type,
            "process blossom"
        );

        let site = ErrorSite {
            location: "processing".to_string(),
            blossom_type: blossom.blossom_type.clone(),
            blossom_group_type: blossom.blossom_group_type.clone(),
            blossom_name: blossom.blossom_name.clone(),
            blossom_file_path: plan.file_path.clone(),
            ..ErrorSite::default()
        };

        fill_input_value_item_map(&mut blossom.values, &plan.items, self.templates()).map_err(
            |err| {
                let table = error_table(&site, "error while processing blossom items");
                err.context(table)
            },
        )?;

        let handler = self
            .rt
            .get_blossom(&blossom.blossom_group_type, &blossom.blossom_type)
            .ok_or_else(|| {
                SakuraError::new(ErrorKind::UnknownBlossom {
                    group: blossom.blossom_group_type.clone(),
                    name: blossom.blossom_type.clone(),
                })
                .context(error_table(&site, "unknown blossom-type"))
            })?;

        let mut input = convert_value_map(&blossom.values);
        // An output capture exposes the target variable's current value as
        // the same-named input, so read-modify-write handlers (accumulator
        // blossoms) see the value they are about to replace.
        for (key, value_item) in &blossom.values.values {
            if value_item.io_type != IoType::Output {
                continue;
            }
            match plan.items.get(key) {
                Some(current) => {
                    input.insert(key.clone(), current.clone());
                }
                None => {
                    input.remove(key);
                }
            }
        }

        let mut io = BlossomIO {
            blossom_path: plan.file_path.clone(),
            name_hierarchy: plan.hierarchy.clone(),
            parent_values: plan.items.clone(),
            input,
            ..BlossomIO::default()
        };
        io.name_hierarchy
            .push(format!("BLOSSOM: {}", blossom.blossom_name));

        runtime_check::check_blossom_values(handler.schema(), &mut io.input)
            .map_err(|err| err.context(error_table(&site, "invalid blossom input")))?;

        grow_blossom(
            handler.as_ref(),
            &mut io,
            &plan.context,
            &mut plan.status,
            &site,
        )?;

        debug!("{}", io.render_output());

        // Outputs the handler wrote beyond its declared schema are dropped.
        let schema = handler.schema();
        io.output.retain(|name, _| schema.has_output(name));

        fill_output_value_item_map(&mut blossom.values, &io.output)?;
        override_items_with(&mut plan.items, &blossom.values, OverrideMode::OnlyExisting);

        Ok(())
    }

    fn process_if(&self, plan: &mut GrowthPlan, branch: &mut IfBranch) -> Result<(), SakuraError> {
        fill_value_item(&mut branch.left, &plan.items, self.templates())
            .map_err(|err| err.context("error processing if-condition"))?;
        fill_value_item(&mut branch.right, &plan.items, self.templates())
            .map_err(|err| err.context("error processing if-condition"))?;

        let left = branch.left.item.to_string();
        let right = branch.right.item.to_string();
        let matched = match branch.comparator {
            Comparator::Equal => left == right,
            Comparator::Unequal => left != right,
        };

        if matched {
            self.process_item(plan, &mut branch.then_body)
        } else {
            self.process_item(plan, &mut branch.else_body)
        }
    }

    fn process_for_each(
        &self,
        plan: &mut GrowthPlan,
        branch: &mut ForEachBranch,
    ) -> Result<(), SakuraError> {
        fill_value_item(&mut branch.iterate_array, &plan.items, self.templates())
            .map_err(|err| err.context("error processing for-each-loop"))?;

        let array = branch
            .iterate_array
            .item
            .as_array()
            .ok_or_else(|| {
                SakuraError::new(ErrorKind::TypeMismatch {
                    key: "iterate_array".to_string(),
                    expected: "array".to_string(),
                    got: branch.iterate_array.item.kind_name().to_string(),
                })
            })?
            .to_vec();

        let source = LoopSource::Array(array);
        if branch.parallel {
            plan.post_aggregation = branch.values.clone();
            self.spawn_parallel_subtrees_loop(plan, &branch.body, &branch.temp_var_name, source)
        } else {
            self.run_loop(
                plan,
                &branch.body,
                &branch.values,
                &branch.temp_var_name,
                source,
            )
        }
    }

    fn process_for(
        &self,
        plan: &mut GrowthPlan,
        branch: &mut ForBranch,
    ) -> Result<(), SakuraError> {
        fill_value_item(&mut branch.start, &plan.items, self.templates())
            .map_err(|err| err.context("error processing for-loop"))?;
        fill_value_item(&mut branch.end, &plan.items, self.templates())
            .map_err(|err| err.context("error processing for-loop"))?;

        let start = int_bound(&branch.start.item, "start")?;
        let end = int_bound(&branch.end.item, "end")?;

        let source = LoopSource::Range(start, end);
        if branch.parallel {
            plan.post_aggregation = branch.values.clone();
            self.spawn_parallel_subtrees_loop(plan, &branch.body, &branch.temp_var_name, source)
        } else {
            self.run_loop(
                plan,
                &branch.body,
                &branch.values,
                &branch.temp_var_name,
                source,
            )
        }
    }

    /// Serial loop: per iteration the body is deep-copied, executed, and
    /// discarded. The backup/restore pair keeps the loop variable and other
    /// loop-internal values from leaking into the parent scope.
    fn run_loop(
        &self,
        plan: &mut GrowthPlan,
        body: &SakuraItem,
        values: &ValueItemMap,
        temp_var_name: &str,
        source: LoopSource,
    ) -> Result<(), SakuraError> {
        let backup = plan.items.clone();
        override_items_with(&mut plan.items, values, OverrideMode::All);

        for index in 0..source.len() {
            plan.items
                .insert(temp_var_name.to_string(), source.binding(index));

            let mut body_copy = body.clone();
            self.process_item(plan, &mut body_copy)?;
        }

        let loop_scope = mem::replace(&mut plan.items, backup);
        override_items(&mut plan.items, &loop_scope, OverrideMode::OnlyExisting);
        Ok(())
    }

    /// Enqueue every branch of a parallel region as its own plan and block
    /// until all of them checked in. On success the child scopes merge back
    /// in enqueue order.
    pub(crate) fn spawn_parallel_subtrees(
        &self,
        plan: &mut GrowthPlan,
        branches: &[SakuraItem],
    ) -> Result<(), SakuraError> {
        debug!(count = branches.len(), "spawn parallel subtrees");

        let barrier = Arc::new(ActiveCounter::new(branches.len() as u32));
        plan.barrier = Some(barrier.clone());

        for branch in branches {
            let child = self.child_plan(plan, branch.clone(), plan.items.clone(), &barrier);
            plan.child_plans.push(child.clone());
            self.rt.queue.add_plan(child);
        }

        self.wait_until_finish(plan)?;

        let children = mem::take(&mut plan.child_plans);
        for child in &children {
            let child = child.lock();
            override_items(&mut plan.items, &child.items, OverrideMode::All);
        }
        plan.release_children();
        Ok(())
    }

    /// Parallel loop: one plan per iteration, each with a private copy of
    /// the pre-loop scope extended with the loop variable. After the
    /// barrier, the post-aggregation map is filled against each child scope
    /// and merged into the parent with `OnlyExisting`.
    fn spawn_parallel_subtrees_loop(
        &self,
        plan: &mut GrowthPlan,
        body: &SakuraItem,
        temp_var_name: &str,
        source: LoopSource,
    ) -> Result<(), SakuraError> {
        debug!(count = source.len(), "spawn parallel loop");

        let barrier = Arc::new(ActiveCounter::new(source.len() as u32));
        plan.barrier = Some(barrier.clone());

        for index in 0..source.len() {
            let mut items = plan.items.clone();
            items.insert(temp_var_name.to_string(), source.binding(index));

            let child = self.child_plan(plan, body.clone(), items, &barrier);
            plan.child_plans.push(child.clone());
            self.rt.queue.add_plan(child);
        }

        self.wait_until_finish(plan)?;

        let mut post_aggregation = mem::take(&mut plan.post_aggregation);
        let children = mem::take(&mut plan.child_plans);
        let mut first_error = None;
        for child in &children {
            let child = child.lock();
            let filled =
                fill_input_value_item_map(&mut post_aggregation, &child.items, self.templates());
            if let Err(err) = filled {
                first_error
                    .get_or_insert(err.context("error processing post-aggregation of for-loop"));
            }
        }

        override_items_with(&mut plan.items, &post_aggregation, OverrideMode::OnlyExisting);
        plan.release_children();

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn child_plan(
        &self,
        plan: &GrowthPlan,
        body: SakuraItem,
        items: sakura_core::DataMap,
        barrier: &Arc<ActiveCounter>,
    ) -> Arc<Mutex<GrowthPlan>> {
        let mut child = GrowthPlan::new(body, items, plan.context.clone());
        child.hierarchy = plan.hierarchy.clone();
        child.file_path = plan.file_path.clone();
        child.parent_counter = Some(barrier.clone());
        Arc::new(Mutex::new(child))
    }

    /// Barrier: poll the counter until every spawned child incremented it.
    /// A recorded child failure propagates status and error to this plan.
    fn wait_until_finish(&self, plan: &mut GrowthPlan) -> Result<(), SakuraError> {
        let Some(barrier) = plan.barrier.clone() else {
            return Ok(());
        };

        while !barrier.is_equal() {
            thread::sleep(POLL_INTERVAL);
        }

        if let Some((status, error)) = barrier.failure() {
            plan.status = status;
            plan.release_children();
            return Err(error);
        }
        Ok(())
    }
}

fn int_bound(item: &DataItem, key: &str) -> Result<i64, SakuraError> {
    item.as_int().ok_or_else(|| {
        SakuraError::new(ErrorKind::TypeMismatch {
            key: key.to_string(),
            expected: "int".to_string(),
            got: item.kind_name().to_string(),
        })
    })
}
