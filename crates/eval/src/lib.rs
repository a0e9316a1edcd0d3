//! Sakura tree execution engine -- registers trees and blossom handlers,
//! validates them, and runs them over a worker pool.
//!
//! The host registers blossom handlers and loads trees, resources,
//! templates, and files into the garden, then calls
//! [`SakuraRuntime::trigger_tree`]. The request is wrapped in a root growth
//! plan and handed to the queue; workers walk the IR, parallel regions
//! spawn child plans and converge on a shared counter, and resolved output
//! values merge back into the caller's result map.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use sakura_core::{
    check_input, check_items, override_items, override_items_with, tree_from_interchange,
    BasicTemplate, ErrorSite, OverrideMode, SakuraItem, SequentialPart, TemplateEngine, TreeItem,
};

pub mod blossom;
pub mod garden;

mod engine;
mod plan;
mod pool;
mod queue;
mod runtime_check;
mod validate;

pub use blossom::{Blossom, BlossomIO, BlossomStatus};
pub use garden::SakuraGarden;
pub use sakura_core::{
    BlossomSchema, DataItem, DataMap, ErrorKind, FieldType, IoType, SakuraError, ValueItem,
    ValueItemMap,
};

use blossom::grow_blossom;
use engine::Engine;
use plan::GrowthPlan;
use pool::ThreadPool;
use queue::SubtreeQueue;
use validate::Validator;

/// Handlers by group, then by name.
pub(crate) type BlossomRegistry = BTreeMap<String, BTreeMap<String, Arc<dyn Blossom>>>;

/// State shared between the host-facing API and the worker threads.
pub(crate) struct RuntimeInner {
    pub(crate) garden: RwLock<SakuraGarden>,
    pub(crate) blossoms: RwLock<BlossomRegistry>,
    pub(crate) queue: SubtreeQueue,
    pub(crate) templates: Box<dyn TemplateEngine>,
}

impl RuntimeInner {
    pub(crate) fn get_blossom(&self, group: &str, name: &str) -> Option<Arc<dyn Blossom>> {
        self.blossoms.read().get(group)?.get(name).cloned()
    }
}

/// A failed `trigger_*` call: the status surfaced from the failing blossom
/// (host-defined codes, preserved verbatim) plus the error itself.
#[derive(Debug)]
pub struct RunError {
    pub status: BlossomStatus,
    pub error: SakuraError,
}

impl RunError {
    fn from_error(error: SakuraError) -> Self {
        RunError {
            status: BlossomStatus::default(),
            error,
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for RunError {}

/// The central runtime: garden, handler registry, queue, and worker pool.
pub struct SakuraRuntime {
    inner: Arc<RuntimeInner>,
    _pool: ThreadPool,
}

impl Default for SakuraRuntime {
    fn default() -> Self {
        SakuraRuntime::new(num_cpus::get())
    }
}

impl SakuraRuntime {
    /// Runtime with `worker_count` worker threads and the built-in template
    /// engine.
    pub fn new(worker_count: usize) -> Self {
        SakuraRuntime::with_template_engine(worker_count, Box::new(BasicTemplate))
    }

    /// Runtime with a host-provided template engine.
    pub fn with_template_engine(worker_count: usize, templates: Box<dyn TemplateEngine>) -> Self {
        let inner = Arc::new(RuntimeInner {
            garden: RwLock::new(SakuraGarden::new()),
            blossoms: RwLock::new(BlossomRegistry::new()),
            queue: SubtreeQueue::new(),
            templates,
        });
        let pool = ThreadPool::new(worker_count, Arc::clone(&inner));
        SakuraRuntime {
            inner,
            _pool: pool,
        }
    }

    // ── Blossom registration ─────────────────────────────────────────────

    /// Register a handler under `(group, name)`. Fails on duplicates.
    pub fn add_blossom(&self, group: &str, name: &str, handler: Arc<dyn Blossom>) -> bool {
        let mut registry = self.inner.blossoms.write();
        let group_map = registry.entry(group.to_string()).or_default();
        if group_map.contains_key(name) {
            return false;
        }
        debug!(group, name, "register blossom");
        group_map.insert(name.to_string(), handler);
        true
    }

    pub fn does_blossom_exist(&self, group: &str, name: &str) -> bool {
        self.inner.get_blossom(group, name).is_some()
    }

    pub fn get_blossom(&self, group: &str, name: &str) -> Option<Arc<dyn Blossom>> {
        self.inner.get_blossom(group, name)
    }

    // ── Garden registration ──────────────────────────────────────────────

    /// Parse interchange text, validate it, and insert the tree. An empty
    /// `id` falls back to the tree's declared id.
    pub fn add_tree(&self, id: &str, content: &str) -> Result<(), SakuraError> {
        let tree = tree_from_interchange(content)?;
        self.validate_tree(&tree)?;

        let id = if id.is_empty() { tree.id.clone() } else { id.to_string() };
        debug!(tree = %id, "register tree");
        let mut garden = self.inner.garden.write();
        if !garden.add_tree(id.clone(), tree) {
            return Err(SakuraError::new(ErrorKind::DuplicateId { id }));
        }
        Ok(())
    }

    /// Like [`add_tree`](Self::add_tree), but the tree becomes a resource:
    /// an inline tree invoked by name from blossom groups.
    pub fn add_resource(&self, id: &str, content: &str) -> Result<(), SakuraError> {
        let resource = tree_from_interchange(content)?;
        self.validate_tree(&resource)?;

        let id = if id.is_empty() {
            resource.id.clone()
        } else {
            id.to_string()
        };
        debug!(resource = %id, "register resource");
        let mut garden = self.inner.garden.write();
        if !garden.add_resource(id.clone(), resource) {
            return Err(SakuraError::new(ErrorKind::DuplicateId { id }));
        }
        Ok(())
    }

    pub fn add_template(&self, id: &str, content: &str) -> bool {
        self.inner.garden.write().add_template(id, content)
    }

    pub fn get_template(&self, id: &str) -> Option<String> {
        self.inner.garden.read().get_template(id).cloned()
    }

    pub fn add_file(&self, id: &str, data: Vec<u8>) -> bool {
        self.inner.garden.write().add_file(id, data)
    }

    pub fn get_file(&self, id: &str) -> Option<Vec<u8>> {
        self.inner.garden.read().get_file(id).cloned()
    }

    /// Re-validate every registered tree, e.g. after late blossom
    /// registration.
    pub fn validate_all(&self) -> Result<(), SakuraError> {
        let garden = self.inner.garden.read();
        let blossoms = self.inner.blossoms.read();
        let validator = Validator::new(&garden, &blossoms);
        for (_, tree) in garden.trees() {
            validator.check_item(&tree.body, &tree.file_path())?;
        }
        Ok(())
    }

    // ── Execution ────────────────────────────────────────────────────────

    /// Run a registered tree to completion and return its final scope.
    pub fn trigger_tree(
        &self,
        id: &str,
        initial_values: DataMap,
        context: DataMap,
    ) -> Result<DataMap, RunError> {
        debug!(tree = %id, "trigger tree");

        let tree = self
            .inner
            .garden
            .read()
            .get_tree(id)
            .cloned()
            .ok_or_else(|| {
                RunError::from_error(SakuraError::new(ErrorKind::MissingSubtree {
                    name: id.to_string(),
                }))
            })?;

        let mut plan = GrowthPlan::new(
            SakuraItem::Sequential(SequentialPart::default()),
            initial_values,
            context,
        );
        override_items_with(&mut plan.items, &tree.values, OverrideMode::OnlyNonExisting);

        match self.run_process(&mut plan, tree) {
            Ok(()) => Ok(plan.items),
            Err(error) => Err(RunError {
                status: plan.status.clone(),
                error,
            }),
        }
    }

    /// Invoke a single registered blossom directly.
    pub fn trigger_blossom(
        &self,
        name: &str,
        group: &str,
        initial_values: DataMap,
        context: DataMap,
    ) -> Result<DataMap, RunError> {
        debug!(group, name, "trigger blossom");

        let handler = self.inner.get_blossom(group, name).ok_or_else(|| {
            RunError::from_error(SakuraError::new(ErrorKind::UnknownBlossom {
                group: group.to_string(),
                name: name.to_string(),
            }))
        })?;
        let schema = handler.schema();

        let mut io = BlossomIO {
            blossom_path: name.to_string(),
            name_hierarchy: vec![format!("BLOSSOM: {name}")],
            parent_values: initial_values.clone(),
            input: initial_values.clone(),
            ..BlossomIO::default()
        };

        runtime_check::check_unknown_keys(schema, &io.input).map_err(RunError::from_error)?;
        runtime_check::check_blossom_values(schema, &mut io.input).map_err(RunError::from_error)?;

        let site = ErrorSite {
            location: "trigger blossom".to_string(),
            blossom_type: name.to_string(),
            blossom_group_type: group.to_string(),
            blossom_name: name.to_string(),
            ..ErrorSite::default()
        };
        let mut status = BlossomStatus::default();
        grow_blossom(handler.as_ref(), &mut io, &context, &mut status, &site)
            .map_err(|error| RunError { status, error })?;

        io.output.retain(|key, _| schema.has_output(key));
        let mut result = initial_values;
        override_items(&mut result, &io.output, OverrideMode::OnlyExisting);
        Ok(result)
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn validate_tree(&self, tree: &TreeItem) -> Result<(), SakuraError> {
        let garden = self.inner.garden.read();
        let blossoms = self.inner.blossoms.read();
        Validator::new(&garden, &blossoms).check_item(&tree.body, &tree.file_path())
    }

    /// Gate the initial values against the tree's declared parameters, then
    /// spawn the root plan and block until the barrier releases.
    fn run_process(&self, plan: &mut GrowthPlan, tree: TreeItem) -> Result<(), SakuraError> {
        let undeclared = check_input(&tree.values, &plan.items);
        if let Some(key) = undeclared.first() {
            let mut error = SakuraError::new(ErrorKind::UnknownKey { key: key.clone() });
            error.add_message(format!(
                "the following initial values are not declared by the tree: {}",
                undeclared.join(", ")
            ));
            return Err(error);
        }

        // Declared parameters still at the uninitialised marker were neither
        // provided nor defaulted.
        if let Some(key) = check_items(&plan.items).into_iter().next() {
            return Err(SakuraError::new(ErrorKind::MissingKey { key }));
        }

        Engine::new(&self.inner).spawn_parallel_subtrees(plan, &[SakuraItem::Tree(tree)])
    }
}
