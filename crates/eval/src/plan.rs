//! Per-invocation execution state.
//!
//! A `GrowthPlan` carries everything one invocation needs: the owned copy
//! of the subtree to run, its variable scope, the read-only context, status
//! and error, the breadcrumb hierarchy, and the links to its spawned
//! children. An `ActiveCounter` is the convergence barrier shared between a
//! parent and the children it put on the queue.

use std::sync::Arc;

use parking_lot::Mutex;
use sakura_core::{DataMap, SakuraError, SakuraItem, ValueItemMap};

use crate::blossom::BlossomStatus;

#[derive(Debug, Default)]
struct CounterState {
    is: u32,
    expected: u32,
    failed: bool,
    error: Option<SakuraError>,
    status: BlossomStatus,
}

/// Thread-safe counter increased once per finished child. The spawning
/// plan polls it until every child has checked in.
#[derive(Debug)]
pub struct ActiveCounter {
    state: Mutex<CounterState>,
}

impl ActiveCounter {
    pub fn new(expected: u32) -> Self {
        ActiveCounter {
            state: Mutex::new(CounterState {
                expected,
                ..CounterState::default()
            }),
        }
    }

    /// Increase the counter. Called as the last step of a child, so the
    /// spawner can rely on the child being completely done.
    pub fn increase(&self) {
        self.state.lock().is += 1;
    }

    /// True once every expected child has checked in.
    pub fn is_equal(&self) -> bool {
        let state = self.state.lock();
        state.is == state.expected
    }

    /// Record a child failure. The first error wins; later ones only flip
    /// nothing.
    pub fn register_error(&self, status: BlossomStatus, error: SakuraError) {
        let mut state = self.state.lock();
        if !state.failed {
            state.failed = true;
            state.status = status;
            state.error = Some(error);
        }
    }

    /// False as soon as any child registered an error. Checked by siblings
    /// at every node dispatch to short-circuit.
    pub fn succeeded(&self) -> bool {
        !self.state.lock().failed
    }

    /// The recorded failure, if any.
    pub fn failure(&self) -> Option<(BlossomStatus, SakuraError)> {
        let state = self.state.lock();
        state
            .error
            .as_ref()
            .map(|error| (state.status.clone(), error.clone()))
    }
}

/// Execution context of one invocation.
pub struct GrowthPlan {
    /// Subtree to run; taken by the worker for the duration of execution.
    pub body: Option<SakuraItem>,
    /// Variable scope.
    pub items: DataMap,
    /// Read-only values visible to every blossom of the invocation.
    pub context: DataMap,
    pub status: BlossomStatus,
    pub error: Option<SakuraError>,
    /// Barrier of the plan that spawned this one.
    pub parent_counter: Option<Arc<ActiveCounter>>,
    /// Barrier for the children this plan spawned last.
    pub barrier: Option<Arc<ActiveCounter>>,
    /// Human breadcrumb of the call hierarchy.
    pub hierarchy: Vec<String>,
    /// File the currently executed tree was loaded from.
    pub file_path: String,
    /// Children of the last spawned parallel region.
    pub child_plans: Vec<Arc<Mutex<GrowthPlan>>>,
    /// Outputs to aggregate after a parallel loop.
    pub post_aggregation: ValueItemMap,
}

impl GrowthPlan {
    pub fn new(body: SakuraItem, items: DataMap, context: DataMap) -> Self {
        GrowthPlan {
            body: Some(body),
            items,
            context,
            status: BlossomStatus::default(),
            error: None,
            parent_counter: None,
            barrier: None,
            hierarchy: Vec::new(),
            file_path: String::new(),
            child_plans: Vec::new(),
            post_aggregation: ValueItemMap::new(),
        }
    }

    /// Drop the spawned children once the parent has read their results.
    pub fn release_children(&mut self) {
        self.child_plans.clear();
        self.barrier = None;
    }
}
