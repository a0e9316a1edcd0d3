//! FIFO of growth plans drained by the worker pool.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::plan::GrowthPlan;

/// Poll cadence of idle workers and of barrier waits.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Default)]
pub struct SubtreeQueue {
    queue: Mutex<VecDeque<Arc<Mutex<GrowthPlan>>>>,
}

impl SubtreeQueue {
    pub fn new() -> Self {
        SubtreeQueue::default()
    }

    /// Append a plan for the workers.
    pub fn add_plan(&self, plan: Arc<Mutex<GrowthPlan>>) {
        self.queue.lock().push_back(plan);
    }

    /// Take the oldest queued plan, if any.
    pub fn next_plan(&self) -> Option<Arc<Mutex<GrowthPlan>>> {
        self.queue.lock().pop_front()
    }
}
