//! Fixed-size worker pool draining the subtree queue.
//!
//! Each worker loops: take a plan, execute its body against its scope,
//! report into the parent's counter, increment it as the very last step.
//! An empty queue means a 10 ms nap. Workers stop when the shutdown flag is
//! set; the pool joins them on drop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::engine::Engine;
use crate::queue::POLL_INTERVAL;
use crate::RuntimeInner;

pub(crate) struct ThreadPool {
    abort: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    pub fn new(worker_count: usize, rt: Arc<RuntimeInner>) -> Self {
        let abort = Arc::new(AtomicBool::new(false));
        let handles = (0..worker_count.max(1))
            .map(|index| {
                let rt = Arc::clone(&rt);
                let abort = Arc::clone(&abort);
                thread::Builder::new()
                    .name(format!("sakura-worker-{index}"))
                    .spawn(move || worker_loop(rt, abort))
                    .expect("failed to spawn sakura worker thread")
            })
            .collect();

        ThreadPool { abort, handles }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.abort.store(true, Ordering::Relaxed);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(rt: Arc<RuntimeInner>, abort: Arc<AtomicBool>) {
    debug!("worker started");

    while !abort.load(Ordering::Relaxed) {
        let Some(plan_arc) = rt.queue.next_plan() else {
            thread::sleep(POLL_INTERVAL);
            continue;
        };

        let mut plan = plan_arc.lock();
        let Some(mut body) = plan.body.take() else {
            continue;
        };

        let result = Engine::new(&rt).process_item(&mut plan, &mut body);
        plan.body = Some(body);

        let parent = plan.parent_counter.clone();
        if let Err(error) = result {
            plan.error = Some(error.clone());
            if let Some(parent) = &parent {
                parent.register_error(plan.status.clone(), error);
            }
        }

        drop(plan);
        if let Some(parent) = parent {
            // Increment last, so the spawner only observes fully finished
            // children.
            parent.increase();
        }
    }

    debug!("worker stopped");
}
