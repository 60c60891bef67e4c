// worker thread stuff
use super::panic_handler::isolate;
use crate::queue::{Task, TaskQueue};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub type WorkerId = usize;

// outcome counters shared by every worker of a pool
#[derive(Debug, Default)]
pub(crate) struct Counters {
    executed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

impl Counters {
    pub(crate) fn snapshot(&self) -> PoolStats {
        PoolStats {
            executed: self.executed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time task outcome counts for a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Tasks whose operation returned `Ok`.
    pub executed: u64,
    /// Tasks whose operation returned `Err`.
    pub failed: u64,
    /// Tasks whose operation panicked.
    pub panicked: u64,
}

impl PoolStats {
    pub fn total(&self) -> u64 {
        self.executed + self.failed + self.panicked
    }
}

// Marks the claimed task done however `execute_task` is left.
struct DoneGuard<'a>(&'a TaskQueue);

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.0.mark_done() {
            tracing::error!(error = %e, "queue accounting out of sync");
        }
    }
}

pub(crate) struct Worker {
    pub name: String,
    queue: TaskQueue,
    shutdown: Arc<AtomicBool>,
    counters: Arc<Counters>,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(
        name: String,
        queue: TaskQueue,
        shutdown: Arc<AtomicBool>,
        counters: Arc<Counters>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            name,
            queue,
            shutdown,
            counters,
            poll_interval,
        }
    }

    // main loop: only an empty poll with the flag set stops the worker, so
    // anything still queued at shutdown gets drained first
    pub fn run(&self) {
        tracing::debug!(worker = %self.name, "starting worker");

        loop {
            // read before the flag: a shutdown that lands after the check
            // still cuts the wait short
            let generation = self.queue.wake_generation();
            let next = if self.shutdown.load(Ordering::SeqCst) {
                self.queue.try_dequeue()
            } else {
                self.queue.dequeue_since(generation, self.poll_interval)
            };

            match next {
                Some(task) => self.execute_task(task),
                None => {
                    if self.shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                }
            }
        }

        tracing::debug!(worker = %self.name, "stopping worker");
    }

    fn execute_task(&self, task: Task) {
        let _done = DoneGuard(&self.queue);
        let id = task.id();
        let signature = task.signature().to_string();

        tracing::debug!(worker = %self.name, task = %id, "processing {}", signature);

        match isolate(|| task.execute(&self.queue)) {
            Ok(Ok(())) => {
                self.counters.executed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(err)) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    worker = %self.name,
                    task = %id,
                    error = %err,
                    "failed to process {}",
                    signature
                );
            }
            Err(panic) => {
                self.counters.panicked.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    worker = %self.name,
                    task = %id,
                    error = %panic,
                    "failed to process {}",
                    signature
                );
            }
        }
    }
}
