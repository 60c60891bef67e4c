//! threadqueue - a bounded worker pool draining a shared task queue
//!
//! A fixed number of OS threads pull tasks from one FIFO queue. A task is an
//! operation with its arguments already bound; when it runs it receives the
//! queue handle, so it can schedule follow-up work before it completes.
//! [`TaskQueue::join`] waits for all of it, transitively scheduled tasks
//! included.
//!
//! # Quick Start
//!
//! ```no_run
//! use threadqueue::prelude::*;
//!
//! fn list_dir(queue: &TaskQueue, dir: std::path::PathBuf) -> TaskResult {
//!     for entry in std::fs::read_dir(&dir)? {
//!         let path = entry?.path();
//!         if path.is_dir() {
//!             let child = path.clone();
//!             queue.enqueue(
//!                 Task::new("list_dir", move |q: &TaskQueue| list_dir(q, child)).arg(&path),
//!             );
//!         }
//!     }
//!     Ok(())
//! }
//!
//! let config = Config::default();
//! threadqueue::scope(&config, |queue| {
//!     queue.spawn("list_dir", |q: &TaskQueue| list_dir(q, ".".into()));
//! })
//! .unwrap();
//! ```
//!
//! # Behavior
//!
//! - **FIFO claiming**: tasks are handed out in enqueue order; completion
//!   order across workers is unspecified.
//! - **Fault isolation**: a task that returns `Err` or panics is logged
//!   through `tracing` and counted, never retried, and never takes its
//!   worker down.
//! - **Cooperative shutdown**: workers poll with a bounded timeout and stop
//!   only after an empty poll with the shutdown flag set.

#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod queue;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use executor::{scope, PoolStats, WorkerPool};
pub use queue::{Signature, Task, TaskError, TaskId, TaskQueue, TaskResult};

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_single_worker_runs_in_order() {
        let config = Config::builder().num_threads(1).build().unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        scope(&config, |queue| {
            for name in ["a", "b", "c"] {
                let order = order.clone();
                queue.spawn(name, move |_: &TaskQueue| {
                    order.lock().push(name);
                    Ok(())
                });
            }
        })
        .unwrap();

        assert_eq!(*order.lock(), ["a", "b", "c"]);
    }
}
