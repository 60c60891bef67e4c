use super::worker::{Counters, PoolStats, Worker, WorkerId};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::queue::TaskQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A fixed set of worker threads draining one [`TaskQueue`].
///
/// The usual lifecycle is start, enqueue the initial tasks, wait for the
/// queue to drain, then stop the workers. [`close`](WorkerPool::close) does
/// the last two steps in that order, and dropping the pool calls it if it has
/// not run yet, so the workers are reclaimed even when the caller bails out
/// early or panics.
///
/// A pool cannot be restarted once shut down; start a new one instead.
pub struct WorkerPool {
    queue: TaskQueue,
    workers: Vec<WorkerHandle>,
    shutdown: Arc<AtomicBool>,
    counters: Arc<Counters>,
    num_threads: usize,
    closed: bool,
}

struct WorkerHandle {
    id: WorkerId,
    name: String,
    thread: Option<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn the configured number of workers.
    ///
    /// If any thread fails to spawn, the ones already running are stopped
    /// and joined before the error is returned.
    pub fn start(config: &Config) -> Result<Self> {
        config.validate()?;

        let num_threads = config.worker_threads();
        let mut pool = Self {
            queue: TaskQueue::new(),
            workers: Vec::with_capacity(num_threads),
            shutdown: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
            num_threads,
            closed: false,
        };

        for id in 0..num_threads {
            let name = format!("{}-{}", config.thread_name_prefix, id);
            let worker = Worker::new(
                name.clone(),
                pool.queue.clone(),
                pool.shutdown.clone(),
                pool.counters.clone(),
                config.poll_interval,
            );

            let mut builder = thread::Builder::new().name(name.clone());
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            match builder.spawn(move || worker.run()) {
                Ok(thread) => pool.workers.push(WorkerHandle {
                    id,
                    name,
                    thread: Some(thread),
                }),
                Err(e) => {
                    tracing::error!(worker = %name, error = %e, "failed to spawn worker");
                    pool.closed = true;
                    pool.shutdown();
                    if let Err(join_err) = pool.join_workers() {
                        tracing::error!(error = %join_err, "spawned workers did not stop cleanly");
                    }
                    return Err(Error::Spawn(e));
                }
            }
        }

        tracing::debug!(num_threads, "worker pool started");
        Ok(pool)
    }

    /// Handle for enqueueing work. Clone it to hand it to other threads.
    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Ask the workers to stop once the queue is empty.
    ///
    /// Does not wait and does not interrupt a running task. Workers still
    /// finish whatever is pending before they exit. Calling it again is a
    /// no-op.
    pub fn shutdown(&self) {
        if !self.shutdown.swap(true, Ordering::SeqCst) {
            tracing::debug!("worker pool shutting down");
        }

        // idle workers return from dequeue right away and see the flag
        self.queue.wake_all();
    }

    /// Wait for every worker thread to exit.
    ///
    /// Only returns once [`shutdown`](WorkerPool::shutdown) has been called
    /// and the queue is empty. Reports the first worker that died by panic.
    /// Afterwards the pool counts as closed: nothing is left to drain the
    /// queue, so [`close`](WorkerPool::close) no longer waits on it.
    pub fn join_workers(&mut self) -> Result<()> {
        let mut first_err = None;
        self.closed = true;

        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    tracing::error!(worker = %worker.name, id = worker.id, "worker thread panicked");
                    first_err.get_or_insert_with(|| Error::WorkerPanic(worker.name.clone()));
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Wait for the queue to drain, then stop and join the workers.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            let orphaned = self.queue.in_flight();
            if orphaned > 0 {
                tracing::error!(orphaned, "tasks enqueued after the workers stopped will never run");
            }
            return Ok(());
        }
        self.closed = true;

        self.queue.join();
        self.shutdown();
        self.join_workers()?;

        tracing::debug!(stats = ?self.stats(), "worker pool stopped");
        Ok(())
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_threads", &self.num_threads)
            .field("shutdown", &self.is_shutdown())
            .field("queue", &self.queue)
            .finish()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(error = %e, "worker pool did not close cleanly");
        }
    }
}

/// Run `f` against a freshly started pool and close the pool afterwards.
///
/// Returns once every task, including the ones scheduled by other tasks,
/// has finished and the workers have exited.
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use threadqueue::{Config, TaskQueue};
///
/// let hits = Arc::new(AtomicUsize::new(0));
/// let config = Config::builder().num_threads(2).build().unwrap();
///
/// threadqueue::scope(&config, |queue| {
///     let hits = hits.clone();
///     queue.spawn("parent", move |q: &TaskQueue| {
///         for _ in 0..3 {
///             let hits = hits.clone();
///             q.spawn("child", move |_: &TaskQueue| {
///                 hits.fetch_add(1, Ordering::SeqCst);
///                 Ok(())
///             });
///         }
///         Ok(())
///     });
/// })
/// .unwrap();
///
/// assert_eq!(hits.load(Ordering::SeqCst), 3);
/// ```
pub fn scope<F, R>(config: &Config, f: F) -> Result<R>
where
    F: FnOnce(&TaskQueue) -> R,
{
    let mut pool = WorkerPool::start(config)?;
    let result = f(pool.queue());
    pool.close()?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::TaskResult;
    use std::time::{Duration, Instant};

    fn config(threads: usize) -> Config {
        Config::builder()
            .num_threads(threads)
            .thread_name_prefix("pool-test")
            .build()
            .unwrap()
    }

    #[test]
    fn test_start_spawns_requested_threads() {
        let pool = WorkerPool::start(&config(3)).unwrap();
        assert_eq!(pool.num_threads(), 3);
        assert_eq!(pool.workers.len(), 3);
        assert!(!pool.is_shutdown());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut bad = Config::default();
        bad.num_threads = Some(0);
        assert!(matches!(WorkerPool::start(&bad), Err(Error::Config(_))));
    }

    #[test]
    fn test_shutdown_is_monotonic() {
        let mut pool = WorkerPool::start(&config(2)).unwrap();
        pool.shutdown();
        pool.shutdown();
        assert!(pool.is_shutdown());
        pool.join_workers().unwrap();
    }

    #[test]
    fn test_shutdown_wakes_idle_workers() {
        let cfg = Config::builder()
            .num_threads(4)
            .poll_interval(Duration::from_secs(1))
            .build()
            .unwrap();
        let mut pool = WorkerPool::start(&cfg).unwrap();

        pool.queue().join();
        let start = Instant::now();
        pool.shutdown();
        pool.join_workers().unwrap();

        assert!(start.elapsed() < Duration::from_millis(1100));
    }

    #[test]
    fn test_close_runs_pending_work() {
        let mut pool = WorkerPool::start(&config(2)).unwrap();
        for _ in 0..10 {
            pool.queue()
                .spawn("work", |_: &TaskQueue| -> TaskResult { Ok(()) });
        }

        pool.close().unwrap();
        assert_eq!(pool.stats().executed, 10);
        assert!(pool.is_shutdown());

        // second close is a no-op
        pool.close().unwrap();
    }

    #[test]
    fn test_drop_closes_pool() {
        let queue = {
            let pool = WorkerPool::start(&config(2)).unwrap();
            pool.queue()
                .spawn("work", |_: &TaskQueue| -> TaskResult { Ok(()) });
            pool.queue().clone()
        };

        assert!(queue.is_drained());
    }

    #[test]
    fn test_drop_after_workers_joined_does_not_wait_on_late_tasks() {
        let (tx, rx) = std::sync::mpsc::channel();

        thread::spawn(move || {
            let mut pool = WorkerPool::start(&config(2)).unwrap();
            pool.shutdown();
            pool.join_workers().unwrap();

            pool.queue()
                .spawn("late", |_: &TaskQueue| -> TaskResult { Ok(()) });
            let queue = pool.queue().clone();
            drop(pool);

            let _ = tx.send(queue.in_flight());
        });

        let orphaned = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("dropping the pool hung");
        assert_eq!(orphaned, 1);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_spawn_failure_is_reported() {
        let cfg = Config::builder()
            .num_threads(3)
            .stack_size(1 << 46)
            .build()
            .unwrap();

        let start = Instant::now();
        let result = WorkerPool::start(&cfg);

        assert!(matches!(result, Err(Error::Spawn(_))));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_scope_returns_closure_value() {
        let value = scope(&config(1), |queue| {
            queue.spawn("work", |_: &TaskQueue| -> TaskResult { Ok(()) });
            7
        })
        .unwrap();

        assert_eq!(value, 7);
    }
}
