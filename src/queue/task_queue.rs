use super::task::{Task, TaskResult};
use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

// The pending sequence and the in-flight counter live under one lock so that
// enqueue, dequeue and mark_done can never interleave into a lost update.
struct State {
    pending: VecDeque<Task>,
    in_flight: usize,
    // Bumped by `wake_all` so blocked dequeuers return early.
    generation: u64,
}

struct Shared {
    state: Mutex<State>,
    available: Condvar,
    drained: Condvar,
}

/// Unbounded FIFO of pending tasks with a join-until-drained primitive.
///
/// Handles are cheap to clone and all point at the same queue. A task counts
/// as in flight from the moment it is enqueued until someone calls
/// [`mark_done`](TaskQueue::mark_done) for it, which is what lets
/// [`join`](TaskQueue::join) wait for transitively scheduled work: a running
/// task enqueues its children before its own completion is recorded.
#[derive(Clone)]
pub struct TaskQueue {
    shared: Arc<Shared>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    pending: VecDeque::new(),
                    in_flight: 0,
                    generation: 0,
                }),
                available: Condvar::new(),
                drained: Condvar::new(),
            }),
        }
    }

    /// Append a task to the tail of the queue. Never blocks.
    pub fn enqueue(&self, task: Task) {
        {
            let mut state = self.shared.state.lock();
            state.in_flight += 1;
            state.pending.push_back(task);
        }
        self.shared.available.notify_one();
    }

    /// Shorthand for enqueueing an operation that takes no recorded arguments.
    pub fn spawn<F>(&self, name: impl Into<Cow<'static, str>>, op: F)
    where
        F: FnOnce(&TaskQueue) -> TaskResult + Send + 'static,
    {
        self.enqueue(Task::new(name, op));
    }

    /// Take the oldest pending task, waiting up to `timeout` for one to show up.
    ///
    /// `None` means nothing arrived in time, or that the waiters were woken by
    /// [`wake_all`](TaskQueue::wake_all). It is a polling signal, not an error.
    pub fn dequeue(&self, timeout: Duration) -> Option<Task> {
        let generation = self.wake_generation();
        self.dequeue_since(generation, timeout)
    }

    pub(crate) fn wake_generation(&self) -> u64 {
        self.shared.state.lock().generation
    }

    // Returns `None` early if `wake_all` ran at any point after `generation`
    // was read, even before this call took the lock.
    pub(crate) fn dequeue_since(&self, generation: u64, timeout: Duration) -> Option<Task> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.shared.state.lock();

        loop {
            if let Some(task) = state.pending.pop_front() {
                return Some(task);
            }
            if state.generation != generation {
                return None;
            }

            match deadline {
                Some(deadline) => {
                    if self
                        .shared
                        .available
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        return state.pending.pop_front();
                    }
                }
                None => self.shared.available.wait(&mut state),
            }
        }
    }

    /// Take the oldest pending task without waiting.
    pub fn try_dequeue(&self) -> Option<Task> {
        self.shared.state.lock().pending.pop_front()
    }

    /// Record that one claimed task has finished, successfully or not.
    pub fn mark_done(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.in_flight = state
            .in_flight
            .checked_sub(1)
            .ok_or(Error::MarkDoneUnderflow)?;

        if state.in_flight == 0 {
            self.shared.drained.notify_all();
        }
        Ok(())
    }

    /// Block until every enqueued task has been marked done.
    pub fn join(&self) {
        let mut state = self.shared.state.lock();
        while state.in_flight > 0 {
            self.shared.drained.wait(&mut state);
        }
    }

    /// Like [`join`](TaskQueue::join) but gives up after `timeout`.
    /// Returns whether the queue drained.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.join();
            return true;
        };

        let mut state = self.shared.state.lock();
        while state.in_flight > 0 {
            if self
                .shared
                .drained
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.in_flight == 0;
            }
        }
        true
    }

    /// Wake every thread blocked in [`dequeue`](TaskQueue::dequeue).
    pub fn wake_all(&self) {
        self.shared.state.lock().generation += 1;
        self.shared.available.notify_all();
    }

    /// Tasks waiting to be claimed.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Tasks enqueued but not yet marked done, including claimed ones.
    pub fn in_flight(&self) -> usize {
        self.shared.state.lock().in_flight
    }

    pub fn is_drained(&self) -> bool {
        self.in_flight() == 0
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("TaskQueue")
            .field("pending", &state.pending.len())
            .field("in_flight", &state.in_flight)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn noop(_: &TaskQueue) -> TaskResult {
        Ok(())
    }

    #[test]
    fn test_fifo_order() {
        let queue = TaskQueue::new();
        queue.spawn("a", noop);
        queue.spawn("b", noop);
        queue.spawn("c", noop);

        let names: Vec<String> = (0..3)
            .map(|_| {
                let task = queue.dequeue(Duration::from_millis(10)).unwrap();
                task.signature().name().to_string()
            })
            .collect();

        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.in_flight(), 3);
    }

    #[test]
    fn test_try_dequeue_does_not_block() {
        let queue = TaskQueue::new();
        assert!(queue.try_dequeue().is_none());

        queue.spawn("ready", noop);
        assert_eq!(queue.try_dequeue().unwrap().signature().name(), "ready");
    }

    #[test]
    fn test_dequeue_times_out() {
        let queue = TaskQueue::new();
        let start = Instant::now();

        assert!(queue.dequeue(Duration::from_millis(50)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_dequeue_wakes_on_enqueue() {
        let queue = TaskQueue::new();
        let producer = queue.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.spawn("late", noop);
        });

        let task = queue.dequeue(Duration::from_secs(5));
        assert_eq!(task.unwrap().signature().name(), "late");
        handle.join().unwrap();
    }

    #[test]
    fn test_wake_all_interrupts_dequeue() {
        let queue = TaskQueue::new();
        let waiter = queue.clone();

        let handle = thread::spawn(move || {
            let start = Instant::now();
            let task = waiter.dequeue(Duration::from_secs(30));
            (task.is_none(), start.elapsed())
        });

        thread::sleep(Duration::from_millis(50));
        queue.wake_all();

        let (empty, elapsed) = handle.join().unwrap();
        assert!(empty);
        assert!(elapsed < Duration::from_secs(30));
    }

    #[test]
    fn test_stale_generation_returns_immediately() {
        let queue = TaskQueue::new();
        let generation = queue.wake_generation();
        queue.wake_all();

        let start = Instant::now();
        assert!(queue
            .dequeue_since(generation, Duration::from_secs(30))
            .is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_mark_done_underflow() {
        let queue = TaskQueue::new();
        assert!(matches!(queue.mark_done(), Err(Error::MarkDoneUnderflow)));

        queue.spawn("one", noop);
        assert!(queue.mark_done().is_ok());
        assert!(matches!(queue.mark_done(), Err(Error::MarkDoneUnderflow)));
        assert_eq!(queue.in_flight(), 0);
    }

    #[test]
    fn test_join_waits_for_mark_done() {
        let queue = TaskQueue::new();
        queue.spawn("work", noop);

        let finished = Arc::new(AtomicBool::new(false));
        let worker = {
            let queue = queue.clone();
            let finished = finished.clone();
            thread::spawn(move || {
                let task = queue.dequeue(Duration::from_secs(1)).unwrap();
                thread::sleep(Duration::from_millis(50));
                task.execute(&queue).unwrap();
                finished.store(true, Ordering::SeqCst);
                queue.mark_done().unwrap();
            })
        };

        queue.join();
        assert!(finished.load(Ordering::SeqCst));
        assert!(queue.is_drained());
        worker.join().unwrap();
    }

    #[test]
    fn test_join_on_empty_queue_returns() {
        let queue = TaskQueue::new();
        queue.join();
        assert!(queue.join_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn test_join_timeout_expires() {
        let queue = TaskQueue::new();
        queue.spawn("never_done", noop);

        assert!(!queue.join_timeout(Duration::from_millis(30)));
        assert_eq!(queue.in_flight(), 1);
    }
}
