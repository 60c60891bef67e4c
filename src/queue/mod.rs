//! The shared task queue and the task record it holds.

pub mod task;
pub mod task_queue;

pub use task::{Signature, Task, TaskError, TaskId, TaskResult};
pub use task_queue::TaskQueue;
