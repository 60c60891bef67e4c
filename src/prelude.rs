pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::executor::{scope, PoolStats, WorkerPool};
pub use crate::queue::{Task, TaskError, TaskQueue, TaskResult};
