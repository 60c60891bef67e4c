//! Task execution infrastructure.
//!
//! This module provides the worker threads and the pool that owns them.

pub(crate) mod panic_handler;
pub mod pool;
pub mod worker;

pub use pool::{scope, WorkerPool};
pub use worker::{PoolStats, WorkerId};
