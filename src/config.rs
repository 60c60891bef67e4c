use crate::error::{Error, Result};
use std::time::Duration;

/// Upper bound on the heuristic thread count, to avoid overloading whatever
/// remote server the tasks talk to.
pub const DEFAULT_MAX_THREADS: usize = 8;

const MAX_EXPLICIT_THREADS: usize = 1024;

#[derive(Debug, Clone)]
pub struct Config {
    /// Explicit worker count. Overrides the multiplier heuristic.
    pub num_threads: Option<usize>,
    /// Workers per CPU. Zero means single-threaded.
    pub thread_multiplier: usize,
    pub max_threads: usize,
    /// How long an idle worker blocks on the queue before re-checking shutdown.
    pub poll_interval: Duration,
    pub stack_size: Option<usize>,
    pub thread_name_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: None,
            thread_multiplier: 2,
            max_threads: DEFAULT_MAX_THREADS,
            poll_interval: Duration::from_secs(1),
            stack_size: None,
            thread_name_prefix: "threadqueue-worker".to_string(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_threads {
            if n == 0 {
                return Err(Error::config("num_threads must be > 0"));
            }
            if n > MAX_EXPLICIT_THREADS {
                return Err(Error::config("num_threads too large (max 1024)"));
            }
        }

        if self.max_threads == 0 {
            return Err(Error::config("max_threads must be > 0"));
        }

        if self.poll_interval.is_zero() {
            return Err(Error::config("poll_interval must be non-zero"));
        }

        Ok(())
    }

    pub fn worker_threads(&self) -> usize {
        match self.num_threads {
            Some(n) => n,
            None => self.heuristic_threads(num_cpus::get()),
        }
    }

    fn heuristic_threads(&self, cpus: usize) -> usize {
        cpus.saturating_mul(self.thread_multiplier)
            .max(1)
            .min(self.max_threads)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    pub fn thread_multiplier(mut self, multiplier: usize) -> Self {
        self.config.thread_multiplier = multiplier;
        self
    }

    pub fn max_threads(mut self, max: usize) -> Self {
        self.config.max_threads = max;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
