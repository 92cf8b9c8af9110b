//! Pool sizing and worker configuration.

use std::time::Duration;

use crate::error::ConfigError;

/// Default number of consecutive task failures before a worker is replaced.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 8;

/// Default prefix for worker thread names.
pub const DEFAULT_THREAD_NAME: &str = "surgekit-worker";

/// Configuration for an elastic [`Pool`](crate::pool::Pool).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use surgekit::pool::PoolConfig;
///
/// let config = PoolConfig::new(2, 8, 64, Duration::from_secs(30))
///     .failure_threshold(3)
///     .thread_name("ingest");
/// assert!(config.validate().is_ok());
/// assert_eq!(config.failure_threshold, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfig {
    /// Workers kept alive even when idle.
    pub min_workers: usize,
    /// Hard ceiling on live workers.
    pub max_workers: usize,
    /// Bound on tasks waiting for a worker. `0` means pure handoff.
    pub queue_capacity: usize,
    /// How long a surplus worker stays idle before retiring.
    pub idle_timeout: Duration,
    /// Consecutive failures after which a worker is retired and replaced.
    pub failure_threshold: u32,
    /// Worker threads are named `{thread_name}-{worker_id}`.
    pub thread_name: String,
    /// Stack size for worker threads; `None` uses the platform default.
    pub stack_size: Option<usize>,
}

impl PoolConfig {
    pub fn new(
        min_workers: usize,
        max_workers: usize,
        queue_capacity: usize,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            min_workers,
            max_workers,
            queue_capacity,
            idle_timeout,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            stack_size: None,
        }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Checks the configuration for values the pool cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::new("max_workers must be > 0"));
        }
        if self.min_workers > self.max_workers {
            return Err(ConfigError::new(format!(
                "min_workers ({}) must be <= max_workers ({})",
                self.min_workers, self.max_workers
            )));
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::new("failure_threshold must be > 0"));
        }
        if self.idle_timeout.is_zero() {
            return Err(ConfigError::new("idle_timeout must be non-zero"));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    /// One resident worker, up to one per available core, a 1024-slot queue
    /// and a 60 second idle timeout.
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::new(1, cores, 1024, Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = PoolConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.max_workers >= 1);
        assert_eq!(config.thread_name, DEFAULT_THREAD_NAME);
    }

    #[test]
    fn rejects_zero_max() {
        let err = PoolConfig::new(0, 0, 4, Duration::from_secs(1))
            .validate()
            .unwrap_err();
        assert!(err.message().contains("max_workers"));
    }

    #[test]
    fn rejects_min_above_max() {
        let err = PoolConfig::new(5, 2, 4, Duration::from_secs(1))
            .validate()
            .unwrap_err();
        assert!(err.message().contains("min_workers (5)"));
    }

    #[test]
    fn rejects_zero_threshold_and_timeout() {
        let base = PoolConfig::new(1, 2, 4, Duration::from_secs(1));
        assert!(base.clone().failure_threshold(0).validate().is_err());

        let mut no_timeout = base;
        no_timeout.idle_timeout = Duration::ZERO;
        assert!(no_timeout.validate().is_err());
    }

    #[test]
    fn zero_min_and_zero_queue_are_allowed() {
        let config = PoolConfig::new(0, 1, 0, Duration::from_millis(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn setters_apply() {
        let config = PoolConfig::new(1, 2, 4, Duration::from_secs(1))
            .thread_name("io")
            .stack_size(256 * 1024);
        assert_eq!(config.thread_name, "io");
        assert_eq!(config.stack_size, Some(256 * 1024));
    }
}
