//! Error types for the surgekit library.
//!
//! ## Key Components
//!
//! - [`SubmitError`]: Returned synchronously by [`Pool::submit`](crate::pool::Pool::submit)
//!   when a task cannot be accepted (backpressure, deadline, shutdown).
//! - [`TaskError`]: Outcome of a task that ran and failed, panicked, or was
//!   discarded before it could run. Captured per task, never pool-fatal.
//! - [`PoolError`]: Returned by pool constructors.
//! - [`ConfigError`]: Returned when pool or cache configuration parameters are
//!   invalid (e.g. `min_workers > max_workers`, zero shard count).
//! - [`InvariantError`]: Returned by debug `check_invariants` methods when
//!   internal data-structure invariants are violated.
//!
//! The cache has no error paths: absence is always `None`.
//!
//! ## Example Usage
//!
//! ```
//! use surgekit::error::ConfigError;
//! use surgekit::pool::PoolConfig;
//! use std::time::Duration;
//!
//! let bad: Result<(), ConfigError> =
//!     PoolConfig::new(4, 2, 8, Duration::from_millis(50)).validate();
//! assert!(bad.unwrap_err().to_string().contains("min_workers"));
//! ```

use thiserror::Error;

// ---------------------------------------------------------------------------
// SubmitError
// ---------------------------------------------------------------------------

/// Error returned when the pool refuses a task at submission time.
///
/// `QueueFull` is a deliberate backpressure signal: the caller should slow
/// down rather than buffer work without bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Non-blocking submit against a saturated queue with no room to grow.
    #[error("task queue is full and the pool is at max workers")]
    QueueFull,
    /// Blocking submit whose deadline passed before space freed up.
    /// The task was not enqueued.
    #[error("timed out waiting for queue space")]
    TimedOut,
    /// The pool is shutting down or already shut down.
    #[error("pool is shut down")]
    Cancelled,
}

// ---------------------------------------------------------------------------
// TaskError
// ---------------------------------------------------------------------------

/// Per-task failure, delivered through [`TaskHandle`](crate::pool::TaskHandle)
/// and summarized in [`PoolStats::last_error`](crate::pool::PoolStats).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task returned an error.
    #[error("task failed: {0}")]
    Failed(String),
    /// The task panicked; the payload message is captured when it is a string.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The task was dropped without running (pool cancelled before it ran).
    #[error("task cancelled before it ran")]
    Cancelled,
}

impl TaskError {
    /// Builds a [`TaskError::Failed`] from anything displayable.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

impl From<String> for TaskError {
    fn from(msg: String) -> Self {
        Self::Failed(msg)
    }
}

impl From<&str> for TaskError {
    fn from(msg: &str) -> Self {
        Self::Failed(msg.to_owned())
    }
}

// ---------------------------------------------------------------------------
// PoolError
// ---------------------------------------------------------------------------

/// Error returned by [`Pool`](crate::pool::Pool) constructors.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid pool configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal invariants are violated.
///
/// Produced by debug `check_invariants` methods
/// (e.g. [`LruShard::check_invariants`](crate::cache::lru::LruShard::check_invariants)).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct InvariantError {
    message: String,
}

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when configuration parameters are invalid.
///
/// Produced by [`PoolConfig::validate`](crate::pool::PoolConfig::validate),
/// [`ShardedCache::try_new`](crate::cache::sharded::ShardedCache::try_new) and
/// builder `try_build()` methods.
///
/// # Example
///
/// ```
/// use surgekit::cache::ShardedCache;
///
/// let err = ShardedCache::<u64, u64>::try_new(64, 3).unwrap_err();
/// assert!(err.to_string().contains("power of two"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
