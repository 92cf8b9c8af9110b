//! Elastic worker pool.
//!
//! Thread-per-worker pool whose size floats between `min_workers` and
//! `max_workers`. New tasks go to an idle worker through a lock-free
//! [`HandoffStack`](crate::ds::HandoffStack) of idle tokens, otherwise grow
//! the pool, otherwise wait in a bounded queue. A full queue is reported as
//! [`SubmitError::QueueFull`] so callers see backpressure instead of
//! unbounded buffering.
//!
//! ## Architecture
//!
//! ```text
//!   submitters                      Shared
//!   ──────────               ┌──────────────────────────────────┐
//!   submit ─── pop token ───►│ idle: HandoffStack<IdleToken>    │◄── push token ──┐
//!      │                     │                                  │                 │
//!      └── state lock ──────►│ state: Mutex<State>              │                 │
//!                            │   queue: VecDeque<Job> (bounded) │◄── pop ─────┐   │
//!                            │   current_workers, waiters       │             │   │
//!                            │ space_available: Condvar         │             │   │
//!                            └──────────────────────────────────┘             │   │
//!                                                                      ┌──────┴───┴──┐
//!                                                                      │ worker N    │
//!                                                                      │ run → queue │
//!                                                                      │ → idle/wait │
//!                                                                      └─────────────┘
//! ```
//!
//! ## Scaling
//!
//! - Scale-up: a submit that finds no idle worker spawns one while
//!   `current_workers < max_workers`.
//! - Scale-down: a worker retires only when it has been idle for
//!   `idle_timeout`, the queue is empty and `current_workers > min_workers`.
//!
//! ## Failures
//!
//! Task errors and panics are caught per worker, counted, recorded as
//! `last_error` and delivered to the task's [`TaskHandle`]. A worker that
//! fails `failure_threshold` tasks in a row is replaced by a fresh thread.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::time::Duration;
//!
//! use surgekit::pool::{Pool, SubmitMode, Task};
//!
//! let pool = Pool::new(1, 4, 16, Duration::from_millis(100)).unwrap();
//! let counter = Arc::new(AtomicUsize::new(0));
//!
//! let handles: Vec<_> = (0..8)
//!     .map(|_| {
//!         let counter = Arc::clone(&counter);
//!         let task = Task::from_fn(move || {
//!             counter.fetch_add(1, Ordering::Relaxed);
//!         });
//!         pool.submit(task, SubmitMode::Blocking).unwrap()
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     handle.wait().unwrap();
//! }
//! assert_eq!(counter.load(Ordering::Relaxed), 8);
//!
//! pool.shutdown(true);
//! assert_eq!(pool.stats().completed, 8);
//! ```

pub mod config;
mod shared;
pub mod stats;
pub mod task;
mod worker;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

pub use config::PoolConfig;
pub use stats::PoolStats;
pub use task::{Task, TaskContext, TaskHandle, TaskId};

use crate::error::{PoolError, SubmitError};
#[cfg(feature = "metrics")]
use crate::metrics::traits::MetricsSnapshotProvider;
use shared::Shared;

/// How `submit` behaves when the pool is saturated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    /// Fail immediately with [`SubmitError::QueueFull`].
    NonBlocking,
    /// Wait until space frees up or the pool shuts down.
    Blocking,
    /// Wait until space frees up, the pool shuts down, or the deadline
    /// passes ([`SubmitError::TimedOut`]).
    BlockingUntil(Instant),
}

/// Elastic thread pool. Dropping it cancels outstanding work and joins all
/// workers.
pub struct Pool {
    shared: Arc<Shared>,
}

impl Pool {
    /// Creates a pool and starts `min_workers` idle workers.
    pub fn new(
        min_workers: usize,
        max_workers: usize,
        queue_capacity: usize,
        idle_timeout: Duration,
    ) -> Result<Self, PoolError> {
        Self::with_config(PoolConfig::new(
            min_workers,
            max_workers,
            queue_capacity,
            idle_timeout,
        ))
    }

    pub fn with_config(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        debug!(
            min_workers = config.min_workers,
            max_workers = config.max_workers,
            queue_capacity = config.queue_capacity,
            "starting pool"
        );
        let pool = Self {
            shared: Arc::new(Shared::new(config)),
        };
        // On error `pool` is dropped, which joins whatever did start.
        pool.shared.start()?;
        Ok(pool)
    }

    /// Submits a task.
    ///
    /// On success the returned handle yields the task's outcome. On error the
    /// task was not accepted and will never run.
    pub fn submit(&self, task: Task, mode: SubmitMode) -> Result<TaskHandle, SubmitError> {
        let shared = &self.shared;
        if shared.is_shutdown() {
            shared.counters.add_cancelled(1);
            return Err(SubmitError::Cancelled);
        }

        let id = TaskId::new(shared.next_task_id());
        let (job, handle) = task.into_job(id, Arc::clone(&shared.cancelled));

        match shared.dispatch(job, mode) {
            Ok(()) => {
                shared.counters.inc_submitted();
                Ok(handle)
            },
            Err(err) => {
                match err {
                    SubmitError::QueueFull => shared.counters.inc_rejected(),
                    SubmitError::TimedOut => shared.counters.inc_timed_out(),
                    SubmitError::Cancelled => shared.counters.add_cancelled(1),
                }
                Err(err)
            },
        }
    }

    /// Non-blocking submit.
    pub fn try_submit(&self, task: Task) -> Result<TaskHandle, SubmitError> {
        self.submit(task, SubmitMode::NonBlocking)
    }

    /// Submit, waiting as long as needed for space.
    pub fn submit_blocking(&self, task: Task) -> Result<TaskHandle, SubmitError> {
        self.submit(task, SubmitMode::Blocking)
    }

    /// Submit, waiting for space until `deadline`.
    pub fn submit_until(&self, task: Task, deadline: Instant) -> Result<TaskHandle, SubmitError> {
        self.submit(task, SubmitMode::BlockingUntil(deadline))
    }

    /// Non-blocking submit of a plain closure.
    pub fn execute<F>(&self, f: F) -> Result<TaskHandle, SubmitError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.try_submit(Task::from_fn(f))
    }

    pub fn stats(&self) -> PoolStats {
        self.shared.stats()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Stops the pool and joins every worker.
    ///
    /// With `drain = true`, queued and in-flight tasks run to completion
    /// first. With `drain = false`, queued tasks are discarded (their handles
    /// resolve to [`TaskError::Cancelled`](crate::error::TaskError::Cancelled))
    /// and [`TaskContext::is_cancelled`] turns true for in-flight tasks,
    /// which the pool waits for but never interrupts. Submitters blocked on a
    /// full queue get [`SubmitError::Cancelled`].
    ///
    /// Only the first call has an effect.
    pub fn shutdown(&self, drain: bool) {
        self.shared.shutdown(drain);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.is_shutdown()
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.shared.shutdown(false);
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.shared.config)
            .field("shutdown", &self.shared.is_shutdown())
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "metrics")]
impl MetricsSnapshotProvider<PoolStats> for Pool {
    fn snapshot(&self) -> PoolStats {
        self.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn wait_for(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    #[test]
    fn rejects_invalid_config() {
        let err = Pool::new(3, 1, 4, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, PoolError::Config(_)));
    }

    #[test]
    fn starts_min_workers_idle() {
        let pool = Pool::new(2, 4, 4, Duration::from_secs(5)).unwrap();
        let stats = pool.stats();
        assert_eq!(stats.current_workers, 2);
        assert_eq!(stats.workers_spawned, 2);
        assert!(wait_for(|| pool.stats().idle_workers == 2, Duration::from_secs(2)));
    }

    #[test]
    fn runs_submitted_tasks() {
        let pool = Pool::new(1, 2, 8, Duration::from_secs(1)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            handles.push(
                pool.submit_blocking(Task::from_fn(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap(),
            );
        }
        for handle in handles {
            assert_eq!(handle.wait(), Ok(()));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(pool.stats().submitted, 5);
    }

    #[test]
    fn task_ids_are_monotonic() {
        let pool = Pool::new(1, 1, 8, Duration::from_secs(1)).unwrap();
        let a = pool.submit_blocking(Task::from_fn(|| {})).unwrap();
        let b = pool.submit_blocking(Task::from_fn(|| {})).unwrap();
        assert!(a.id() < b.id());
    }

    #[test]
    fn task_error_is_delivered_and_recorded() {
        let pool = Pool::new(1, 1, 4, Duration::from_secs(1)).unwrap();
        let handle = pool
            .submit_blocking(Task::new(|_| Err(TaskError::failed("bad input"))))
            .unwrap();
        assert_eq!(handle.wait(), Err(TaskError::failed("bad input")));

        let stats = pool.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.last_error.as_deref(), Some("task failed: bad input"));
    }

    #[test]
    fn submit_after_shutdown_is_cancelled() {
        let pool = Pool::new(1, 1, 1, Duration::from_secs(1)).unwrap();
        pool.shutdown(true);
        assert!(pool.is_shutdown());
        assert_eq!(
            pool.execute(|| {}).unwrap_err(),
            SubmitError::Cancelled
        );
        assert_eq!(pool.stats().cancelled, 1);
        assert_eq!(pool.stats().current_workers, 0);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let pool = Pool::new(2, 2, 1, Duration::from_secs(1)).unwrap();
        pool.shutdown(true);
        pool.shutdown(false);
        pool.shutdown(true);
        assert_eq!(pool.stats().current_workers, 0);
    }

    #[test]
    fn zero_min_pool_grows_on_demand() {
        let pool = Pool::new(0, 2, 2, Duration::from_millis(20)).unwrap();
        assert_eq!(pool.stats().current_workers, 0);

        let handle = pool.execute(|| {}).unwrap();
        assert_eq!(handle.wait(), Ok(()));
        assert!(pool.stats().workers_spawned >= 1);

        assert!(wait_for(
            || pool.stats().current_workers == 0,
            Duration::from_secs(2)
        ));
    }
}
