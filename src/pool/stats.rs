//! Pool counters and the [`PoolStats`] snapshot.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Point-in-time view of a pool.
///
/// Gauges (`current_workers`, `idle_workers`, `queued`) are read under the
/// pool lock and are consistent with each other. Counters are monotonic and
/// read without the lock.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolStats {
    pub min_workers: usize,
    pub max_workers: usize,
    pub current_workers: usize,
    /// Workers parked waiting for a task.
    pub idle_workers: usize,
    /// Highest `current_workers` observed.
    pub peak_workers: usize,
    pub queued: usize,
    pub queue_capacity: usize,
    /// Tasks accepted by `submit`.
    pub submitted: u64,
    /// Tasks that ran and returned `Ok`.
    pub completed: u64,
    /// Tasks that ran and returned an error or panicked.
    pub failed: u64,
    /// Subset of `failed` that panicked.
    pub panicked: u64,
    /// Submits refused with `QueueFull`.
    pub rejected: u64,
    /// Blocking submits that hit their deadline.
    pub timed_out: u64,
    /// Tasks that never ran because of shutdown, including refused submits.
    pub cancelled: u64,
    pub workers_spawned: u64,
    pub workers_retired: u64,
    /// Workers swapped out after too many consecutive failures.
    pub workers_replaced: u64,
    /// Message of the most recent task failure.
    pub last_error: Option<String>,
}

impl PoolStats {
    /// Tasks that have finished running, successfully or not.
    pub fn finished(&self) -> u64 {
        self.completed + self.failed
    }
}

#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    rejected: AtomicU64,
    timed_out: AtomicU64,
    cancelled: AtomicU64,
    workers_spawned: AtomicU64,
    workers_retired: AtomicU64,
    workers_replaced: AtomicU64,
    peak_workers: AtomicUsize,
}

impl PoolCounters {
    /// Copies the monotonic counters into `stats`.
    pub(crate) fn fill(&self, stats: &mut PoolStats) {
        stats.submitted = self.submitted.load(Ordering::Relaxed);
        stats.completed = self.completed.load(Ordering::Relaxed);
        stats.failed = self.failed.load(Ordering::Relaxed);
        stats.panicked = self.panicked.load(Ordering::Relaxed);
        stats.rejected = self.rejected.load(Ordering::Relaxed);
        stats.timed_out = self.timed_out.load(Ordering::Relaxed);
        stats.cancelled = self.cancelled.load(Ordering::Relaxed);
        stats.workers_spawned = self.workers_spawned.load(Ordering::Relaxed);
        stats.workers_retired = self.workers_retired.load(Ordering::Relaxed);
        stats.workers_replaced = self.workers_replaced.load(Ordering::Relaxed);
        stats.peak_workers = self.peak_workers.load(Ordering::Relaxed);
    }

    pub(crate) fn inc_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_failed(&self, panicked: bool) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        if panicked {
            self.panicked.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_cancelled(&self, n: u64) {
        self.cancelled.fetch_add(n, Ordering::Relaxed);
    }

    /// Records a spawn and raises the peak if `current` exceeds it.
    pub(crate) fn record_spawn(&self, current: usize) {
        self.workers_spawned.fetch_add(1, Ordering::Relaxed);
        self.peak_workers.fetch_max(current, Ordering::Relaxed);
    }

    pub(crate) fn inc_retired(&self) {
        self.workers_retired.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_replaced(&self) {
        self.workers_replaced.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_copies_counters() {
        let counters = PoolCounters::default();
        counters.inc_submitted();
        counters.inc_submitted();
        counters.inc_completed();
        counters.inc_failed(true);
        counters.record_spawn(3);
        counters.record_spawn(2);
        counters.add_cancelled(4);

        let mut stats = PoolStats::default();
        counters.fill(&mut stats);

        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.workers_spawned, 2);
        assert_eq!(stats.peak_workers, 3);
        assert_eq!(stats.cancelled, 4);
        assert_eq!(stats.finished(), 2);
    }
}
