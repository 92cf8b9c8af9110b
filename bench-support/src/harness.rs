//! Concurrent load harness.
//!
//! Spins `concurrency` scoped threads that call a black-box `work` closure
//! in a tight loop until the run duration elapses, then reports throughput,
//! sampled latency percentiles and the error rate.
//!
//! ```text
//!   start barrier
//!       │
//!   ┌───┴───────────┬───────────────┬─────────────┐
//!   ▼               ▼               ▼             ▼
//!  worker 0       worker 1   ...  worker N-1
//!  loop { t0; work(w, i); sampler.record(t0.elapsed()) } until deadline
//!       │               │               │
//!       └────── merge samplers + counts ─┘
//!                       │
//!                       ▼
//!                 WorkloadReport
//! ```

use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::metrics::{LatencySampler, LatencyStats};

/// Tuning for [`run_workload_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadConfig {
    /// Number of concurrent callers.
    pub concurrency: usize,
    /// Wall-clock run length.
    pub duration: Duration,
    /// Record one latency sample every `latency_sample_rate` calls.
    pub latency_sample_rate: u64,
    /// Latency samples kept across all workers.
    pub max_latency_samples: usize,
}

impl WorkloadConfig {
    pub fn new(concurrency: usize, duration: Duration) -> Self {
        Self {
            concurrency,
            duration,
            ..Self::default()
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            duration: Duration::from_secs(1),
            latency_sample_rate: 1,
            max_latency_samples: 100_000,
        }
    }
}

/// Results of one load run.
#[derive(Debug, Clone, Default)]
pub struct WorkloadReport {
    pub concurrency: usize,
    pub elapsed: Duration,
    /// Calls made, successful or not.
    pub operations: u64,
    pub errors: u64,
    pub throughput_ops_per_sec: f64,
    /// `errors / operations`, or `0.0` for an empty run.
    pub error_rate: f64,
    pub latency: LatencyStats,
    pub per_worker_ops: Vec<u64>,
}

impl WorkloadReport {
    /// Format as a single-line summary.
    pub fn summary(&self) -> String {
        format!(
            "threads={} ops={} throughput={:.0}ops/s p50={:?} p99={:?} errors={:.2}%",
            self.concurrency,
            self.operations,
            self.throughput_ops_per_sec,
            self.latency.p50,
            self.latency.p99,
            self.error_rate * 100.0,
        )
    }
}

/// Runs `work(worker_index, iteration)` from `concurrency` threads for
/// `duration`.
///
/// A call returning `Err` counts toward the error rate; its latency is still
/// sampled. `concurrency` is clamped to at least 1.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use bench_support::harness::run_workload;
///
/// let report = run_workload(2, Duration::from_millis(20), |_, i| {
///     if i % 10 == 0 { Err(()) } else { Ok(()) }
/// });
/// assert!(report.operations > 0);
/// assert!(report.error_rate > 0.0 && report.error_rate < 0.2);
/// ```
pub fn run_workload<F, E>(concurrency: usize, duration: Duration, work: F) -> WorkloadReport
where
    F: Fn(usize, u64) -> Result<(), E> + Sync,
{
    run_workload_with(&WorkloadConfig::new(concurrency, duration), work)
}

pub fn run_workload_with<F, E>(config: &WorkloadConfig, work: F) -> WorkloadReport
where
    F: Fn(usize, u64) -> Result<(), E> + Sync,
{
    let concurrency = config.concurrency.max(1);
    let per_worker_samples = config.max_latency_samples / concurrency;
    let start_line = Barrier::new(concurrency + 1);
    let work = &work;

    let (started, results) = thread::scope(|scope| {
        let handles: Vec<_> = (0..concurrency)
            .map(|worker| {
                let start_line = &start_line;
                scope.spawn(move || {
                    let mut sampler =
                        LatencySampler::new(per_worker_samples, config.latency_sample_rate);
                    let mut errors = 0u64;
                    let mut iteration = 0u64;

                    start_line.wait();
                    let deadline = Instant::now() + config.duration;
                    while Instant::now() < deadline {
                        let t0 = Instant::now();
                        if work(worker, iteration).is_err() {
                            errors += 1;
                        }
                        sampler.record(t0.elapsed());
                        iteration += 1;
                    }
                    (iteration, errors, sampler.into_samples())
                })
            })
            .collect();

        start_line.wait();
        let started = Instant::now();
        // A panicking worker contributes nothing rather than aborting the run.
        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap_or_default())
            .collect();
        (started, results)
    });
    let elapsed = started.elapsed();

    let mut report = WorkloadReport {
        concurrency,
        elapsed,
        ..WorkloadReport::default()
    };
    let mut samples = Vec::new();
    for (ops, errors, worker_samples) in results {
        report.operations += ops;
        report.errors += errors;
        report.per_worker_ops.push(ops);
        samples.extend(worker_samples);
    }

    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        report.throughput_ops_per_sec = report.operations as f64 / secs;
    }
    if report.operations > 0 {
        report.error_rate = report.errors as f64 / report.operations as f64;
    }
    report.latency = LatencyStats::from_samples(&mut samples);

    debug!(
        concurrency,
        operations = report.operations,
        errors = report.errors,
        elapsed_ms = elapsed.as_millis() as u64,
        "workload finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn counts_every_call() {
        let calls = AtomicU64::new(0);
        let report = run_workload(3, Duration::from_millis(30), |_, _| {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok::<(), ()>(())
        });

        assert_eq!(report.operations, calls.load(Ordering::Relaxed));
        assert_eq!(report.per_worker_ops.len(), 3);
        assert_eq!(report.errors, 0);
        assert_eq!(report.error_rate, 0.0);
        assert!(report.throughput_ops_per_sec > 0.0);
        assert!(report.elapsed >= Duration::from_millis(25));
    }

    #[test]
    fn all_errors_gives_rate_one() {
        let report = run_workload(1, Duration::from_millis(10), |_, _| Err::<(), _>("nope"));
        assert!(report.operations > 0);
        assert_eq!(report.errors, report.operations);
        assert_eq!(report.error_rate, 1.0);
    }

    #[test]
    fn zero_concurrency_runs_one_worker() {
        let report = run_workload(0, Duration::from_millis(5), |_, _| Ok::<(), ()>(()));
        assert_eq!(report.concurrency, 1);
        assert_eq!(report.per_worker_ops.len(), 1);
    }

    #[test]
    fn latency_samples_are_bounded() {
        let config = WorkloadConfig {
            concurrency: 2,
            duration: Duration::from_millis(20),
            latency_sample_rate: 1,
            max_latency_samples: 64,
        };
        let report = run_workload_with(&config, |_, _| Ok::<(), ()>(()));
        assert!(report.latency.sample_count <= 64);
        assert!(report.latency.min <= report.latency.max);
        assert!(report.summary().contains("threads=2"));
    }
}
