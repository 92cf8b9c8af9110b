// ==============================================
// LOAD HARNESS TESTS (integration)
// ==============================================
//
// Drives the pool and the cache through bench-support's run_workload, the
// same way the benches do, and checks the report against the component's
// own counters.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bench_support::harness::{WorkloadConfig, run_workload, run_workload_with};
use bench_support::workload::{Workload, WorkloadSpec};
use parking_lot::Mutex;
use surgekit::cache::ShardedCache;
use surgekit::error::SubmitError;
use surgekit::pool::{Pool, Task};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn cache_workload_reports_throughput_and_latency() {
    init_tracing();
    let cache: ShardedCache<u64, u64> = ShardedCache::new(1_024, 8);
    let spec = WorkloadSpec {
        universe: 4_096,
        workload: Workload::Zipfian { theta: 0.99 },
        seed: 42,
    };
    let generators: Vec<_> = (0..4)
        .map(|w| Mutex::new(spec.for_worker(w).generator()))
        .collect();

    let report = run_workload(4, Duration::from_millis(50), |worker, _| {
        let key = generators[worker].lock().next_key();
        if cache.get(&key).is_none() {
            cache.set(key, key);
        }
        Ok::<(), ()>(())
    });

    assert!(report.operations > 0);
    assert_eq!(report.errors, 0);
    assert_eq!(report.error_rate, 0.0);
    assert!(report.throughput_ops_per_sec > 0.0);
    assert!(report.latency.min <= report.latency.p50);
    assert!(report.latency.p50 <= report.latency.p99);
    assert!(report.latency.p99 <= report.latency.max);

    let stats = cache.stats();
    assert_eq!(stats.hits + stats.misses, report.operations);
    // Skewed access over a cache a quarter the size of the key space.
    assert!(stats.hit_rate() > 0.3, "hit rate {}", stats.hit_rate());
    cache.check_invariants().unwrap();
}

#[test]
fn overloaded_pool_shows_up_as_error_rate() {
    init_tracing();
    let pool = Arc::new(Pool::new(1, 2, 2, Duration::from_millis(50)).unwrap());

    let report = run_workload(4, Duration::from_millis(50), |_, _| {
        pool.try_submit(Task::from_fn(|| {
            std::thread::sleep(Duration::from_millis(1));
        }))
        .map(|_| ())
    });

    assert!(report.operations > 0);
    assert!(report.errors > 0, "expected backpressure: {}", report.summary());
    assert!(report.error_rate > 0.0 && report.error_rate <= 1.0);

    pool.shutdown(true);
    let stats = pool.stats();
    assert_eq!(stats.rejected, report.errors);
    assert_eq!(stats.submitted + stats.rejected, report.operations);
    assert_eq!(stats.completed, stats.submitted);
}

#[test]
fn blocking_submits_trade_errors_for_latency() {
    init_tracing();
    let pool = Pool::new(1, 2, 4, Duration::from_millis(50)).unwrap();

    let config = WorkloadConfig {
        latency_sample_rate: 1,
        max_latency_samples: 10_000,
        ..WorkloadConfig::new(4, Duration::from_millis(50))
    };
    let report = run_workload_with(&config, |_, _| {
        let deadline = Instant::now() + Duration::from_secs(5);
        pool.submit_until(Task::from_fn(|| {}), deadline)
            .map(|_| ())
    });

    assert!(report.operations > 0);
    assert_eq!(report.errors, 0);
    assert!(report.latency.sample_count > 0);

    pool.shutdown(true);
    assert_eq!(pool.stats().timed_out, 0);
    assert_eq!(pool.stats().submitted, report.operations);
}

#[test]
fn error_type_is_preserved_for_callers() {
    // The harness only needs `is_err`, so any error type works.
    let report = run_workload(1, Duration::from_millis(10), |_, i| {
        if i % 2 == 0 {
            Err(SubmitError::QueueFull)
        } else {
            Ok(())
        }
    });
    assert!(report.error_rate > 0.4 && report.error_rate < 0.6);
}
