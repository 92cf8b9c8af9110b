//! Load harness and workload generators for surgekit.
//!
//! Shared by the criterion benches and the stress tests: a concurrent
//! [`harness::run_workload`] driver, latency sampling and deterministic key
//! streams for cache workloads.

pub mod harness;
pub mod metrics;
pub mod workload;

pub use harness::{WorkloadConfig, WorkloadReport, run_workload, run_workload_with};
pub use metrics::{LatencySampler, LatencyStats};
pub use workload::{Workload, WorkloadGenerator, WorkloadSpec};
