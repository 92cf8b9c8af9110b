//! Latency sampling and summary statistics for load runs.

use std::time::Duration;

/// Latency distribution (collected via sampling).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencyStats {
    pub min: Duration,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub max: Duration,
    pub mean: Duration,
    pub sample_count: usize,
}

impl LatencyStats {
    /// Compute percentiles from a slice of durations. Sorts in place.
    pub fn from_samples(samples: &mut [Duration]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        samples.sort_unstable();
        let n = samples.len();
        let sum: Duration = samples.iter().sum();

        Self {
            min: samples[0],
            p50: samples[n / 2],
            p95: samples[(n * 95) / 100],
            p99: samples[(n * 99) / 100],
            max: samples[n - 1],
            mean: sum / n as u32,
            sample_count: n,
        }
    }
}

/// Samples operation latencies without keeping every measurement.
///
/// Every `sample_rate`-th call is kept. Once `capacity` samples are held, new
/// samples overwrite old ones round-robin, so memory stays bounded on long
/// runs.
#[derive(Debug)]
pub struct LatencySampler {
    samples: Vec<Duration>,
    capacity: usize,
    count: u64,
    sample_rate: u64,
}

impl LatencySampler {
    /// Create a sampler that collects up to `capacity` samples.
    /// `sample_rate` controls how often to sample (1 = every op, 100 = every 100th op).
    pub fn new(capacity: usize, sample_rate: u64) -> Self {
        Self {
            samples: Vec::with_capacity(capacity.min(1 << 16)),
            capacity,
            count: 0,
            sample_rate: sample_rate.max(1),
        }
    }

    /// Record a latency sample (only if selected for sampling).
    #[inline]
    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        if self.count % self.sample_rate != 0 || self.capacity == 0 {
            return;
        }

        if self.samples.len() < self.capacity {
            self.samples.push(duration);
        } else {
            let replace_idx = ((self.count / self.sample_rate) as usize) % self.capacity;
            self.samples[replace_idx] = duration;
        }
    }

    /// Calls recorded so far, sampled or not.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Compute latency statistics from collected samples.
    pub fn stats(&mut self) -> LatencyStats {
        LatencyStats::from_samples(&mut self.samples)
    }

    pub fn into_samples(self) -> Vec<Duration> {
        self.samples
    }
}
