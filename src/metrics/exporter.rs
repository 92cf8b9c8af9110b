use std::io::Write;

use parking_lot::Mutex;

use crate::cache::CacheStats;
use crate::metrics::traits::MetricsExporter;
use crate::pool::PoolStats;

/// Prometheus text exporter for pool and cache stats.
///
/// This exporter writes in the Prometheus text exposition format so it can be
/// scraped by Prometheus or forwarded to an OpenTelemetry collector.
///
/// # Example
///
/// ```
/// use surgekit::cache::ShardedCache;
/// use surgekit::metrics::{MetricsExporter, PrometheusTextExporter};
///
/// let cache = ShardedCache::new(8, 2);
/// cache.set(1u32, 1u32);
/// cache.get(&1);
///
/// let exporter = PrometheusTextExporter::new("app_cache", Vec::new());
/// exporter.export(&cache.stats());
///
/// let text = String::from_utf8(exporter.into_inner()).unwrap();
/// assert!(text.contains("app_cache_hits_total 1"));
/// ```
#[derive(Debug)]
pub struct PrometheusTextExporter<W: Write + Send> {
    prefix: String,
    writer: Mutex<W>,
}

impl<W: Write + Send> PrometheusTextExporter<W> {
    pub fn new(prefix: impl Into<String>, writer: W) -> Self {
        Self {
            prefix: prefix.into(),
            writer: Mutex::new(writer),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_counter(&self, name: &str, value: u64) {
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "# TYPE {} counter", name);
        let _ = writeln!(writer, "{} {}", name, value);
    }

    fn write_gauge(&self, name: &str, value: u64) {
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "# TYPE {} gauge", name);
        let _ = writeln!(writer, "{} {}", name, value);
    }

    /// One gauge family with a `shard` label per value.
    fn write_labeled_gauges(&self, name: &str, values: &[usize]) {
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "# TYPE {} gauge", name);
        for (shard, value) in values.iter().enumerate() {
            let _ = writeln!(writer, "{}{{shard=\"{}\"}} {}", name, shard, value);
        }
    }

    fn metric_name(&self, suffix: &str) -> String {
        if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}_{}", self.prefix, suffix)
        }
    }
}

impl<W: Write + Send> MetricsExporter<PoolStats> for PrometheusTextExporter<W> {
    fn export(&self, snapshot: &PoolStats) {
        self.write_counter(&self.metric_name("tasks_submitted_total"), snapshot.submitted);
        self.write_counter(&self.metric_name("tasks_completed_total"), snapshot.completed);
        self.write_counter(&self.metric_name("tasks_failed_total"), snapshot.failed);
        self.write_counter(&self.metric_name("tasks_panicked_total"), snapshot.panicked);
        self.write_counter(&self.metric_name("tasks_rejected_total"), snapshot.rejected);
        self.write_counter(&self.metric_name("tasks_timed_out_total"), snapshot.timed_out);
        self.write_counter(&self.metric_name("tasks_cancelled_total"), snapshot.cancelled);
        self.write_counter(
            &self.metric_name("workers_spawned_total"),
            snapshot.workers_spawned,
        );
        self.write_counter(
            &self.metric_name("workers_retired_total"),
            snapshot.workers_retired,
        );
        self.write_counter(
            &self.metric_name("workers_replaced_total"),
            snapshot.workers_replaced,
        );
        self.write_gauge(
            &self.metric_name("workers_current"),
            snapshot.current_workers as u64,
        );
        self.write_gauge(&self.metric_name("workers_idle"), snapshot.idle_workers as u64);
        self.write_gauge(&self.metric_name("workers_peak"), snapshot.peak_workers as u64);
        self.write_gauge(&self.metric_name("workers_min"), snapshot.min_workers as u64);
        self.write_gauge(&self.metric_name("workers_max"), snapshot.max_workers as u64);
        self.write_gauge(&self.metric_name("queue_len"), snapshot.queued as u64);
        self.write_gauge(
            &self.metric_name("queue_capacity"),
            snapshot.queue_capacity as u64,
        );
    }
}

impl<W: Write + Send> MetricsExporter<CacheStats> for PrometheusTextExporter<W> {
    fn export(&self, snapshot: &CacheStats) {
        self.write_counter(&self.metric_name("hits_total"), snapshot.hits);
        self.write_counter(&self.metric_name("misses_total"), snapshot.misses);
        self.write_counter(&self.metric_name("evictions_total"), snapshot.evictions);
        self.write_counter(&self.metric_name("inserts_total"), snapshot.inserts);
        self.write_counter(&self.metric_name("updates_total"), snapshot.updates);
        self.write_counter(&self.metric_name("removes_total"), snapshot.removes);
        self.write_gauge(&self.metric_name("cache_len"), snapshot.len() as u64);
        self.write_gauge(
            &self.metric_name("shard_capacity"),
            snapshot.shard_capacity as u64,
        );
        self.write_labeled_gauges(&self.metric_name("shard_len"), &snapshot.per_shard_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::traits::export_from;

    #[test]
    fn exports_cache_stats_with_shard_labels() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            evictions: 2,
            per_shard_size: vec![4, 0],
            shard_capacity: 4,
            ..CacheStats::default()
        };
        let exporter = PrometheusTextExporter::new("c", Vec::new());
        exporter.export(&stats);
        let text = String::from_utf8(exporter.into_inner()).unwrap();

        assert!(text.contains("# TYPE c_hits_total counter\nc_hits_total 3\n"));
        assert!(text.contains("c_evictions_total 2"));
        assert!(text.contains("c_cache_len 4"));
        assert!(text.contains("c_shard_len{shard=\"0\"} 4"));
        assert!(text.contains("c_shard_len{shard=\"1\"} 0"));
    }

    #[test]
    fn exports_pool_stats() {
        let stats = PoolStats {
            current_workers: 3,
            completed: 10,
            rejected: 2,
            ..PoolStats::default()
        };
        let exporter = PrometheusTextExporter::new("", Vec::new());
        exporter.export(&stats);
        let text = String::from_utf8(exporter.into_inner()).unwrap();

        assert!(text.contains("tasks_completed_total 10"));
        assert!(text.contains("tasks_rejected_total 2"));
        assert!(text.contains("# TYPE workers_current gauge\nworkers_current 3\n"));
    }

    #[test]
    fn export_from_snapshots_provider() {
        let cache = crate::cache::ShardedCache::new(4, 1);
        cache.set("k", 1);
        cache.get(&"missing");

        let exporter = PrometheusTextExporter::new("x", Vec::new());
        export_from::<CacheStats, _, _>(&cache, &exporter);
        let text = String::from_utf8(exporter.into_inner()).unwrap();
        assert!(text.contains("x_misses_total 1"));
        assert!(text.contains("x_inserts_total 1"));
    }
}
