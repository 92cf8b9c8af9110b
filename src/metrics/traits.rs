//! # Metrics Traits
//!
//! Snapshotting and export are kept apart: components hand out plain stats
//! structs, exporters publish them.
//!
//! ```text
//!   ┌──────────────────────────────┐    ┌──────────────────────────────┐
//!   │ MetricsSnapshotProvider<S>   │    │ MetricsExporter<S>           │
//!   │  Pool        → PoolStats     │───►│  PrometheusTextExporter      │
//!   │  ShardedCache → CacheStats   │    │                              │
//!   └──────────────────────────────┘    └──────────────────────────────┘
//! ```

/// Produces a point-in-time snapshot of type `S`.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

/// Export/publish metrics to production monitoring backends.
pub trait MetricsExporter<S> {
    fn export(&self, snapshot: &S);
}

/// Snapshots `source` and hands the result to `exporter`.
pub fn export_from<S, P, E>(source: &P, exporter: &E)
where
    P: MetricsSnapshotProvider<S> + ?Sized,
    E: MetricsExporter<S> + ?Sized,
{
    exporter.export(&source.snapshot());
}
