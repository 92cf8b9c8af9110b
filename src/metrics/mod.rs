//! Metrics export for pool and cache stats (feature `metrics`).

pub mod exporter;
pub mod traits;

pub use exporter::PrometheusTextExporter;
pub use traits::{MetricsExporter, MetricsSnapshotProvider, export_from};
