pub use crate::builder::ShardedCacheBuilder;
pub use crate::cache::{CacheStats, LruShard, ShardedCache};
pub use crate::ds::{HandoffStack, ShardSelector};
pub use crate::error::{ConfigError, InvariantError, PoolError, SubmitError, TaskError};
#[cfg(feature = "metrics")]
pub use crate::metrics::{MetricsExporter, MetricsSnapshotProvider, PrometheusTextExporter};
pub use crate::pool::{
    Pool, PoolConfig, PoolStats, SubmitMode, Task, TaskContext, TaskHandle, TaskId,
};
pub use crate::traits::{ConcurrentCache, CoreCache, LruCacheTrait, MutableCache};
