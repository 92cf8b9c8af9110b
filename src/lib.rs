//! surgekit: an elastic worker pool, a lock-free handoff stack and a sharded
//! LRU cache for in-process concurrency.
//!
//! - [`pool`]: thread-per-worker pool that grows under backlog up to a
//!   ceiling, shrinks back after an idle timeout and signals backpressure
//!   with a bounded queue.
//! - [`ds`]: the lock-free [`HandoffStack`](ds::HandoffStack) that passes
//!   idle-worker tokens, and the deterministic
//!   [`ShardSelector`](ds::ShardSelector).
//! - [`cache`]: [`ShardedCache`](cache::ShardedCache), an LRU cache with one
//!   lock per shard.
//!
//! See `DESIGN.md` for internal architecture and invariants.

pub mod builder;
pub mod cache;
pub mod ds;
pub mod error;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod pool;
pub mod prelude;
pub mod traits;
