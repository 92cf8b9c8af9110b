//! Sharded LRU cache.
//!
//! [`LruShard`] is a single unsynchronized LRU partition. [`ShardedCache`]
//! routes each key to one shard with a seeded hash and guards every shard
//! with its own lock.

pub mod lru;
pub mod sharded;

pub use lru::{LruShard, ShardStats};
pub use sharded::{CacheStats, ShardedCache};
