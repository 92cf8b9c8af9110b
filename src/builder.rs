//! Builder for [`ShardedCache`].
//!
//! Collects capacity, shard count and seed, then either normalizes them
//! ([`build`](ShardedCacheBuilder::build)) or rejects values that would need
//! normalizing ([`try_build`](ShardedCacheBuilder::try_build)).
//!
//! ## Example
//!
//! ```rust
//! use surgekit::builder::ShardedCacheBuilder;
//!
//! let cache = ShardedCacheBuilder::new(1_000)
//!     .shards(16)
//!     .seed(42)
//!     .build::<u64, String>();
//!
//! cache.set(1, "hello".to_string());
//! assert_eq!(cache.get(&1), Some("hello".to_string()));
//! assert_eq!(cache.shard_count(), 16);
//! ```

use std::hash::Hash;

use crate::cache::sharded::{ShardedCache, validate_shard_count};
use crate::error::ConfigError;

/// Default shard count when none is given.
pub const DEFAULT_SHARDS: usize = 16;

/// Builder for creating [`ShardedCache`] instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardedCacheBuilder {
    capacity: usize,
    shards: usize,
    seed: u64,
}

impl ShardedCacheBuilder {
    /// Create a new builder for a cache of about `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            shards: DEFAULT_SHARDS,
            seed: 0,
        }
    }

    /// Number of shards. Should be a power of two.
    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Seed mixed into the shard hash.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Build the cache, rounding the shard count up to a power of two.
    ///
    /// ```rust
    /// use surgekit::builder::ShardedCacheBuilder;
    ///
    /// let cache = ShardedCacheBuilder::new(64).shards(5).build::<u32, u32>();
    /// assert_eq!(cache.shard_count(), 8);
    /// ```
    pub fn build<K, V>(self) -> ShardedCache<K, V>
    where
        K: Eq + Hash + Clone,
        V: Clone,
    {
        ShardedCache::with_seed(self.capacity, self.shards, self.seed)
    }

    /// Build the cache, failing on a zero or non-power-of-two shard count.
    pub fn try_build<K, V>(self) -> Result<ShardedCache<K, V>, ConfigError>
    where
        K: Eq + Hash + Clone,
        V: Clone,
    {
        validate_shard_count(self.shards)?;
        Ok(self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cache = ShardedCacheBuilder::new(160).build::<u64, u64>();
        assert_eq!(cache.shard_count(), DEFAULT_SHARDS);
        assert_eq!(cache.shard_capacity(), 10);
        assert_eq!(cache.seed(), 0);
    }

    #[test]
    fn test_capacity_enforcement() {
        let cache = ShardedCacheBuilder::new(2).shards(1).build::<u64, String>();

        cache.set(1, "one".to_string());
        cache.set(2, "two".to_string());
        cache.set(3, "three".to_string());

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&1));
        assert!(cache.contains(&2));
        assert!(cache.contains(&3));
    }

    #[test]
    fn test_try_build_validates() {
        let err = ShardedCacheBuilder::new(10)
            .shards(0)
            .try_build::<u64, u64>()
            .unwrap_err();
        assert!(err.to_string().contains("> 0"));

        let err = ShardedCacheBuilder::new(10)
            .shards(12)
            .try_build::<u64, u64>()
            .unwrap_err();
        assert!(err.to_string().contains("power of two"));

        let cache = ShardedCacheBuilder::new(10)
            .shards(2)
            .seed(7)
            .try_build::<u64, u64>()
            .unwrap();
        assert_eq!(cache.seed(), 7);
    }
}
