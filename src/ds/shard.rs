//! Deterministic key-to-shard mapping for the sharded cache.
//!
//! ## Architecture
//!
//! ```text
//!   Input Key
//!       │
//!       ▼
//!   ┌───────────────────────────────────────────────┐
//!   │  ShardSelector { shards: 4, mask: 3, seed }   │
//!   │                                               │
//!   │  1. DefaultHasher::new()  (fixed SipHash keys)│
//!   │  2. seed.hash(&mut hasher)                    │
//!   │  3. key.hash(&mut hasher)                     │
//!   │  4. hasher.finish() & mask                    │
//!   └───────────────────────────────────────────────┘
//!       │
//!       ▼
//!   ┌─────────┬─────────┬─────────┬─────────┐
//!   │ Shard 0 │ Shard 1 │ Shard 2 │ Shard 3 │
//!   └─────────┴─────────┴─────────┴─────────┘
//! ```
//!
//! The shard count is always a power of two so the modulo reduces to a mask.
//! The mapping is a pure function of `(key, seed, shards)`, fixed for the
//! lifetime of the selector. `DefaultHasher::new()` uses constant keys, so the
//! mapping is also stable across processes built with the same toolchain.
//!
//! Shard selection hashes with SipHash while each shard's map uses FxHash, so
//! keys routed to one shard do not share low hash bits inside that shard.
//!
//! ## Example Usage
//!
//! ```
//! use surgekit::ds::ShardSelector;
//!
//! let selector = ShardSelector::new(4, 0);
//! let shard = selector.shard_for_key(&"user:123");
//! assert!(shard < 4);
//! assert_eq!(selector.shard_for_key(&"user:123"), shard);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Deterministic shard selector using a seeded hash and a power-of-two mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSelector {
    shards: usize,
    mask: u64,
    seed: u64,
}

impl ShardSelector {
    /// Creates a selector for `shards` shards with the given `seed`.
    ///
    /// The shard count is clamped to at least 1 and rounded up to the next
    /// power of two.
    ///
    /// ```
    /// use surgekit::ds::ShardSelector;
    ///
    /// assert_eq!(ShardSelector::new(0, 0).shard_count(), 1);
    /// assert_eq!(ShardSelector::new(6, 0).shard_count(), 8);
    /// assert_eq!(ShardSelector::new(16, 0).shard_count(), 16);
    /// ```
    pub fn new(shards: usize, seed: u64) -> Self {
        let shards = shards.max(1).next_power_of_two();
        Self {
            shards,
            mask: (shards - 1) as u64,
            seed,
        }
    }

    /// Returns the number of shards.
    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards
    }

    /// Returns the seed mixed into every hash.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Maps a key to a shard index in `[0, shards)`.
    #[inline]
    pub fn shard_for_key<K: Hash + ?Sized>(&self, key: &K) -> usize {
        if self.shards == 1 {
            return 0;
        }
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        key.hash(&mut hasher);
        (hasher.finish() & self.mask) as usize
    }
}

impl Default for ShardSelector {
    /// Creates a single-shard selector with seed 0.
    fn default() -> Self {
        Self::new(1, 0)
    }
}
