//! Thread-safe LRU cache partitioned into independently locked shards.
//!
//! ## Architecture
//!
//! ```text
//!                 ShardedCache<K, V>
//!   ┌──────────────────────────────────────────────────────┐
//!   │  selector: ShardSelector { shards: 4, seed }         │
//!   │  shard_capacity = ceil(total / 4)                    │
//!   │                                                      │
//!   │  ┌──────────────┐ ┌──────────────┐     ┌───────────┐ │
//!   │  │ Mutex        │ │ Mutex        │ ... │ Mutex     │ │
//!   │  │  LruShard 0  │ │  LruShard 1  │     │ LruShard 3│ │
//!   │  └──────────────┘ └──────────────┘     └───────────┘ │
//!   └──────────────────────────────────────────────────────┘
//!
//!   get/set/delete(key):  idx = selector.shard_for_key(key)
//!                         lock shards[idx] → operate → unlock
//! ```
//!
//! Every operation takes exactly one shard lock, so callers touching
//! different shards never contend and no cross-shard lock ordering exists.
//! The only state shared across shards is the read-only selector.
//!
//! ## Capacity
//!
//! Each shard holds `ceil(total / shard_count)` entries. The effective
//! maximum, `shard_count × shard_capacity`, can exceed the requested total by
//! up to `shard_count - 1` entries and is reported by
//! [`ShardedCache::effective_capacity`]. Eviction is per shard: a full shard
//! evicts its own LRU entry even while other shards have room.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use surgekit::cache::ShardedCache;
//!
//! let cache = Arc::new(ShardedCache::new(1024, 8));
//!
//! let handles: Vec<_> = (0..4u64)
//!     .map(|t| {
//!         let cache = Arc::clone(&cache);
//!         thread::spawn(move || {
//!             for i in 0..100 {
//!                 cache.set(t * 1000 + i, i);
//!             }
//!         })
//!     })
//!     .collect();
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//!
//! assert_eq!(cache.get(&3005), Some(5));
//! assert_eq!(cache.len(), 400);
//! ```

use std::fmt;
use std::hash::Hash;

use parking_lot::Mutex;

use crate::cache::lru::{LruShard, ShardStats};
use crate::ds::ShardSelector;
use crate::error::ConfigError;
use crate::traits::ConcurrentCache;

#[cfg(feature = "metrics")]
use crate::metrics::traits::MetricsSnapshotProvider;

/// Aggregated cache counters plus per-shard sizes.
///
/// Each shard is read under its own lock in turn, so the totals are not an
/// atomic snapshot while writers are active.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub inserts: u64,
    pub updates: u64,
    pub removes: u64,
    pub per_shard_size: Vec<usize>,
    pub shard_capacity: usize,
}

impl CacheStats {
    /// Total number of entries across shards.
    pub fn len(&self) -> usize {
        self.per_shard_size.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hits over lookups, or `0.0` before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }

    fn absorb(&mut self, shard: &ShardStats) {
        self.hits += shard.hits;
        self.misses += shard.misses;
        self.evictions += shard.evictions;
        self.inserts += shard.inserts;
        self.updates += shard.updates;
        self.removes += shard.removes;
        self.per_shard_size.push(shard.len);
    }
}

/// Concurrent LRU cache with one lock per shard.
///
/// Values are returned by clone. Wrap large values in `Arc<V>`.
pub struct ShardedCache<K, V> {
    shards: Box<[Mutex<LruShard<K, V>>]>,
    selector: ShardSelector,
    shard_capacity: usize,
    requested_capacity: usize,
}

impl<K, V> ShardedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a cache holding about `total_capacity` entries over
    /// `shard_count` shards.
    ///
    /// `shard_count` is clamped to at least 1 and rounded up to the next power
    /// of two. Use [`try_new`](Self::try_new) to reject such values instead.
    ///
    /// ```
    /// use surgekit::cache::ShardedCache;
    ///
    /// let cache: ShardedCache<u64, u64> = ShardedCache::new(100, 6);
    /// assert_eq!(cache.shard_count(), 8);
    /// assert_eq!(cache.shard_capacity(), 13);
    /// assert_eq!(cache.effective_capacity(), 104);
    /// ```
    pub fn new(total_capacity: usize, shard_count: usize) -> Self {
        Self::with_seed(total_capacity, shard_count, 0)
    }

    /// Like [`new`](Self::new), but mixes `seed` into shard selection.
    pub fn with_seed(total_capacity: usize, shard_count: usize, seed: u64) -> Self {
        let selector = ShardSelector::new(shard_count, seed);
        let shards = selector.shard_count();
        let shard_capacity = total_capacity.div_ceil(shards);
        let shards = (0..shards)
            .map(|_| Mutex::new(LruShard::new(shard_capacity)))
            .collect();
        Self {
            shards,
            selector,
            shard_capacity,
            requested_capacity: total_capacity,
        }
    }

    /// Creates a cache, rejecting a zero or non-power-of-two `shard_count`.
    pub fn try_new(total_capacity: usize, shard_count: usize) -> Result<Self, ConfigError> {
        validate_shard_count(shard_count)?;
        Ok(Self::new(total_capacity, shard_count))
    }

    /// Returns a clone of the value for `key`, marking it most recently used.
    ///
    /// Counts a hit or miss on the key's shard.
    pub fn get(&self, key: &K) -> Option<V> {
        self.shard_for(key).lock().get(key).cloned()
    }

    /// Returns a clone of the value without touching recency or counters.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.shard_for(key).lock().peek(key).cloned()
    }

    /// Inserts or updates `key`.
    ///
    /// A new key arriving at a full shard evicts that shard's LRU entry.
    pub fn set(&self, key: K, value: V) {
        let idx = self.selector.shard_for_key(&key);
        self.shards[idx].lock().insert(key, value);
    }

    /// Inserts or updates `key`, returning the previous value.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let idx = self.selector.shard_for_key(&key);
        self.shards[idx].lock().insert(key, value)
    }

    /// Removes `key`. No-op if absent.
    pub fn delete(&self, key: &K) {
        self.shard_for(key).lock().remove(key);
    }

    /// Removes `key`, returning its value if present.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.shard_for(key).lock().remove(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.shard_for(key).lock().contains(key)
    }

    /// Total entries across shards. Not atomic under concurrent writes.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.lock().is_empty())
    }

    /// Drops every entry. Counters are kept.
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.lock().clear();
        }
    }

    /// Returns the shard `key` maps to.
    #[inline]
    pub fn shard_index(&self, key: &K) -> usize {
        self.selector.shard_for_key(key)
    }

    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Maximum entries per shard, `ceil(total / shard_count)`.
    #[inline]
    pub fn shard_capacity(&self) -> usize {
        self.shard_capacity
    }

    /// The capacity passed at construction.
    #[inline]
    pub fn requested_capacity(&self) -> usize {
        self.requested_capacity
    }

    /// Upper bound on stored entries, `shard_count × shard_capacity`.
    #[inline]
    pub fn effective_capacity(&self) -> usize {
        self.shards.len() * self.shard_capacity
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.selector.seed()
    }

    /// Aggregates every shard's counters and sizes.
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            per_shard_size: Vec::with_capacity(self.shards.len()),
            shard_capacity: self.shard_capacity,
            ..CacheStats::default()
        };
        for shard in self.shards.iter() {
            stats.absorb(&shard.lock().stats());
        }
        stats
    }

    /// Per-shard counters, in shard order.
    pub fn shard_stats(&self) -> Vec<ShardStats> {
        self.shards.iter().map(|shard| shard.lock().stats()).collect()
    }

    /// Keys in one shard from MRU to LRU. Returns an empty list for an
    /// out-of-range index.
    pub fn shard_keys_by_recency(&self, shard: usize) -> Vec<K> {
        self.shards
            .get(shard)
            .map(|s| s.lock().keys_by_recency())
            .unwrap_or_default()
    }

    /// Runs [`LruShard::check_invariants`] on every shard.
    pub fn check_invariants(&self) -> Result<(), crate::error::InvariantError> {
        for shard in self.shards.iter() {
            shard.lock().check_invariants()?;
        }
        Ok(())
    }

    #[inline]
    fn shard_for(&self, key: &K) -> &Mutex<LruShard<K, V>> {
        &self.shards[self.selector.shard_for_key(key)]
    }
}

/// Rejects shard counts that [`ShardSelector`] would have to normalize.
pub(crate) fn validate_shard_count(shard_count: usize) -> Result<(), ConfigError> {
    if shard_count == 0 {
        return Err(ConfigError::new("shard_count must be > 0"));
    }
    if !shard_count.is_power_of_two() {
        return Err(ConfigError::new(format!(
            "shard_count must be a power of two, got {shard_count}"
        )));
    }
    Ok(())
}

impl<K, V> ConcurrentCache<K, V> for ShardedCache<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn get(&self, key: &K) -> Option<V> {
        ShardedCache::get(self, key)
    }

    fn set(&self, key: K, value: V) {
        ShardedCache::set(self, key, value);
    }

    fn delete(&self, key: &K) {
        ShardedCache::delete(self, key);
    }
}

impl<K, V> fmt::Debug for ShardedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedCache")
            .field("shard_count", &self.shards.len())
            .field("shard_capacity", &self.shard_capacity)
            .field("seed", &self.selector.seed())
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "metrics")]
impl<K, V> MetricsSnapshotProvider<CacheStats> for ShardedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn snapshot(&self) -> CacheStats {
        self.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Finds `n` distinct keys that land in `shard`.
    fn keys_in_shard(cache: &ShardedCache<String, u32>, shard: usize, n: usize) -> Vec<String> {
        (0..)
            .map(|i| format!("k{i}"))
            .filter(|k| cache.shard_index(k) == shard)
            .take(n)
            .collect()
    }

    #[test]
    fn capacity_rounds_up_per_shard() {
        let cache: ShardedCache<u32, u32> = ShardedCache::new(10, 4);
        assert_eq!(cache.shard_capacity(), 3);
        assert_eq!(cache.effective_capacity(), 12);
        assert_eq!(cache.requested_capacity(), 10);
    }

    #[test]
    fn new_normalizes_shard_count() {
        let zero: ShardedCache<u32, u32> = ShardedCache::new(8, 0);
        assert_eq!(zero.shard_count(), 1);
        let odd: ShardedCache<u32, u32> = ShardedCache::new(8, 3);
        assert_eq!(odd.shard_count(), 4);
    }

    #[test]
    fn try_new_rejects_bad_shard_counts() {
        assert!(ShardedCache::<u32, u32>::try_new(8, 0).is_err());
        let err = ShardedCache::<u32, u32>::try_new(8, 6).unwrap_err();
        assert!(err.to_string().contains("power of two"));
        assert!(ShardedCache::<u32, u32>::try_new(8, 4).is_ok());
    }

    #[test]
    fn scenario_b_eviction_within_one_shard() {
        let cache: ShardedCache<String, u32> = ShardedCache::new(4, 2);
        assert_eq!(cache.shard_capacity(), 2);

        let keys = keys_in_shard(&cache, 0, 3);
        let (a, b, c) = (&keys[0], &keys[1], &keys[2]);

        cache.set(a.clone(), 1);
        cache.set(b.clone(), 2);
        assert_eq!(cache.get(b), Some(2));
        cache.set(c.clone(), 3);

        assert_eq!(cache.get(a), None);
        assert_eq!(cache.get(b), Some(2));
        assert_eq!(cache.get(c), Some(3));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn eviction_law_first_inserted_goes() {
        let cache: ShardedCache<String, u32> = ShardedCache::new(12, 4);
        let n = cache.shard_capacity();
        let keys = keys_in_shard(&cache, 2, n + 1);

        for (i, key) in keys.iter().enumerate() {
            cache.set(key.clone(), i as u32);
        }

        assert_eq!(cache.get(&keys[0]), None);
        for key in &keys[1..] {
            assert!(cache.contains(key));
        }
        assert_eq!(cache.stats().per_shard_size[2], n);
    }

    #[test]
    fn full_shard_evicts_even_when_others_have_room() {
        let cache: ShardedCache<String, u32> = ShardedCache::new(4, 2);
        let keys = keys_in_shard(&cache, 1, 3);
        for key in &keys {
            cache.set(key.clone(), 0);
        }
        let stats = cache.stats();
        assert_eq!(stats.per_shard_size, vec![0, 2]);
        assert_eq!(stats.evictions, 1);
    }

    #[test]
    fn stats_aggregate_hits_and_misses() {
        let cache = ShardedCache::new(64, 4);
        for i in 0..10u32 {
            cache.set(i, i * 2);
        }
        for i in 0..10u32 {
            assert_eq!(cache.get(&i), Some(i * 2));
        }
        for i in 100..105u32 {
            assert_eq!(cache.get(&i), None);
        }

        let stats = cache.stats();
        assert_eq!(stats.hits, 10);
        assert_eq!(stats.misses, 5);
        assert_eq!(stats.inserts, 10);
        assert_eq!(stats.len(), 10);
        assert_eq!(stats.per_shard_size.len(), 4);
        assert!((stats.hit_rate() - 10.0 / 15.0).abs() < 1e-9);
    }

    #[test]
    fn delete_is_noop_when_absent() {
        let cache = ShardedCache::new(8, 2);
        cache.set("a", 1);
        cache.delete(&"missing");
        cache.delete(&"a");
        cache.delete(&"a");
        assert!(cache.is_empty());
        assert_eq!(cache.stats().removes, 1);
    }

    #[test]
    fn peek_does_not_count_or_reorder() {
        let cache = ShardedCache::new(2, 1);
        cache.set(1, "one");
        cache.set(2, "two");
        assert_eq!(cache.peek(&1), Some("one"));
        cache.set(3, "three");
        assert!(!cache.contains(&1));
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn same_seed_same_mapping() {
        let a: ShardedCache<u64, u64> = ShardedCache::with_seed(64, 8, 99);
        let b: ShardedCache<u64, u64> = ShardedCache::with_seed(64, 8, 99);
        for key in 0..500u64 {
            assert_eq!(a.shard_index(&key), b.shard_index(&key));
        }
        assert_eq!(a.seed(), 99);
    }

    #[test]
    fn clear_empties_all_shards() {
        let cache = ShardedCache::new(32, 4);
        for i in 0..20u32 {
            cache.set(i, i);
        }
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.len(), 0);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn shard_keys_by_recency_out_of_range_is_empty() {
        let cache: ShardedCache<u32, u32> = ShardedCache::new(8, 2);
        assert!(cache.shard_keys_by_recency(7).is_empty());
    }
}
