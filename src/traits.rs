//! # Cache Trait Hierarchy
//!
//! Two families of traits: single-threaded traits taking `&mut self`, used by
//! one shard behind its lock, and [`ConcurrentCache`] taking `&self`, used by
//! callers sharing a cache across threads.
//!
//! ## Architecture
//!
//! ```text
//!   ┌─────────────────────────────────────────┐
//!   │            CoreCache<K, V>              │
//!   │  insert(&mut, K, V) → Option<V>         │
//!   │  get(&mut, &K) → Option<&V>             │
//!   │  contains / len / is_empty / capacity   │
//!   │  clear(&mut)                            │
//!   └──────────────────┬──────────────────────┘
//!                      │
//!                      ▼
//!   ┌─────────────────────────────────────────┐
//!   │          MutableCache<K, V>             │
//!   │  remove(&mut, &K) → Option<V>           │
//!   └──────────────────┬──────────────────────┘
//!                      │
//!                      ▼
//!   ┌─────────────────────────────────────────┐
//!   │          LruCacheTrait<K, V>            │
//!   │  pop_lru / peek_lru / touch             │
//!   │  recency_rank                           │
//!   └─────────────────────────────────────────┘
//!
//!   ┌─────────────────────────────────────────┐
//!   │      ConcurrentCache<K, V>: Send+Sync   │
//!   │  get(&, &K) → Option<V>                 │
//!   │  set(&, K, V)                           │
//!   │  delete(&, &K)                          │
//!   └─────────────────────────────────────────┘
//! ```
//!
//! | Trait             | Implemented by                                   |
//! |-------------------|--------------------------------------------------|
//! | `CoreCache`       | [`LruShard`](crate::cache::lru::LruShard)        |
//! | `MutableCache`    | [`LruShard`](crate::cache::lru::LruShard)        |
//! | `LruCacheTrait`   | [`LruShard`](crate::cache::lru::LruShard)        |
//! | `ConcurrentCache` | [`ShardedCache`](crate::cache::sharded::ShardedCache) |

/// Core cache operations that all single-threaded caches support.
///
/// # Example
///
/// ```
/// use surgekit::cache::LruShard;
/// use surgekit::traits::CoreCache;
///
/// fn warm_cache<C: CoreCache<u64, String>>(cache: &mut C, data: &[(u64, String)]) {
///     for (key, value) in data {
///         cache.insert(*key, value.clone());
///     }
/// }
///
/// let mut shard = LruShard::new(100);
/// warm_cache(&mut shard, &[(1, "one".to_string()), (2, "two".to_string())]);
/// assert_eq!(shard.len(), 2);
/// ```
pub trait CoreCache<K, V> {
    /// Inserts a key-value pair, returning the previous value if it existed.
    ///
    /// If the cache is at capacity and the key is new, an entry is evicted
    /// according to the cache's policy before the new entry is inserted.
    fn insert(&mut self, key: K, value: V) -> Option<V>;

    /// Gets a reference to a value by key, updating policy state.
    fn get(&mut self, key: &K) -> Option<&V>;

    /// Returns `true` if the key is present. Does not update policy state.
    fn contains(&self, key: &K) -> bool;

    /// Returns the number of entries.
    fn len(&self) -> usize;

    /// Returns `true` if the cache holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the maximum number of entries.
    fn capacity(&self) -> usize;

    /// Removes every entry.
    fn clear(&mut self);
}

/// Caches that support removal by key.
pub trait MutableCache<K, V>: CoreCache<K, V> {
    /// Removes `key`, returning its value if it was present.
    fn remove(&mut self, key: &K) -> Option<V>;

    /// Removes several keys, returning each removed value in order.
    fn remove_batch(&mut self, keys: &[K]) -> Vec<Option<V>> {
        keys.iter().map(|key| self.remove(key)).collect()
    }
}

/// LRU-specific operations.
///
/// # Example
///
/// ```
/// use surgekit::cache::LruShard;
/// use surgekit::traits::{CoreCache, LruCacheTrait};
///
/// let mut shard = LruShard::new(3);
/// shard.insert(1, "a");
/// shard.insert(2, "b");
/// shard.touch(&1);
///
/// assert_eq!(shard.peek_lru(), Some((&2, &"b")));
/// assert_eq!(shard.recency_rank(&1), Some(0));
/// ```
pub trait LruCacheTrait<K, V>: MutableCache<K, V> {
    /// Removes and returns the least recently used entry.
    fn pop_lru(&mut self) -> Option<(K, V)>;

    /// Returns the least recently used entry without changing order.
    fn peek_lru(&self) -> Option<(&K, &V)>;

    /// Marks `key` as most recently used. Returns `false` if absent.
    fn touch(&mut self, key: &K) -> bool;

    /// Position of `key` in recency order (0 = most recent). O(n).
    fn recency_rank(&self, key: &K) -> Option<usize>;
}

/// Thread-safe cache operations taking `&self`.
///
/// Values are returned by clone; use `Arc<V>` for values that are expensive
/// to copy. Absence is always `None`, never an error.
pub trait ConcurrentCache<K, V>: Send + Sync {
    /// Returns the value for `key`, marking it most recently used.
    fn get(&self, key: &K) -> Option<V>;

    /// Inserts or updates `key`.
    fn set(&self, key: K, value: V);

    /// Removes `key` if present.
    fn delete(&self, key: &K);
}
