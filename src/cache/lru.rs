//! Single LRU partition used by [`ShardedCache`](crate::cache::ShardedCache).
//!
//! ## Architecture
//!
//! ```text
//!   map: FxHashMap<K, usize>            nodes: Vec<Node<K, V>>
//!   ┌──────────┬───────┐
//!   │   key    │ index │    [0] HEAD ⇄ [5] ⇄ [2] ⇄ [3] ⇄ [1] TAIL
//!   ├──────────┼───────┤          MRU                LRU
//!   │  "a"     │   3   │
//!   │  "b"     │   2   │    free: [4]   (reused before the arena grows)
//!   │  "c"     │   5   │
//!   └──────────┴───────┘
//! ```
//!
//! Nodes live in an index arena instead of individual heap boxes. Slots `0`
//! and `1` are permanent head/tail sentinels, so linking never branches on an
//! empty list and `head.next == tail` exactly when the shard is empty.
//!
//! ## Operations
//!
//! | Operation      | Time  | Notes                                  |
//! |----------------|-------|----------------------------------------|
//! | `get`          | O(1)  | Moves entry to MRU                     |
//! | `peek`         | O(1)  | No reordering                          |
//! | `insert`       | O(1)  | Evicts the tail first when full        |
//! | `remove`       | O(1)  | Slot goes on the free list             |
//! | `pop_lru`      | O(1)  |                                        |
//! | `recency_rank` | O(n)  | Walks from HEAD                        |
//!
//! `LruShard` is not synchronized; `ShardedCache` wraps each one in its own
//! `parking_lot::Mutex`.
//!
//! ## Example Usage
//!
//! ```
//! use surgekit::cache::LruShard;
//!
//! let mut shard = LruShard::new(2);
//! shard.insert("a", 1);
//! shard.insert("b", 2);
//! shard.get(&"a");
//! shard.insert("c", 3);
//!
//! assert!(shard.contains(&"a"));
//! assert!(!shard.contains(&"b"));
//! assert_eq!(shard.stats().evictions, 1);
//! ```

use std::fmt;
use std::hash::Hash;
use std::mem;

use rustc_hash::FxHashMap;

use crate::error::InvariantError;
use crate::traits::{CoreCache, LruCacheTrait, MutableCache};

const HEAD: usize = 0;
const TAIL: usize = 1;

struct Node<K, V> {
    prev: usize,
    next: usize,
    entry: Option<(K, V)>,
}

impl<K, V> Node<K, V> {
    fn sentinel(prev: usize, next: usize) -> Self {
        Self {
            prev,
            next,
            entry: None,
        }
    }
}

/// Per-shard operation counters.
///
/// Plain integers: the owning shard is always accessed under its lock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShardStats {
    pub len: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub updates: u64,
    pub evictions: u64,
    pub removes: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct ShardCounters {
    hits: u64,
    misses: u64,
    inserts: u64,
    updates: u64,
    evictions: u64,
    removes: u64,
}

/// Bounded LRU map with O(1) get, insert, remove and eviction.
pub struct LruShard<K, V> {
    map: FxHashMap<K, usize>,
    nodes: Vec<Node<K, V>>,
    free: Vec<usize>,
    capacity: usize,
    counters: ShardCounters,
}

impl<K, V> LruShard<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty shard holding at most `capacity` entries.
    ///
    /// A zero-capacity shard accepts inserts but never stores anything.
    pub fn new(capacity: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity.saturating_add(2));
        nodes.push(Node::sentinel(HEAD, TAIL));
        nodes.push(Node::sentinel(HEAD, TAIL));
        Self {
            map: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            nodes,
            free: Vec::new(),
            capacity,
            counters: ShardCounters::default(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` if `key` is present. Does not update recency.
    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Looks up `key`, moving it to the MRU position on a hit.
    ///
    /// Counts a hit or a miss.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = match self.map.get(key) {
            Some(&idx) => idx,
            None => {
                self.counters.misses += 1;
                return None;
            },
        };
        self.counters.hits += 1;
        self.move_to_front(idx);
        self.nodes[idx].entry.as_ref().map(|(_, v)| v)
    }

    /// Looks up `key` without touching recency or counters.
    pub fn peek(&self, key: &K) -> Option<&V> {
        let &idx = self.map.get(key)?;
        self.nodes[idx].entry.as_ref().map(|(_, v)| v)
    }

    /// Inserts or updates `key`, returning the previous value on update.
    ///
    /// A new key arriving at a full shard evicts the LRU entry first, so
    /// `len() <= capacity()` holds after every call.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&idx) = self.map.get(&key) {
            self.counters.updates += 1;
            self.move_to_front(idx);
            return self.nodes[idx]
                .entry
                .as_mut()
                .map(|(_, v)| mem::replace(v, value));
        }

        if self.capacity == 0 {
            return None;
        }

        if self.map.len() >= self.capacity && self.evict_tail().is_some() {
            self.counters.evictions += 1;
        }

        let idx = self.alloc(key.clone(), value);
        self.attach_front(idx);
        self.map.insert(key, idx);
        self.counters.inserts += 1;
        None
    }

    /// Removes `key`, returning its value if present.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.map.remove(key)?;
        self.detach(idx);
        self.counters.removes += 1;
        self.release(idx).map(|(_, v)| v)
    }

    /// Removes and returns the LRU entry. Not counted as an eviction.
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        self.evict_tail()
    }

    /// Returns the LRU entry without changing order.
    pub fn peek_lru(&self) -> Option<(&K, &V)> {
        let idx = self.nodes[TAIL].prev;
        self.nodes[idx].entry.as_ref().map(|(k, v)| (k, v))
    }

    /// Moves `key` to the MRU position. Returns `false` if absent.
    pub fn touch(&mut self, key: &K) -> bool {
        match self.map.get(key) {
            Some(&idx) => {
                self.move_to_front(idx);
                true
            },
            None => false,
        }
    }

    /// Position of `key` counted from the MRU end (0 = most recent).
    pub fn recency_rank(&self, key: &K) -> Option<usize> {
        let &target = self.map.get(key)?;
        let mut idx = self.nodes[HEAD].next;
        let mut rank = 0;
        while idx != TAIL {
            if idx == target {
                return Some(rank);
            }
            idx = self.nodes[idx].next;
            rank += 1;
        }
        None
    }

    /// Drops every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.map.clear();
        self.nodes.truncate(2);
        self.nodes[HEAD].next = TAIL;
        self.nodes[TAIL].prev = HEAD;
        self.free.clear();
    }

    /// Keys from MRU to LRU.
    pub fn keys_by_recency(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.map.len());
        let mut idx = self.nodes[HEAD].next;
        while idx != TAIL {
            if let Some((k, _)) = &self.nodes[idx].entry {
                keys.push(k.clone());
            }
            idx = self.nodes[idx].next;
        }
        keys
    }

    pub fn stats(&self) -> ShardStats {
        let c = self.counters;
        ShardStats {
            len: self.map.len(),
            capacity: self.capacity,
            hits: c.hits,
            misses: c.misses,
            inserts: c.inserts,
            updates: c.updates,
            evictions: c.evictions,
            removes: c.removes,
        }
    }

    /// Verifies list/map consistency.
    ///
    /// Checks that sentinels are intact, every link is mirrored, the list
    /// length matches the map, every listed key maps back to its slot and
    /// `len <= capacity`.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        if self.nodes.len() < 2
            || self.nodes[HEAD].entry.is_some()
            || self.nodes[TAIL].entry.is_some()
        {
            return Err(InvariantError::new("head/tail sentinels missing"));
        }
        if self.nodes[HEAD].prev != HEAD || self.nodes[TAIL].next != TAIL {
            return Err(InvariantError::new("sentinel self-links broken"));
        }
        if self.map.len() > self.capacity {
            return Err(InvariantError::new(format!(
                "len {} exceeds capacity {}",
                self.map.len(),
                self.capacity
            )));
        }

        let mut count = 0usize;
        let mut prev = HEAD;
        let mut idx = self.nodes[HEAD].next;
        while idx != TAIL {
            if idx >= self.nodes.len() || idx == HEAD {
                return Err(InvariantError::new(format!("dangling link to slot {idx}")));
            }
            let node = &self.nodes[idx];
            if node.prev != prev {
                return Err(InvariantError::new(format!(
                    "slot {idx} prev is {} but expected {prev}",
                    node.prev
                )));
            }
            let Some((key, _)) = &node.entry else {
                return Err(InvariantError::new(format!("slot {idx} is linked but empty")));
            };
            if self.map.get(key) != Some(&idx) {
                return Err(InvariantError::new(format!(
                    "slot {idx} key does not map back to it"
                )));
            }
            count += 1;
            if count > self.map.len() {
                return Err(InvariantError::new("recency list longer than map (cycle?)"));
            }
            prev = idx;
            idx = node.next;
        }
        if self.nodes[TAIL].prev != prev {
            return Err(InvariantError::new("tail.prev does not point at last entry"));
        }
        if count != self.map.len() {
            return Err(InvariantError::new(format!(
                "recency list length {count} != map length {}",
                self.map.len()
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Internal linked-list operations
    // =========================================================================

    fn alloc(&mut self, key: K, value: V) -> usize {
        let node = Node {
            prev: HEAD,
            next: TAIL,
            entry: Some((key, value)),
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            },
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            },
        }
    }

    fn release(&mut self, idx: usize) -> Option<(K, V)> {
        let entry = self.nodes[idx].entry.take();
        self.free.push(idx);
        entry
    }

    fn evict_tail(&mut self) -> Option<(K, V)> {
        let idx = self.nodes[TAIL].prev;
        if idx == HEAD {
            return None;
        }
        self.detach(idx);
        let (key, value) = self.release(idx)?;
        self.map.remove(&key);
        Some((key, value))
    }

    #[inline(always)]
    fn detach(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
    }

    #[inline(always)]
    fn attach_front(&mut self, idx: usize) {
        let first = self.nodes[HEAD].next;
        self.nodes[idx].prev = HEAD;
        self.nodes[idx].next = first;
        self.nodes[first].prev = idx;
        self.nodes[HEAD].next = idx;
    }

    #[inline(always)]
    fn move_to_front(&mut self, idx: usize) {
        if self.nodes[HEAD].next != idx {
            self.detach(idx);
            self.attach_front(idx);
        }
    }
}

impl<K, V> fmt::Debug for LruShard<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruShard")
            .field("len", &self.map.len())
            .field("capacity", &self.capacity)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

impl<K, V> CoreCache<K, V> for LruShard<K, V>
where
    K: Eq + Hash + Clone,
{
    #[inline]
    fn insert(&mut self, key: K, value: V) -> Option<V> {
        LruShard::insert(self, key, value)
    }

    #[inline]
    fn get(&mut self, key: &K) -> Option<&V> {
        LruShard::get(self, key)
    }

    #[inline]
    fn contains(&self, key: &K) -> bool {
        LruShard::contains(self, key)
    }

    #[inline]
    fn len(&self) -> usize {
        LruShard::len(self)
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn clear(&mut self) {
        LruShard::clear(self);
    }
}

impl<K, V> MutableCache<K, V> for LruShard<K, V>
where
    K: Eq + Hash + Clone,
{
    #[inline]
    fn remove(&mut self, key: &K) -> Option<V> {
        LruShard::remove(self, key)
    }
}

impl<K, V> LruCacheTrait<K, V> for LruShard<K, V>
where
    K: Eq + Hash + Clone,
{
    fn pop_lru(&mut self) -> Option<(K, V)> {
        LruShard::pop_lru(self)
    }

    fn peek_lru(&self) -> Option<(&K, &V)> {
        LruShard::peek_lru(self)
    }

    fn touch(&mut self, key: &K) -> bool {
        LruShard::touch(self, key)
    }

    fn recency_rank(&self, key: &K) -> Option<usize> {
        LruShard::recency_rank(self, key)
    }
}
