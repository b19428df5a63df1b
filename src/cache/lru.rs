use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::error::{error_codes, CryptoError, CryptoResult};

use super::{CacheConfig, CacheStats};

/// Why an entry left the cache without being explicitly removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// The cache was full and this was the least recently used entry
    Capacity,
    /// The entry outlived the configured TTL
    Expired,
}

/// Observer invoked for every capacity or TTL eviction.
///
/// Runs while the cache is borrowed (or locked, for the shared wrapper) and
/// must not call back into the same cache.
pub type EvictionCallback<K, V> = Box<dyn FnMut(&K, &V, EvictionReason) + Send>;

struct Node<K, V> {
    key: K,
    value: V,
    inserted_at: Duration,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Fixed-capacity, access-ordered cache with optional TTL.
///
/// Entries live in a slab threaded by a doubly linked recency list; the
/// hash map points into the slab, so lookups, promotion, insertion and
/// eviction are all O(1). The list head is the most recently used entry and
/// the tail the least, which also makes insertion order the tie-break among
/// entries that were never touched after insertion.
///
/// With a TTL, an entry is expired on its next touch once
/// `now - inserted_at > ttl`, however recently it was read. Updating an
/// entry through [`LruCache::put`] resets its insertion time.
///
/// # Example
///
/// ```
/// use keyward::cache::LruCache;
///
/// let mut cache = LruCache::new(2).unwrap();
/// cache.put("a", 1);
/// cache.put("b", 2);
/// cache.get(&"a");
/// cache.put("c", 3); // evicts "b", the least recently used
///
/// assert!(cache.contains(&"a"));
/// assert!(!cache.contains(&"b"));
/// ```
pub struct LruCache<K, V> {
    map: HashMap<K, usize>,
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    capacity: usize,
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
    on_evict: Option<EvictionCallback<K, V>>,
    stats: CacheStats,
}

impl<K, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("len", &self.map.len())
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("stats", &self.stats)
            .finish()
    }
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a cache holding at most `capacity` entries, without TTL
    pub fn new(capacity: usize) -> CryptoResult<Self> {
        if capacity == 0 {
            return Err(CryptoError::invalid_parameter(
                "capacity",
                "at least 1 entry",
                "0",
                error_codes::INVALID_CONFIGURATION,
            ));
        }
        Ok(Self {
            map: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
            capacity,
            ttl: None,
            clock: Arc::new(SystemClock),
            on_evict: None,
            stats: CacheStats::default(),
        })
    }

    /// Create a cache from configuration
    pub fn from_config(config: &CacheConfig) -> CryptoResult<Self> {
        config.validate()?;
        let mut cache = Self::new(config.capacity)?;
        cache.ttl = config.ttl;
        Ok(cache)
    }

    /// Expire entries older than `ttl`
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Read time from `clock` instead of the system clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Observe capacity and TTL evictions
    pub fn with_eviction_callback(mut self, callback: EvictionCallback<K, V>) -> Self {
        self.on_evict = Some(callback);
        self
    }

    /// Look up `key`, promoting it to most recently used on a hit
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.live_index(key) {
            Some(idx) => {
                self.stats.hits += 1;
                self.promote(idx);
                self.slots[idx].as_ref().map(|node| &node.value)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Look up `key` without changing its recency
    pub fn peek<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.live_index(key)?;
        self.slots[idx].as_ref().map(|node| &node.value)
    }

    /// Whether `key` is present and unexpired; does not promote
    pub fn contains<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.live_index(key).is_some()
    }

    /// Insert or update `key`, making it the most recently used entry.
    ///
    /// Returns the previous value for `key`, if there was a live one. When
    /// the cache is full, the least recently used entry is evicted first.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        let now = self.clock.now();

        if let Some(idx) = self.live_index(&key) {
            let previous = self.slots[idx].as_mut().map(|node| {
                node.inserted_at = now;
                std::mem::replace(&mut node.value, value)
            });
            self.promote(idx);
            self.stats.insertions += 1;
            return previous;
        }

        if self.map.len() >= self.capacity {
            if let Some(lru) = self.tail {
                self.evict(lru, EvictionReason::Capacity);
            }
        }

        let node = Node {
            key: key.clone(),
            value,
            inserted_at: now,
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.map.insert(key, idx);
        self.push_front(idx);
        self.stats.insertions += 1;
        None
    }

    /// Remove `key`, returning its value. Does not invoke the eviction callback.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        self.take(idx).map(|node| node.value)
    }

    /// Drop every entry. Does not invoke the eviction callback.
    pub fn clear(&mut self) {
        self.map.clear();
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
    }

    /// Evict every expired entry now rather than on next touch
    pub fn purge_expired(&mut self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let expired: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| match slot {
                Some(node) if self.is_expired(node) => Some(idx),
                _ => None,
            })
            .collect();
        for idx in &expired {
            self.evict(*idx, EvictionReason::Expired);
        }
        expired.len()
    }

    /// Keys from most to least recently used
    pub fn keys(&self) -> Vec<&K> {
        let mut keys = Vec::with_capacity(self.map.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            match &self.slots[idx] {
                Some(node) => {
                    keys.push(&node.key);
                    cursor = node.next;
                }
                None => break,
            }
        }
        keys
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Slot of `key` if present; an expired entry is evicted and reported absent
    fn live_index<Q>(&mut self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        let expired = self.slots[idx]
            .as_ref()
            .map_or(false, |node| self.is_expired(node));
        if expired {
            self.evict(idx, EvictionReason::Expired);
            return None;
        }
        Some(idx)
    }

    fn is_expired(&self, node: &Node<K, V>) -> bool {
        match self.ttl {
            Some(ttl) => self.clock.now().saturating_sub(node.inserted_at) > ttl,
            None => false,
        }
    }

    fn evict(&mut self, idx: usize, reason: EvictionReason) {
        if let Some(node) = self.take(idx) {
            match reason {
                EvictionReason::Capacity => self.stats.evictions += 1,
                EvictionReason::Expired => self.stats.expirations += 1,
            }
            log::debug!("lru cache evicted entry ({:?})", reason);
            if let Some(callback) = self.on_evict.as_mut() {
                callback(&node.key, &node.value, reason);
            }
        }
    }

    fn take(&mut self, idx: usize) -> Option<Node<K, V>> {
        self.unlink(idx);
        let node = self.slots.get_mut(idx)?.take()?;
        self.map.remove(&node.key);
        self.free.push(idx);
        Some(node)
    }

    fn promote(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match self.slots.get(idx).and_then(|slot| slot.as_ref()) {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.slots[p].as_mut() {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.slots[n].as_mut() {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.slots[idx].as_mut() {
            node.prev = None;
            node.next = None;
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(node) = self.slots[idx].as_mut() {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(node) = self.slots[h].as_mut() {
                node.prev = Some(idx);
            }
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }
}
