//! Field-change caches holding the last full value of each keyed message.

use std::collections::HashMap;
use std::hash::Hash;

use schema::PacketType;

use crate::value::{Message, MessageKey};

/// Last known value per identity key.
///
/// The cache owns its values. Replacing an entry drops the previous value;
/// readers borrow, the receive path takes ownership and reinserts.
#[derive(Debug, Clone)]
pub struct DeltaCache<K, V> {
    entries: HashMap<K, V>,
}

impl<K, V> Default for DeltaCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V> DeltaCache<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value without removing it.
    #[must_use]
    pub fn lookup(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Removes and returns the cached value.
    pub fn take(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    /// Stores `value`, dropping any previous value for `key`.
    pub fn insert(&mut self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One cache per packet type, created on first use.
#[derive(Debug, Clone, Default)]
pub struct CacheSet {
    caches: HashMap<PacketType, DeltaCache<MessageKey, Message>>,
}

impl CacheSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cache for `packet_type`, if one was created.
    #[must_use]
    pub fn cache(&self, packet_type: PacketType) -> Option<&DeltaCache<MessageKey, Message>> {
        self.caches.get(&packet_type)
    }

    /// Returns the cache for `packet_type`, creating it if needed.
    pub fn cache_mut(&mut self, packet_type: PacketType) -> &mut DeltaCache<MessageKey, Message> {
        self.caches.entry(packet_type).or_default()
    }

    /// Looks up a cached message.
    #[must_use]
    pub fn lookup(&self, packet_type: PacketType, key: &MessageKey) -> Option<&Message> {
        self.cache(packet_type).and_then(|cache| cache.lookup(key))
    }

    /// Removes one entry without creating a cache.
    pub fn remove(&mut self, packet_type: PacketType, key: &MessageKey) -> Option<Message> {
        self.caches
            .get_mut(&packet_type)
            .and_then(|cache| cache.remove(key))
    }

    /// Total number of cached messages over all packet types.
    #[must_use]
    pub fn entries(&self) -> usize {
        self.caches.values().map(DeltaCache::len).sum()
    }

    pub fn clear(&mut self) {
        self.caches.clear();
    }
}
