//! In-memory LRU implementation of the cache store.

use std::sync::Mutex;

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;

use crate::application::stores::{CacheEntry, CacheStore, Generation, StoreError};
use crate::domain::{Blob, ObjectKey};

use super::config::CacheConfig;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

enum Slot {
    Entry(CacheEntry),
    /// Left behind by a removal so older populations cannot resurrect the key.
    Removed(Generation),
}

impl Slot {
    fn generation(&self) -> Generation {
        match self {
            Slot::Entry(entry) => entry.generation,
            Slot::Removed(generation) => *generation,
        }
    }
}

/// Bounded cache of blobs keyed by object key.
///
/// Eviction is least-recently-used and counts removal markers towards the
/// capacity. Each operation holds the lock for a single map access, which
/// gives per-key atomicity without coordinating with the object store.
///
/// Evicting a slot forgets what the key last held, so the highest evicted
/// generation becomes a floor: a key with no slot only accepts writes at or
/// above it.
pub struct LruCacheStore {
    entries: Mutex<Slots>,
}

struct Slots {
    lru: LruCache<ObjectKey, Slot>,
    floor: Generation,
}

impl Slots {
    fn raise_floor(&mut self, generation: Generation) {
        self.floor = self.floor.max(generation);
    }
}

impl LruCacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(Slots {
                lru: LruCache::new(config.capacity_non_zero()),
                floor: 0,
            }),
        }
    }

    /// Number of live entries, excluding removal markers.
    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len")
            .lru
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Entry(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut slots = mutex_lock(&self.entries, SOURCE, "clear");
        let newest = slots.lru.iter().map(|(_, slot)| slot.generation()).max();
        if let Some(newest) = newest {
            slots.raise_floor(newest);
        }
        slots.lru.clear();
    }

    fn insert(&self, key: &ObjectKey, slot: Slot) -> bool {
        let mut slots = mutex_lock(&self.entries, SOURCE, "insert");
        let newest_known = match slots.lru.peek(key) {
            Some(existing) => existing.generation(),
            None => slots.floor,
        };
        if newest_known > slot.generation() {
            return false;
        }

        if let Some((evicted, dropped)) = slots.lru.push(key.clone(), slot)
            && &evicted != key
        {
            slots.raise_floor(dropped.generation());
            counter!("blobgate_cache_evict_total").increment(1);
        }
        true
    }
}

#[async_trait]
impl CacheStore for LruCacheStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<Blob>, StoreError> {
        let mut slots = mutex_lock(&self.entries, SOURCE, "get");
        Ok(match slots.lru.get(key) {
            Some(Slot::Entry(entry)) => Some(entry.blob.clone()),
            Some(Slot::Removed(_)) | None => None,
        })
    }

    async fn put(&self, key: &ObjectKey, entry: CacheEntry) -> Result<bool, StoreError> {
        Ok(self.insert(key, Slot::Entry(entry)))
    }

    async fn remove(&self, key: &ObjectKey, generation: Generation) -> Result<(), StoreError> {
        self.insert(key, Slot::Removed(generation));
        Ok(())
    }
}
