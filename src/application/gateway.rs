//! Cache-aside access to the object store.
//!
//! Reads consult the cache first and fall back to the object store, then
//! populate the cache on a detached task. Writes and deletes go to the object
//! store; the cache is reconciled afterwards in the background. Failures in
//! background cache work are logged and dropped.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use metrics::counter;
use tracing::{debug, warn};

use crate::{
    application::{
        background::BackgroundTasks,
        error::GatewayError,
        stores::{CacheEntry, CacheStore, Generation, ObjectStore},
    },
    domain::{Blob, ObjectKey},
};

const SOURCE: &str = "blobgate::gateway";

/// How a successful PUT reconciles the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheWritePolicy {
    /// Refresh the cache with the new blob.
    #[default]
    WriteThrough,
    /// Evict the key; the next read repopulates it.
    Invalidate,
    /// Leave the cache untouched. A stale entry may outlive the write until
    /// the key is deleted or the entry is evicted for capacity.
    WriteAround,
}

impl CacheWritePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "write_through" => Some(Self::WriteThrough),
            "invalidate" => Some(Self::Invalidate),
            "write_around" => Some(Self::WriteAround),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    Cache,
    Store,
}

impl ReadSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ReadSource::Cache => "HIT",
            ReadSource::Store => "MISS",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub blob: Blob,
    pub source: ReadSource,
}

/// Cache tuning passed to [`Gateway::new`].
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub write_policy: CacheWritePolicy,
    /// Blobs larger than this are served but never cached.
    pub max_entry_bytes: usize,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            write_policy: CacheWritePolicy::default(),
            max_entry_bytes: 8 * 1024 * 1024,
        }
    }
}

#[derive(Clone)]
pub struct Gateway {
    objects: Arc<dyn ObjectStore>,
    cache: Option<Arc<dyn CacheStore>>,
    policy: CachePolicy,
    background: BackgroundTasks,
    generation: Arc<AtomicU64>,
}

impl Gateway {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        cache: Option<Arc<dyn CacheStore>>,
        policy: CachePolicy,
        background: BackgroundTasks,
    ) -> Self {
        Self {
            objects,
            cache,
            policy,
            background,
            generation: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }

    pub async fn read(&self, key: &ObjectKey) -> Result<ReadOutcome, GatewayError> {
        if let Some(cache) = &self.cache {
            match cache.get(key).await {
                Ok(Some(blob)) => {
                    counter!("blobgate_cache_hit_total").increment(1);
                    debug!(target = SOURCE, key = %key, cache = "hit", "serving cached object");
                    return Ok(ReadOutcome {
                        blob,
                        source: ReadSource::Cache,
                    });
                }
                Ok(None) => {
                    counter!("blobgate_cache_miss_total").increment(1);
                }
                Err(err) => {
                    counter!("blobgate_cache_miss_total").increment(1);
                    warn!(
                        target = SOURCE,
                        key = %key,
                        error = %err,
                        "cache lookup failed; falling back to object store"
                    );
                }
            }
        }

        // Stamped before the lookup so any mutation finishing later outranks it.
        let generation = self.next_generation();
        counter!("blobgate_store_read_total").increment(1);
        let blob = self
            .objects
            .get(key)
            .await?
            .ok_or_else(|| GatewayError::not_found(key))?;

        self.schedule_populate(key, &blob, generation);

        Ok(ReadOutcome {
            blob,
            source: ReadSource::Store,
        })
    }

    pub async fn write(&self, key: &ObjectKey, blob: Blob) -> Result<(), GatewayError> {
        self.objects.put(key, blob.clone()).await?;
        let generation = self.next_generation();
        debug!(target = SOURCE, key = %key, bytes = blob.len(), "stored object");

        match self.policy.write_policy {
            CacheWritePolicy::WriteThrough => self.schedule_populate(key, &blob, generation),
            CacheWritePolicy::Invalidate => self.schedule_evict(key, generation),
            CacheWritePolicy::WriteAround => {}
        }

        Ok(())
    }

    pub async fn delete(&self, key: &ObjectKey) -> Result<(), GatewayError> {
        self.objects.delete(key).await?;
        let generation = self.next_generation();
        debug!(target = SOURCE, key = %key, "deleted object");

        self.schedule_evict(key, generation);
        Ok(())
    }

    fn next_generation(&self) -> Generation {
        self.generation.fetch_add(1, Ordering::AcqRel)
    }

    fn schedule_populate(&self, key: &ObjectKey, blob: &Blob, generation: Generation) {
        let Some(cache) = self.cache.clone() else {
            return;
        };

        // An oversized blob must still displace whatever the key cached before.
        if blob.len() > self.policy.max_entry_bytes {
            debug!(
                target = SOURCE,
                key = %key,
                bytes = blob.len(),
                limit = self.policy.max_entry_bytes,
                "object exceeds cache entry limit"
            );
            self.schedule_evict(key, generation);
            return;
        }

        let key = key.clone();
        let entry = CacheEntry {
            blob: blob.clone(),
            generation,
        };
        self.background.spawn("cache_populate", async move {
            match cache.put(&key, entry).await {
                Ok(true) => debug!(target = SOURCE, key = %key, "cache populated"),
                Ok(false) => {
                    debug!(target = SOURCE, key = %key, "cache already holds a newer entry")
                }
                Err(err) => {
                    counter!("blobgate_cache_populate_failed_total").increment(1);
                    warn!(target = SOURCE, key = %key, error = %err, "cache population failed");
                }
            }
        });
    }

    fn schedule_evict(&self, key: &ObjectKey, generation: Generation) {
        let Some(cache) = self.cache.clone() else {
            return;
        };

        let key = key.clone();
        self.background.spawn("cache_evict", async move {
            if let Err(err) = cache.remove(&key, generation).await {
                warn!(target = SOURCE, key = %key, error = %err, "cache eviction failed");
            }
        });
    }
}
