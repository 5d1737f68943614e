//! Store traits describing persistence adapters.
//!
//! The object store is the source of truth. The cache store holds derived,
//! disposable copies and may be emptied at any time without affecting
//! correctness.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Blob, ObjectKey};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt record for `{key}`: {message}")]
    Corrupt { key: String, message: String },
}

impl StoreError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }

    pub fn corrupt(key: &ObjectKey, message: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Durable key to blob storage.
///
/// Single operations must be atomic per key: readers observe either the
/// previous blob or the new one, never a partial write.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> Result<Option<Blob>, StoreError>;

    async fn put(&self, key: &ObjectKey, blob: Blob) -> Result<(), StoreError>;

    /// Deleting a missing key succeeds.
    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError>;
}

/// Monotonic stamp taken before the store operation a cache write derives
/// from. Later stamps win, so a slow population that read an old blob cannot
/// overwrite the result of a newer write or resurrect a deleted key.
pub type Generation = u64;

/// Derived copy of a blob tagged with the generation it was produced at.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub blob: Blob,
    pub generation: Generation,
}

/// Fast key to bytes storage for derived copies of blobs.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> Result<Option<Blob>, StoreError>;

    /// Store `entry` unless the key already holds an entry or a removal
    /// marker with a newer generation. Returns whether the entry was kept.
    async fn put(&self, key: &ObjectKey, entry: CacheEntry) -> Result<bool, StoreError>;

    /// Drop any entry for `key` older than or equal to `generation`.
    async fn remove(&self, key: &ObjectKey, generation: Generation) -> Result<(), StoreError>;
}
