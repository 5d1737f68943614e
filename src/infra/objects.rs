//! Object store adapters.
//!
//! [`FsObjectStore`] is the durable backend: each blob is written to a
//! temporary file and renamed into place, so readers observe either the
//! previous record or the new one. [`MemoryObjectStore`] keeps blobs in a map
//! and suits tests and throwaway deployments.

use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use sha2::{Digest, Sha256};
use tokio::{fs, io::AsyncWriteExt, sync::RwLock};
use tracing::warn;
use uuid::Uuid;

use crate::application::stores::{ObjectStore, StoreError};
use crate::domain::{Blob, ObjectKey};

const RECORD_MAGIC: &[u8; 4] = b"BGO1";
const HEADER_LEN: usize = RECORD_MAGIC.len() + 2;
const OBJECTS_DIR: &str = "objects";
const STAGING_DIR: &str = "staging";

/// Filesystem-backed object store.
///
/// Records live under `objects/<aa>/<sha256(key)>`, where `aa` is the first
/// byte of the digest. Hashing keeps arbitrary keys (including ones that
/// are prefixes of other keys) from colliding with directory structure.
#[derive(Debug)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(root.join(OBJECTS_DIR))?;
        std::fs::create_dir_all(root.join(STAGING_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &ObjectKey) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_str().as_bytes()));
        self.root.join(OBJECTS_DIR).join(&digest[..2]).join(digest)
    }

    fn staging_path(&self) -> PathBuf {
        self.root
            .join(STAGING_DIR)
            .join(Uuid::new_v4().simple().to_string())
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<Blob>, StoreError> {
        match fs::read(self.record_path(key)).await {
            Ok(raw) => decode_record(key, Bytes::from(raw)).map(Some),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    async fn put(&self, key: &ObjectKey, blob: Blob) -> Result<(), StoreError> {
        let target = self.record_path(key);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let staging = self.staging_path();
        let record = encode_record(key, &blob)?;

        let written = async {
            let mut file = fs::File::create(&staging).await?;
            file.write_all(&record).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&staging, &target).await
        }
        .await;

        if let Err(err) = written {
            if let Err(cleanup) = fs::remove_file(&staging).await
                && cleanup.kind() != ErrorKind::NotFound
            {
                warn!(
                    target = "blobgate::objects",
                    path = %staging.display(),
                    error = %cleanup,
                    "failed to remove staging file"
                );
            }
            return Err(StoreError::Io(err));
        }

        Ok(())
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        match fs::remove_file(self.record_path(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Io(err)),
        }
    }
}

// Record layout: magic, u16 big-endian content-type length, content type, payload.
fn encode_record(key: &ObjectKey, blob: &Blob) -> Result<Bytes, StoreError> {
    let content_type = blob.content_type.as_deref().unwrap_or("").as_bytes();
    let content_type_len = u16::try_from(content_type.len())
        .map_err(|_| StoreError::corrupt(key, "content type exceeds 65535 bytes"))?;

    let mut buf = BytesMut::with_capacity(HEADER_LEN + content_type.len() + blob.len());
    buf.put_slice(RECORD_MAGIC);
    buf.put_u16(content_type_len);
    buf.put_slice(content_type);
    buf.put_slice(&blob.bytes);
    Ok(buf.freeze())
}

fn decode_record(key: &ObjectKey, raw: Bytes) -> Result<Blob, StoreError> {
    if raw.len() < HEADER_LEN || &raw[..RECORD_MAGIC.len()] != RECORD_MAGIC {
        return Err(StoreError::corrupt(key, "missing record header"));
    }

    let content_type_len =
        u16::from_be_bytes([raw[RECORD_MAGIC.len()], raw[RECORD_MAGIC.len() + 1]]) as usize;
    let payload_start = HEADER_LEN + content_type_len;
    if raw.len() < payload_start {
        return Err(StoreError::corrupt(key, "truncated content type"));
    }

    let content_type = std::str::from_utf8(&raw[HEADER_LEN..payload_start])
        .map_err(|_| StoreError::corrupt(key, "content type is not utf-8"))?
        .to_string();

    Ok(Blob::new(raw.slice(payload_start..), Some(content_type)))
}

/// Map-backed object store.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    blobs: RwLock<HashMap<ObjectKey, Blob>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<Blob>, StoreError> {
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn put(&self, key: &ObjectKey, blob: Blob) -> Result<(), StoreError> {
        self.blobs.write().await.insert(key.clone(), blob);
        Ok(())
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        self.blobs.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> ObjectKey {
        ObjectKey::parse(raw).expect("valid key")
    }

    #[tokio::test]
    async fn fs_store_roundtrips_payload_and_content_type() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsObjectStore::new(dir.path().to_path_buf()).expect("store");
        let k = key("assets/logo.png");
        let blob = Blob::new(
            Bytes::from_static(&[0x89, b'P', b'N', b'G', 0, 1, 2]),
            Some("image/png".to_string()),
        );

        store.put(&k, blob.clone()).await.expect("put");
        let loaded = store.get(&k).await.expect("get").expect("present");

        assert_eq!(loaded, blob);
    }

    #[tokio::test]
    async fn fs_store_overwrites_and_deletes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsObjectStore::new(dir.path().to_path_buf()).expect("store");
        let k = key("notes.txt");

        store
            .put(&k, Blob::new(Bytes::from_static(b"first"), None))
            .await
            .expect("put first");
        store
            .put(&k, Blob::new(Bytes::from_static(b"second"), None))
            .await
            .expect("put second");

        let loaded = store.get(&k).await.expect("get").expect("present");
        assert_eq!(loaded.bytes, Bytes::from_static(b"second"));
        assert!(loaded.content_type.is_none());

        store.delete(&k).await.expect("delete");
        assert!(store.get(&k).await.expect("get").is_none());
        store.delete(&k).await.expect("delete is idempotent");
    }

    #[tokio::test]
    async fn fs_store_keeps_prefix_keys_apart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsObjectStore::new(dir.path().to_path_buf()).expect("store");

        store
            .put(&key("a"), Blob::new(Bytes::from_static(b"parent"), None))
            .await
            .expect("put a");
        store
            .put(&key("a/b"), Blob::new(Bytes::from_static(b"child"), None))
            .await
            .expect("put a/b");

        let parent = store.get(&key("a")).await.expect("get").expect("a");
        let child = store.get(&key("a/b")).await.expect("get").expect("a/b");
        assert_eq!(parent.bytes, Bytes::from_static(b"parent"));
        assert_eq!(child.bytes, Bytes::from_static(b"child"));
    }

    #[tokio::test]
    async fn fs_store_leaves_no_staging_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsObjectStore::new(dir.path().to_path_buf()).expect("store");

        store
            .put(&key("x"), Blob::new(Bytes::from_static(b"x"), None))
            .await
            .expect("put");

        let staged = std::fs::read_dir(store.root().join(STAGING_DIR))
            .expect("staging dir")
            .count();
        assert_eq!(staged, 0);
    }

    #[tokio::test]
    async fn fs_store_reports_corrupt_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsObjectStore::new(dir.path().to_path_buf()).expect("store");
        let k = key("broken");

        let path = store.record_path(&k);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, b"nope").expect("write garbage");

        assert!(matches!(
            store.get(&k).await,
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryObjectStore::new();
        let k = key("m");

        assert!(store.get(&k).await.expect("get").is_none());
        store
            .put(&k, Blob::new(Bytes::from_static(b"v"), None))
            .await
            .expect("put");
        assert_eq!(store.len().await, 1);

        store.delete(&k).await.expect("delete");
        assert!(store.is_empty().await);
    }
}
