//! In-memory cache layer.
//!
//! Holds derived copies of blobs for fast reads. Entries are disposable: the
//! object store can answer every read if the cache is emptied.
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 1024
//! max_entry_bytes = 8388608
//! write_policy = "write_through"
//! ```

mod config;
mod lock;
mod store;

pub use config::CacheConfig;
pub use store::LruCacheStore;
