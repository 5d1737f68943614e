//! Cache configuration.

use std::num::NonZeroUsize;

use crate::application::gateway::{CachePolicy, CacheWritePolicy};

const DEFAULT_CAPACITY: usize = 1024;
const DEFAULT_MAX_ENTRY_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Serve reads through the in-memory cache.
    pub enabled: bool,
    /// Maximum number of keys tracked, including removal markers.
    pub capacity: usize,
    /// Blobs larger than this are never cached.
    pub max_entry_bytes: usize,
    pub write_policy: CacheWritePolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
            write_policy: CacheWritePolicy::default(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity.get(),
            max_entry_bytes: settings.max_entry_bytes,
            write_policy: settings.write_policy,
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn policy(&self) -> CachePolicy {
        CachePolicy {
            write_policy: self.write_policy,
            max_entry_bytes: self.max_entry_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.capacity, 1024);
        assert_eq!(config.max_entry_bytes, 8 * 1024 * 1024);
        assert_eq!(config.write_policy, CacheWritePolicy::WriteThrough);
    }

    #[test]
    fn zero_capacity_clamps_to_one() {
        let config = CacheConfig {
            capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.capacity_non_zero().get(), 1);
    }
}
