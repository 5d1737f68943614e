//! Stored payloads and the content tags derived from them.

use std::fmt;

use bytes::Bytes;
use sha2::{Digest, Sha256};

/// Durable record held by the object store.
///
/// Blobs are replaced or deleted wholesale, never mutated in place. The cache
/// keeps clones of the same value, which share the underlying buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

impl Blob {
    pub fn new(bytes: impl Into<Bytes>, content_type: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.filter(|value| !value.trim().is_empty()),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Strong entity tag computed from a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTag(String);

impl ContentTag {
    pub fn compute(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        Self(hex::encode(digest))
    }

    /// Opaque tag value without quotes.
    pub fn opaque(&self) -> &str {
        &self.0
    }

    /// Header form, e.g. `"9f86d0..."`.
    pub fn to_header_value(&self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Evaluate an `If-None-Match` header against this tag.
    ///
    /// Uses weak comparison: a `W/` prefix on a candidate is ignored.
    pub fn matches_if_none_match(&self, header: &str) -> bool {
        header.split(',').map(str::trim).any(|candidate| {
            if candidate == "*" {
                return true;
            }
            let candidate = candidate.strip_prefix("W/").unwrap_or(candidate);
            candidate
                .strip_prefix('"')
                .and_then(|rest| rest.strip_suffix('"'))
                .is_some_and(|opaque| opaque == self.0)
        })
    }
}

impl fmt::Display for ContentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_content_type_is_dropped() {
        let blob = Blob::new(Bytes::from_static(b"x"), Some("  ".to_string()));
        assert!(blob.content_type.is_none());
    }

    #[test]
    fn tag_is_sha256_hex() {
        let tag = ContentTag::compute(b"test");
        assert_eq!(
            tag.opaque(),
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
        assert_eq!(tag.to_header_value(), format!("\"{}\"", tag.opaque()));
    }

    #[test]
    fn if_none_match_accepts_lists_wildcards_and_weak_tags() {
        let tag = ContentTag::compute(b"payload");
        let quoted = tag.to_header_value();

        assert!(tag.matches_if_none_match(&quoted));
        assert!(tag.matches_if_none_match(&format!("\"other\", {quoted}")));
        assert!(tag.matches_if_none_match(&format!("W/{quoted}")));
        assert!(tag.matches_if_none_match("*"));
        assert!(!tag.matches_if_none_match("\"other\""));
        assert!(!tag.matches_if_none_match(tag.opaque()));
    }
}
