//! Object keys.
//!
//! A key is supplied by the caller and names exactly one object in both the
//! object store and the cache store. Keys are opaque to the gateway apart
//! from the validation below, which keeps them usable as relative paths by
//! filesystem-backed adapters.

use std::fmt;

use thiserror::Error;

const MAX_KEY_BYTES: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("object key is empty")]
    Empty,
    #[error("object key exceeds {MAX_KEY_BYTES} bytes")]
    TooLong,
    #[error("object key must not start with `/`")]
    Absolute,
    #[error("object key contains an empty, `.` or `..` segment")]
    InvalidSegment,
    #[error("object key contains a forbidden character")]
    ForbiddenCharacter,
}

/// Validated object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn parse(raw: impl Into<String>) -> Result<Self, KeyError> {
        let raw = raw.into();

        if raw.is_empty() {
            return Err(KeyError::Empty);
        }
        if raw.len() > MAX_KEY_BYTES {
            return Err(KeyError::TooLong);
        }
        if raw.starts_with('/') {
            return Err(KeyError::Absolute);
        }
        if raw.chars().any(|ch| ch == '\\' || ch.is_control()) {
            return Err(KeyError::ForbiddenCharacter);
        }
        if raw
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(KeyError::InvalidSegment);
        }

        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}
