//! Domain layer types and invariants.

pub mod blob;
pub mod key;

pub use blob::{Blob, ContentTag};
pub use key::{KeyError, ObjectKey};
