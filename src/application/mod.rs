//! Application services orchestrating domain logic and store adapters.

pub mod auth;
pub mod background;
pub mod error;
pub mod gateway;
pub mod stores;
