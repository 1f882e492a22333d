//! In-memory response cache.
//!
//! This module provides the `CacheStore` the dispatcher consults before
//! touching the network. Entries live for the lifetime of the owning client;
//! there is no eviction besides a full clear, which every successful write
//! performs.

pub mod key;
pub mod store;

pub use key::CacheKey;
pub use store::{CacheEntry, CacheStore};
