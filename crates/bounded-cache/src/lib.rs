//! Bounded Cache
//!
//! Provides a capacity-limited key/value store with oldest-inserted-first eviction.

mod cache;

pub use cache::{BoundedCache, UNBOUNDED};

use thiserror::Error;

/// Errors returned by cache lookups
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Key is not resident (never inserted, or already evicted)
    #[error("Key not found in cache")]
    NotFound,
}
