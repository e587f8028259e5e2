//! Page cache for extracted diagram data
//!
//! This module keeps extracted pages across runs so a re-run only visits
//! pages that are new or whose entry has expired:
//! - `CacheStore` is the interface the extraction loop talks to
//! - `JsonFileCache` persists every entry in one JSON file, write-through
//! - `DisabledCache` stands in when caching is switched off

mod entry;
mod json_file;

pub use entry::{cache_key, CacheEntry};
pub use json_file::{JsonFileCache, DEFAULT_CACHE_FILE, DEFAULT_TTL_HOURS};

use std::collections::BTreeMap;
use thiserror::Error;

/// Extracted data of one page: address -> variable name
pub type PageData = BTreeMap<String, String>;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// TTL-bounded store of extracted page data keyed by `(project, page)`
///
/// Implementations must be safe to call from the extraction worker and a
/// controlling thread at the same time.
pub trait CacheStore: Send + Sync {
    /// Returns the cached data if an entry exists and has not expired
    ///
    /// Expired entries are left in place.
    fn get(&self, project: &str, page: &str) -> Option<PageData>;

    /// Stores `data` for the page with a fresh timestamp and persists it
    fn set(&self, project: &str, page: &str, data: &PageData) -> CacheResult<()>;

    /// Removes all entries, or only those of `project`; returns how many went
    fn clear(&self, project: Option<&str>) -> CacheResult<usize>;

    /// Removes entries older than the TTL; returns how many went
    fn cleanup_expired(&self) -> CacheResult<usize>;

    /// Number of entries currently held, expired ones included
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache that never holds anything
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCache;

impl CacheStore for DisabledCache {
    fn get(&self, _project: &str, _page: &str) -> Option<PageData> {
        None
    }

    fn set(&self, _project: &str, _page: &str, _data: &PageData) -> CacheResult<()> {
        Ok(())
    }

    fn clear(&self, _project: Option<&str>) -> CacheResult<usize> {
        Ok(0)
    }

    fn cleanup_expired(&self) -> CacheResult<usize> {
        Ok(0)
    }

    fn len(&self) -> usize {
        0
    }
}
