//! JSON file backed cache
//!
//! The whole cache lives in memory and is mirrored to a single JSON object
//! `{key: entry}` on disk. Every mutation rewrites the file through a
//! temporary sibling and a rename, so a crash between pages leaves either the
//! old or the new file, never a torn one. A mutation reaches memory only
//! after its write succeeded. There is no cross-process locking.

use crate::cache::entry::{cache_key, CacheEntry};
use crate::cache::{CacheResult, CacheStore, PageData};
use crate::logger::Logger;
use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default cache file name
pub const DEFAULT_CACHE_FILE: &str = "eplan_cache.json";

/// Default time-to-live of an entry, in hours
pub const DEFAULT_TTL_HOURS: u32 = 24;

/// Write-through cache persisted as one JSON file
pub struct JsonFileCache {
    path: PathBuf,
    ttl: Duration,
    entries: Mutex<BTreeMap<String, CacheEntry>>,
    logger: Arc<dyn Logger>,
}

impl JsonFileCache {
    /// Opens the cache at `path`, loading any existing entries
    ///
    /// A missing or empty file yields an empty cache. A file that cannot be
    /// read or parsed is logged as a warning and also yields an empty cache.
    pub fn open(path: impl Into<PathBuf>, ttl_hours: u32, logger: Arc<dyn Logger>) -> Self {
        let path = path.into();
        let entries = load_entries(&path, logger.as_ref());

        Self {
            path,
            ttl: Duration::hours(i64::from(ttl_hours)),
            entries: Mutex::new(entries),
            logger,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a copy of the stored entry for a page, expired or not
    pub fn entry(&self, project: &str, page: &str) -> Option<CacheEntry> {
        self.lock().get(&cache_key(project, page)).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, entries: &BTreeMap<String, CacheEntry>) -> CacheResult<()> {
        let json = serde_json::to_string_pretty(entries)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CacheStore for JsonFileCache {
    fn get(&self, project: &str, page: &str) -> Option<PageData> {
        let entries = self.lock();
        let entry = entries.get(&cache_key(project, page))?;

        if entry.is_fresh(self.ttl) {
            self.logger.debug(&format!("Cache hit for page: {}", page));
            Some(entry.data.clone())
        } else {
            None
        }
    }

    fn set(&self, project: &str, page: &str, data: &PageData) -> CacheResult<()> {
        let mut entries = self.lock();
        let mut next = entries.clone();
        next.insert(
            cache_key(project, page),
            CacheEntry::new(project, page, data.clone()),
        );
        self.persist(&next)?;
        *entries = next;
        self.logger.debug(&format!("Cached data for page: {}", page));
        Ok(())
    }

    fn clear(&self, project: Option<&str>) -> CacheResult<usize> {
        let mut entries = self.lock();
        let next: BTreeMap<String, CacheEntry> = match project {
            None => BTreeMap::new(),
            Some(project) => entries
                .iter()
                .filter(|(_, e)| e.project != project)
                .map(|(k, e)| (k.clone(), e.clone()))
                .collect(),
        };

        let removed = entries.len() - next.len();
        self.persist(&next)?;
        *entries = next;
        self.logger
            .info(&format!("Cleared {} cache entries", removed));
        Ok(removed)
    }

    fn cleanup_expired(&self) -> CacheResult<usize> {
        let mut entries = self.lock();
        let now = Utc::now();
        let next: BTreeMap<String, CacheEntry> = entries
            .iter()
            .filter(|(_, e)| e.is_fresh_at(now, self.ttl))
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect();

        let removed = entries.len() - next.len();
        if removed > 0 {
            self.persist(&next)?;
            *entries = next;
            self.logger
                .info(&format!("Cleaned up {} expired cache entries", removed));
        }
        Ok(removed)
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

fn load_entries(path: &Path, logger: &dyn Logger) -> BTreeMap<String, CacheEntry> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            logger.warning(&format!("Failed to load cache: {}", e));
            return BTreeMap::new();
        }
    };

    if content.trim().is_empty() {
        return BTreeMap::new();
    }

    match serde_json::from_str::<BTreeMap<String, CacheEntry>>(&content) {
        Ok(entries) => {
            logger.debug(&format!("Loaded {} cache entries", entries.len()));
            entries
        }
        Err(e) => {
            logger.warning(&format!("Failed to load cache: {}", e));
            BTreeMap::new()
        }
    }
}
