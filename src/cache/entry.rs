//! Cache entries and key derivation

use crate::cache::PageData;
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

/// Length of a cache key in hex characters
pub const KEY_LENGTH: usize = 16;

/// Derives the storage key of a page: first 16 hex chars of SHA-256 of `project:page`
pub fn cache_key(project: &str, page: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(project.as_bytes());
    hasher.update(b":");
    hasher.update(page.as_bytes());
    let mut key = hex::encode(hasher.finalize());
    key.truncate(KEY_LENGTH);
    key
}

/// One cached page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Project the page belongs to
    pub project: String,

    /// Page name as shown in the page list
    pub page: String,

    /// When the entry was written
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,

    /// Extracted address -> variable pairs
    pub data: PageData,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time
    pub fn new(project: &str, page: &str, data: PageData) -> Self {
        Self {
            project: project.to_string(),
            page: page.to_string(),
            timestamp: Utc::now(),
            data,
        }
    }

    /// Age of the entry at `now`
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }

    /// Returns true if the entry is younger than `ttl` at `now`
    pub fn is_fresh_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age_at(now) < ttl
    }

    /// Returns true if the entry is younger than `ttl` right now
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.is_fresh_at(Utc::now(), ttl)
    }
}

/// Accepts RFC 3339 timestamps and the naive local ISO-8601 form written by
/// earlier versions of the tool (`2024-05-01T10:15:30.123456`)
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|ts| ts.with_timezone(&Utc))
}
