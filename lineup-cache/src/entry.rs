//! Cache entries and the metadata returned with every read.

use chrono::{DateTime, Utc};
use lineup_core::CacheKey;
use serde_json::Value;
use std::time::Duration;

/// Lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    /// Data was stored by a successful load and nothing has invalidated it.
    Fresh,
    /// Data may be outdated; the next read refetches but may still show it.
    Stale,
    /// A load is in flight. Previous data, if any, is still present.
    Fetching,
    /// The first load failed and there is no data to fall back on.
    Error,
}

/// One cached resource.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub data: Option<Value>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub state: EntryState,
    /// Last load failure, kept for observability even when old data is served.
    pub error_info: Option<String>,
}

impl CacheEntry {
    /// Placeholder created by the first read of a key.
    pub(crate) fn pending(key: CacheKey) -> Self {
        Self {
            key,
            data: None,
            fetched_at: None,
            state: EntryState::Fetching,
            error_info: None,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.state == EntryState::Fresh
    }

    pub fn is_stale(&self) -> bool {
        self.state == EntryState::Stale
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Age of the data at `now`, `None` if never fetched.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        let fetched_at = self.fetched_at?;
        Some(
            now.signed_duration_since(fetched_at)
                .to_std()
                .unwrap_or(Duration::ZERO),
        )
    }

    /// Fresh and younger than `stale_time`.
    pub fn is_servable(&self, now: DateTime<Utc>, stale_time: Duration) -> bool {
        if self.state != EntryState::Fresh || self.data.is_none() {
            return false;
        }
        matches!(self.age(now), Some(age) if age < stale_time)
    }
}

/// Result of a read, carrying where the value came from.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    fetched_at: DateTime<Utc>,
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    pub fn from_cache(value: T, fetched_at: DateTime<Utc>) -> Self {
        Self {
            value,
            fetched_at,
            was_cache_hit: true,
        }
    }

    pub fn from_network(value: T, fetched_at: DateTime<Utc>) -> Self {
        Self {
            value,
            fetched_at,
            was_cache_hit: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            fetched_at: self.fetched_at,
            was_cache_hit: self.was_cache_hit,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}
