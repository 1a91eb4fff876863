//! Storage adapter contract and shared predicate helpers.
//!
//! Each physical medium implements [`StorageAdapter`] once. Shared logic
//! (expiry checks, query matching, result ordering) lives in free functions
//! taking entries as plain data, so no adapter re-implements it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use strata_core::{
    CacheEntry, CacheQuery, CacheValue, EntryMetadata, SortDirection, SortField, StrataResult,
};

/// Uniform interface over a single physical storage medium.
///
/// # Failure duty
///
/// A write rejected by the medium for capacity must trigger one internal
/// `cleanup()` pass and exactly one retry before surfacing
/// [`AdapterError::CapacityExceeded`](strata_core::AdapterError).
/// A malformed stored payload reads as a miss; the corrupted key is queued
/// for removal and purged during `cleanup()`, never raised to the caller.
///
/// # Access metadata
///
/// `get` records the access (bumps `access_count`, refreshes
/// `last_accessed`) on the resident entry; `peek` never mutates anything.
/// Neither filters by expiry: expiry policy belongs to the orchestrator.
#[async_trait]
pub trait StorageAdapter<V: CacheValue>: Send + Sync {
    /// The layer name this adapter serves.
    fn name(&self) -> &str;

    /// Read an entry and record the access.
    async fn get(&self, key: &str) -> StrataResult<Option<CacheEntry<V>>>;

    /// Read an entry without touching its access metadata.
    async fn peek(&self, key: &str) -> StrataResult<Option<CacheEntry<V>>>;

    /// Store an entry, replacing any prior one for the key.
    ///
    /// Returns the keys the adapter evicted to make room (empty in the
    /// common case).
    async fn set(&self, entry: CacheEntry<V>) -> StrataResult<Vec<String>>;

    /// Remove an entry. Returns whether the key existed.
    async fn delete(&self, key: &str) -> StrataResult<bool>;

    /// Remove entries whose keys match `pattern`, or all entries when no
    /// pattern is given. Returns the number removed.
    async fn clear(&self, pattern: Option<&Regex>) -> StrataResult<u64>;

    /// Return entries matching the query predicates. Expired entries are
    /// included; sorting and pagination are applied by the orchestrator.
    async fn query(&self, query: &CacheQuery) -> StrataResult<Vec<CacheEntry<V>>>;

    /// Purge expired entries and any queued corrupted keys. Returns the
    /// number purged.
    async fn cleanup(&self) -> StrataResult<u64>;

    /// Total payload size estimate in bytes.
    async fn size_bytes(&self) -> StrataResult<u64>;

    /// Number of resident keys.
    async fn key_count(&self) -> StrataResult<u64>;

    /// Key of the oldest resident entry by creation time.
    async fn oldest(&self) -> StrataResult<Option<String>>;

    /// Key of the newest resident entry by creation time.
    async fn newest(&self) -> StrataResult<Option<String>>;

    /// Key of the most-accessed resident entry.
    async fn most_accessed(&self) -> StrataResult<Option<String>>;

    /// Key of the largest resident entry.
    async fn largest(&self) -> StrataResult<Option<String>>;

    /// Whether this medium benefits from compaction.
    fn supports_defragment(&self) -> bool {
        false
    }

    /// Compact the medium. A no-op unless `supports_defragment` is true.
    async fn defragment(&self) -> StrataResult<()> {
        Ok(())
    }

    /// Release the medium. Later operations fail with `Closed`.
    async fn close(&self) -> StrataResult<()>;

    /// Whether a live (non-expired) entry for `key` is resident.
    async fn contains(&self, key: &str) -> StrataResult<bool> {
        let now = Utc::now();
        Ok(self
            .peek(key)
            .await?
            .map(|entry| !entry.is_expired(now))
            .unwrap_or(false))
    }
}

/// Whether metadata describes an expired entry as of `now`.
pub fn is_expired(metadata: &EntryMetadata, now: DateTime<Utc>) -> bool {
    metadata.is_expired(now)
}

/// Whether an entry satisfies the query's predicates.
///
/// The compiled pattern is passed in so a fan-out compiles it once, not per
/// layer. Expiry is deliberately not checked here.
pub fn entry_matches<V: CacheValue>(
    entry: &CacheEntry<V>,
    query: &CacheQuery,
    pattern: Option<&Regex>,
    now: DateTime<Utc>,
) -> bool {
    if let Some(regex) = pattern {
        if !regex.is_match(&entry.key) {
            return false;
        }
    }
    if !query.tags.is_empty() {
        let has_all = query
            .tags
            .iter()
            .all(|tag| entry.metadata.tags.iter().any(|t| t == tag));
        if !has_all {
            return false;
        }
    }
    if let Some(min) = query.min_size_bytes {
        if entry.metadata.size_bytes < min {
            return false;
        }
    }
    if let Some(max) = query.max_size_bytes {
        if entry.metadata.size_bytes > max {
            return false;
        }
    }
    if let Some(max_age) = query.max_age {
        if entry.metadata.age(now) > max_age {
            return false;
        }
    }
    true
}

/// Sort entries by the query's sort directives.
///
/// The ordering is total and deterministic: ties on the sort field break by
/// key in ascending lexical order regardless of direction.
pub fn sort_entries<V: CacheValue>(
    entries: &mut [CacheEntry<V>],
    field: SortField,
    direction: SortDirection,
) {
    entries.sort_by(|a, b| {
        let primary = match field {
            SortField::Key => a.key.cmp(&b.key),
            SortField::CreatedAt => a.metadata.created_at.cmp(&b.metadata.created_at),
            SortField::UpdatedAt => a.metadata.updated_at.cmp(&b.metadata.updated_at),
            SortField::LastAccessed => a.metadata.last_accessed.cmp(&b.metadata.last_accessed),
            SortField::AccessCount => a.metadata.access_count.cmp(&b.metadata.access_count),
            SortField::Size => a.metadata.size_bytes.cmp(&b.metadata.size_bytes),
        };
        let primary = match direction {
            SortDirection::Ascending => primary,
            SortDirection::Descending => primary.reverse(),
        };
        primary.then_with(|| a.key.cmp(&b.key))
    });
}

/// Serialized-size estimate used for `size_bytes` metadata.
pub fn estimate_size<V: CacheValue>(value: &V) -> u64 {
    serde_json::to_vec(value).map(|v| v.len() as u64).unwrap_or(0)
}
