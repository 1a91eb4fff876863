//! Cache entries and their metadata.
//!
//! A [`CacheEntry`] is the unit stored by every layer adapter. The entry is
//! owned by the layer that stores it; copies of the same key may exist in
//! several layers at once, which is the point of tiering. The `version`
//! counter is tracked per key across layers so that the latest write always
//! wins during synchronization.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

/// Marker trait for values that can be cached.
///
/// Values must serialize (persistent layers store JSON payloads), clone
/// (promotion copies entries between layers), and cross task boundaries.
/// The trait is blanket-implemented; there is nothing to implement by hand.
pub trait CacheValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Relative priority of an entry within a layer, used as an eviction hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// Metadata carried by every cache entry.
///
/// Invariants:
/// - `expires_at >= created_at`
/// - `access_count` is monotonically non-decreasing while the entry is
///   resident in a given layer
/// - `version` increments on every value replacement for the key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
    /// Serialized-size estimate in bytes.
    pub size_bytes: u64,
    pub tags: Vec<String>,
    pub priority: EntryPriority,
    pub version: u64,
}

impl EntryMetadata {
    /// Create metadata for a freshly written entry.
    pub fn new(
        now: DateTime<Utc>,
        ttl: Duration,
        size_bytes: u64,
        tags: Vec<String>,
        priority: EntryPriority,
        version: u64,
    ) -> Self {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            created_at: now,
            updated_at: now,
            expires_at,
            last_accessed: now,
            access_count: 0,
            size_bytes,
            tags,
            priority,
            version,
        }
    }

    /// Whether the entry has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Record an access: bump the counter and the last-access time.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed = now;
    }

    /// Age of the entry since creation.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// A keyed cache entry: the value plus its metadata and optional checksum.
///
/// The checksum is filled in by persistent adapters at write time and
/// verified on read; in-memory adapters leave it as `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub metadata: EntryMetadata,
    pub checksum: Option<String>,
}

impl<V: CacheValue> CacheEntry<V> {
    /// Create an entry with the given metadata and no checksum.
    pub fn new(key: impl Into<String>, value: V, metadata: EntryMetadata) -> Self {
        Self {
            key: key.into(),
            value,
            metadata,
            checksum: None,
        }
    }

    /// Whether the entry has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.metadata.is_expired(now)
    }
}
