//! In-memory storage adapter.
//!
//! The fastest tier: a `HashMap` behind an `RwLock`. No lock is ever held
//! across an await point; all guards live for the duration of one
//! synchronous critical section.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use strata_core::{
    AdapterError, CacheEntry, CacheQuery, CacheValue, LayerLimits, StrataResult,
};

use crate::adapter::{entry_matches, StorageAdapter};

/// Process-local map adapter with LRU eviction.
///
/// Eviction order when the layer is over its limits: lowest entry priority
/// first, then least-recently-accessed.
pub struct MemoryAdapter<V> {
    name: String,
    limits: LayerLimits,
    inner: RwLock<HashMap<String, CacheEntry<V>>>,
    closed: AtomicBool,
}

impl<V: CacheValue> MemoryAdapter<V> {
    /// Create an adapter with the given layer name and limits.
    pub fn new(name: impl Into<String>, limits: LayerLimits) -> Self {
        Self {
            name: name.into(),
            limits,
            inner: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> StrataResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AdapterError::Closed {
                layer: self.name.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn read_guard(&self) -> StrataResult<RwLockReadGuard<'_, HashMap<String, CacheEntry<V>>>> {
        self.inner
            .read()
            .map_err(|_| AdapterError::LockPoisoned.into())
    }

    fn write_guard(&self) -> StrataResult<RwLockWriteGuard<'_, HashMap<String, CacheEntry<V>>>> {
        self.inner
            .write()
            .map_err(|_| AdapterError::LockPoisoned.into())
    }

    fn purge_expired(map: &mut HashMap<String, CacheEntry<V>>, now: DateTime<Utc>) -> u64 {
        let before = map.len();
        map.retain(|_, entry| !entry.is_expired(now));
        (before - map.len()) as u64
    }

    fn total_size(map: &HashMap<String, CacheEntry<V>>) -> u64 {
        map.values().map(|e| e.metadata.size_bytes).sum()
    }

    /// Whether `map` can take an additional entry of `incoming_bytes`.
    fn fits(&self, map: &HashMap<String, CacheEntry<V>>, incoming_bytes: u64) -> bool {
        if self.limits.max_entries > 0 && map.len() >= self.limits.max_entries {
            return false;
        }
        if self.limits.max_size_bytes > 0
            && Self::total_size(map) + incoming_bytes > self.limits.max_size_bytes
        {
            return false;
        }
        true
    }

    /// Evict the lowest-priority, least-recently-accessed entry.
    fn evict_one(map: &mut HashMap<String, CacheEntry<V>>) -> Option<String> {
        let victim = map
            .values()
            .min_by(|a, b| {
                a.metadata
                    .priority
                    .cmp(&b.metadata.priority)
                    .then(a.metadata.last_accessed.cmp(&b.metadata.last_accessed))
                    .then(a.key.cmp(&b.key))
            })?
            .key
            .clone();
        map.remove(&victim);
        Some(victim)
    }
}

#[async_trait]
impl<V: CacheValue> StorageAdapter<V> for MemoryAdapter<V> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> StrataResult<Option<CacheEntry<V>>> {
        self.ensure_open()?;
        let mut map = self.write_guard()?;
        Ok(map.get_mut(key).map(|entry| {
            entry.metadata.touch(Utc::now());
            entry.clone()
        }))
    }

    async fn peek(&self, key: &str) -> StrataResult<Option<CacheEntry<V>>> {
        self.ensure_open()?;
        Ok(self.read_guard()?.get(key).cloned())
    }

    async fn set(&self, entry: CacheEntry<V>) -> StrataResult<Vec<String>> {
        self.ensure_open()?;
        let incoming = entry.metadata.size_bytes;
        let mut map = self.write_guard()?;

        // Replacement of an existing key never needs room for a second copy.
        map.remove(&entry.key);

        if !self.fits(&map, incoming) {
            // One local cleanup pass, then one retry.
            Self::purge_expired(&mut map, Utc::now());
        }

        let mut evicted = Vec::new();
        while !self.fits(&map, incoming) {
            match Self::evict_one(&mut map) {
                Some(key) => evicted.push(key),
                None => {
                    // Nothing left to evict: the entry alone exceeds the limits.
                    return Err(AdapterError::CapacityExceeded {
                        layer: self.name.clone(),
                        needed_bytes: incoming,
                    }
                    .into());
                }
            }
        }

        map.insert(entry.key.clone(), entry);
        Ok(evicted)
    }

    async fn delete(&self, key: &str) -> StrataResult<bool> {
        self.ensure_open()?;
        Ok(self.write_guard()?.remove(key).is_some())
    }

    async fn clear(&self, pattern: Option<&Regex>) -> StrataResult<u64> {
        self.ensure_open()?;
        let mut map = self.write_guard()?;
        let before = map.len();
        match pattern {
            None => map.clear(),
            Some(regex) => map.retain(|key, _| !regex.is_match(key)),
        }
        Ok((before - map.len()) as u64)
    }

    async fn query(&self, query: &CacheQuery) -> StrataResult<Vec<CacheEntry<V>>> {
        self.ensure_open()?;
        let pattern = query.compiled_pattern()?;
        let now = Utc::now();
        Ok(self
            .read_guard()?
            .values()
            .filter(|entry| entry_matches(entry, query, pattern.as_ref(), now))
            .cloned()
            .collect())
    }

    async fn cleanup(&self) -> StrataResult<u64> {
        self.ensure_open()?;
        let mut map = self.write_guard()?;
        Ok(Self::purge_expired(&mut map, Utc::now()))
    }

    async fn size_bytes(&self) -> StrataResult<u64> {
        self.ensure_open()?;
        let map = self.read_guard()?;
        Ok(Self::total_size(&map))
    }

    async fn key_count(&self) -> StrataResult<u64> {
        self.ensure_open()?;
        Ok(self.read_guard()?.len() as u64)
    }

    async fn oldest(&self) -> StrataResult<Option<String>> {
        self.ensure_open()?;
        Ok(self
            .read_guard()?
            .values()
            .min_by_key(|e| e.metadata.created_at)
            .map(|e| e.key.clone()))
    }

    async fn newest(&self) -> StrataResult<Option<String>> {
        self.ensure_open()?;
        Ok(self
            .read_guard()?
            .values()
            .max_by_key(|e| e.metadata.created_at)
            .map(|e| e.key.clone()))
    }

    async fn most_accessed(&self) -> StrataResult<Option<String>> {
        self.ensure_open()?;
        Ok(self
            .read_guard()?
            .values()
            .max_by_key(|e| e.metadata.access_count)
            .map(|e| e.key.clone()))
    }

    async fn largest(&self) -> StrataResult<Option<String>> {
        self.ensure_open()?;
        Ok(self
            .read_guard()?
            .values()
            .max_by_key(|e| e.metadata.size_bytes)
            .map(|e| e.key.clone()))
    }

    async fn close(&self) -> StrataResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut map) = self.inner.write() {
            map.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use strata_core::EntryPriority;
    use strata_test_utils::entry_with;

    fn adapter(max_entries: usize) -> MemoryAdapter<String> {
        MemoryAdapter::new(
            "memory",
            LayerLimits {
                max_entries,
                max_size_bytes: 0,
                ttl: None,
            },
        )
    }

    fn entry(key: &str, ttl: Duration) -> CacheEntry<String> {
        entry_with(key, format!("value-{key}"), ttl, 1)
    }

    #[tokio::test]
    async fn test_set_then_get_roundtrip() {
        let adapter = adapter(0);
        adapter.set(entry("a", Duration::from_secs(60))).await.unwrap();

        let got = adapter.get("a").await.unwrap().unwrap();
        assert_eq!(got.value, "value-a");
        assert_eq!(got.metadata.access_count, 1);
    }

    #[tokio::test]
    async fn test_peek_does_not_touch_access_metadata() {
        let adapter = adapter(0);
        adapter.set(entry("a", Duration::from_secs(60))).await.unwrap();

        let peeked = adapter.peek("a").await.unwrap().unwrap();
        assert_eq!(peeked.metadata.access_count, 0);

        adapter.get("a").await.unwrap();
        let after = adapter.peek("a").await.unwrap().unwrap();
        assert_eq!(after.metadata.access_count, 1);
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let adapter = adapter(2);
        adapter.set(entry("a", Duration::from_secs(60))).await.unwrap();
        adapter.set(entry("b", Duration::from_secs(60))).await.unwrap();

        // Touch "a" so "b" becomes the LRU victim.
        adapter.get("a").await.unwrap();

        let evicted = adapter.set(entry("c", Duration::from_secs(60))).await.unwrap();
        assert_eq!(evicted, vec!["b".to_string()]);
        assert!(adapter.peek("a").await.unwrap().is_some());
        assert!(adapter.peek("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_capacity_prefers_expired_over_eviction() {
        let adapter = adapter(2);
        adapter.set(entry("stale", Duration::ZERO)).await.unwrap();
        adapter.set(entry("live", Duration::from_secs(60))).await.unwrap();

        let evicted = adapter.set(entry("new", Duration::from_secs(60))).await.unwrap();
        assert!(evicted.is_empty());
        assert!(adapter.peek("live").await.unwrap().is_some());
        assert!(adapter.peek("stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_low_priority_evicted_first() {
        let adapter = adapter(2);
        let mut low = entry("low", Duration::from_secs(60));
        low.metadata.priority = EntryPriority::Low;
        let mut high = entry("high", Duration::from_secs(60));
        high.metadata.priority = EntryPriority::High;

        adapter.set(high).await.unwrap();
        adapter.set(low).await.unwrap();

        let evicted = adapter.set(entry("new", Duration::from_secs(60))).await.unwrap();
        assert_eq!(evicted, vec!["low".to_string()]);
    }

    #[tokio::test]
    async fn test_single_entry_over_limit_is_rejected() {
        let adapter: MemoryAdapter<String> = MemoryAdapter::new(
            "tiny",
            LayerLimits {
                max_entries: 0,
                max_size_bytes: 4,
                ttl: None,
            },
        );
        let err = adapter
            .set(entry("big", Duration::from_secs(60)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            strata_core::StrataError::Adapter(AdapterError::CapacityExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn test_clear_with_pattern_removes_matching_only() {
        let adapter = adapter(0);
        adapter.set(entry("user:1", Duration::from_secs(60))).await.unwrap();
        adapter.set(entry("user:2", Duration::from_secs(60))).await.unwrap();
        adapter.set(entry("session:1", Duration::from_secs(60))).await.unwrap();

        let regex = Regex::new("^user:").unwrap();
        let removed = adapter.clear(Some(&regex)).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(adapter.key_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_purges_expired() {
        let adapter = adapter(0);
        adapter.set(entry("stale", Duration::ZERO)).await.unwrap();
        adapter.set(entry("live", Duration::from_secs(60))).await.unwrap();

        let purged = adapter.cleanup().await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(adapter.key_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_size_bytes_sums_resident_entries() {
        let adapter = adapter(0);
        adapter.set(entry("a", Duration::from_secs(60))).await.unwrap();
        adapter.set(entry("bb", Duration::from_secs(60))).await.unwrap();

        let expected: u64 = ["a", "bb"]
            .iter()
            .map(|k| format!("value-{k}").len() as u64)
            .sum();
        assert_eq!(adapter.size_bytes().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_introspection() {
        let adapter = adapter(0);
        adapter.set(entry("a", Duration::from_secs(60))).await.unwrap();
        adapter.set(entry("b", Duration::from_secs(60))).await.unwrap();
        adapter.get("b").await.unwrap();

        assert_eq!(adapter.most_accessed().await.unwrap().as_deref(), Some("b"));
        assert!(adapter.oldest().await.unwrap().is_some());
        assert!(adapter.newest().await.unwrap().is_some());
        assert!(adapter.largest().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_closed_adapter_rejects_operations() {
        let adapter = adapter(0);
        adapter.close().await.unwrap();
        let err = adapter.get("a").await.unwrap_err();
        assert!(matches!(
            err,
            strata_core::StrataError::Adapter(AdapterError::Closed { .. })
        ));
    }
}
