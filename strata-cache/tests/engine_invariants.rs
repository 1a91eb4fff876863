//! Cross-layer behavior of the cache engine through its public surface.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use strata_cache::{LayeredCache, MemoryAdapter, SetOptions, StorageAdapter};
use strata_core::{
    AdapterError, CacheEntry, CacheQuery, CacheSettings, ConsistencyLevel, IsolationLevel,
    LayerConfig, LayerLimits, MediumKind, StrataError, StrataResult, TransactionError,
};

/// Delegating adapter that rejects writes of one designated key. Used to
/// force a failure mid-way through a multi-operation commit.
struct FailingKeyAdapter {
    inner: MemoryAdapter<String>,
    poison_key: String,
}

impl FailingKeyAdapter {
    fn new(name: &str, poison_key: &str) -> Self {
        Self {
            inner: MemoryAdapter::new(name, LayerLimits::default()),
            poison_key: poison_key.to_string(),
        }
    }
}

#[async_trait]
impl StorageAdapter<String> for FailingKeyAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get(&self, key: &str) -> StrataResult<Option<CacheEntry<String>>> {
        self.inner.get(key).await
    }

    async fn peek(&self, key: &str) -> StrataResult<Option<CacheEntry<String>>> {
        self.inner.peek(key).await
    }

    async fn set(&self, entry: CacheEntry<String>) -> StrataResult<Vec<String>> {
        if entry.key == self.poison_key {
            return Err(AdapterError::Unavailable {
                layer: self.name().to_string(),
                reason: "write rejected".to_string(),
            }
            .into());
        }
        self.inner.set(entry).await
    }

    async fn delete(&self, key: &str) -> StrataResult<bool> {
        self.inner.delete(key).await
    }

    async fn clear(&self, pattern: Option<&Regex>) -> StrataResult<u64> {
        self.inner.clear(pattern).await
    }

    async fn query(&self, query: &CacheQuery) -> StrataResult<Vec<CacheEntry<String>>> {
        self.inner.query(query).await
    }

    async fn cleanup(&self) -> StrataResult<u64> {
        self.inner.cleanup().await
    }

    async fn size_bytes(&self) -> StrataResult<u64> {
        self.inner.size_bytes().await
    }

    async fn key_count(&self) -> StrataResult<u64> {
        self.inner.key_count().await
    }

    async fn oldest(&self) -> StrataResult<Option<String>> {
        self.inner.oldest().await
    }

    async fn newest(&self) -> StrataResult<Option<String>> {
        self.inner.newest().await
    }

    async fn most_accessed(&self) -> StrataResult<Option<String>> {
        self.inner.most_accessed().await
    }

    async fn largest(&self) -> StrataResult<Option<String>> {
        self.inner.largest().await
    }

    async fn close(&self) -> StrataResult<()> {
        self.inner.close().await
    }
}

fn quiet_settings() -> CacheSettings {
    CacheSettings::new()
        .with_cleanup_interval(Duration::ZERO)
        .with_consistency(ConsistencyLevel::Weak)
}

fn memory_layer(name: &str, priority: u32) -> (LayerConfig, Arc<dyn StorageAdapter<String>>) {
    (
        LayerConfig::new(name, MediumKind::Memory, priority),
        Arc::new(MemoryAdapter::new(name, LayerLimits::default())),
    )
}

fn three_tier() -> (
    LayeredCache<String>,
    Vec<Arc<dyn StorageAdapter<String>>>,
) {
    let mut builder = LayeredCache::builder(quiet_settings());
    let mut adapters = Vec::new();
    for (i, name) in ["hot", "warm", "cold"].iter().enumerate() {
        let (config, adapter) = memory_layer(name, i as u32);
        adapters.push(Arc::clone(&adapter));
        builder = builder.layer(config, adapter);
    }
    (builder.build().unwrap(), adapters)
}

#[tokio::test]
async fn hit_promotes_into_every_faster_layer() {
    let (cache, adapters) = three_tier();
    cache.set("k", "v".to_string()).await.unwrap();

    // Evict from the two fast tiers, leaving only the cold copy.
    adapters[0].delete("k").await.unwrap();
    adapters[1].delete("k").await.unwrap();

    assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
    for adapter in &adapters {
        assert!(
            adapter.peek("k").await.unwrap().is_some(),
            "layer {} missing the promoted entry",
            adapter.name()
        );
    }
}

#[tokio::test]
async fn expired_entries_are_never_returned() {
    let (cache, adapters) = three_tier();
    cache
        .set_with(
            "soon",
            "v".to_string(),
            SetOptions::new().with_ttl(Duration::from_millis(5)),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(cache.get("soon").await.unwrap(), None);

    // Queries drop expired entries too, even though adapters still hold them.
    let results = cache.query(&CacheQuery::all()).await.unwrap();
    assert!(results.is_empty());
    let _ = adapters;
}

#[tokio::test]
async fn version_increases_on_every_rewrite_in_all_layers() {
    let (cache, adapters) = three_tier();
    for i in 0..3 {
        cache.set("k", format!("v{i}")).await.unwrap();
    }
    for adapter in &adapters {
        let entry = adapter.peek("k").await.unwrap().unwrap();
        assert_eq!(entry.metadata.version, 3, "layer {}", adapter.name());
        assert_eq!(entry.value, "v2");
    }
}

#[tokio::test]
async fn write_through_reaches_the_lowest_priority_layer() {
    let (cache, adapters) = three_tier();
    cache.set("k", "v".to_string()).await.unwrap();
    let cold = adapters.last().unwrap();
    assert!(cold.peek("k").await.unwrap().is_some());
}

#[tokio::test]
async fn failed_commit_reverses_the_applied_prefix() {
    let layer: Arc<dyn StorageAdapter<String>> =
        Arc::new(FailingKeyAdapter::new("flaky", "poison"));
    let cache = LayeredCache::builder(quiet_settings())
        .layer(LayerConfig::new("flaky", MediumKind::Memory, 0), layer)
        .build()
        .unwrap();

    let tx = cache.begin_transaction(IsolationLevel::ReadCommitted);
    cache.transaction_set(tx, "a", "1".to_string()).unwrap();
    cache.transaction_set(tx, "b", "2".to_string()).unwrap();
    cache.transaction_set(tx, "poison", "3".to_string()).unwrap();
    cache.transaction_set(tx, "d", "4".to_string()).unwrap();

    let err = cache.commit_transaction(tx).await.unwrap_err();
    assert!(matches!(
        err,
        StrataError::Transaction(TransactionError::CommitFailed { .. })
    ));

    // The two writes applied before the failure were rolled back; the one
    // after it was never attempted.
    assert_eq!(cache.get("a").await.unwrap(), None);
    assert_eq!(cache.get("b").await.unwrap(), None);
    assert_eq!(cache.get("d").await.unwrap(), None);

    // The transaction reached a terminal state.
    let err = cache.commit_transaction(tx).await.unwrap_err();
    assert!(matches!(
        err,
        StrataError::Transaction(TransactionError::NotOpen { .. })
    ));
}

#[tokio::test]
async fn clear_is_idempotent() {
    let (cache, adapters) = three_tier();
    for i in 0..4 {
        cache.set(&format!("k{i}"), "v".to_string()).await.unwrap();
    }

    let first = cache.clear(None).await.unwrap();
    assert!(first > 0);
    for adapter in &adapters {
        assert_eq!(adapter.key_count().await.unwrap(), 0);
    }
    let second = cache.clear(None).await.unwrap();
    assert_eq!(second, 0);
    assert!(cache.query(&CacheQuery::all()).await.unwrap().is_empty());
}

#[tokio::test]
async fn query_prefers_the_fastest_copy_of_a_key() {
    let (cache, adapters) = three_tier();
    cache.set("k", "fresh".to_string()).await.unwrap();

    // Make the cold copy diverge; the merged result must come from hot.
    let cold = adapters.last().unwrap();
    let mut stale = cold.peek("k").await.unwrap().unwrap();
    stale.value = "stale".to_string();
    cold.set(stale).await.unwrap();

    let results = cache.query(&CacheQuery::all()).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].value, "fresh");
}
