//! Background maintenance tasks.
//!
//! Both loops hold a clone of the cache handle, so they keep the inner
//! cache alive until [`destroy`](crate::LayeredCache::destroy) aborts them.
//! Errors inside a tick are logged and the loop keeps running; a transient
//! layer failure must not kill maintenance for good.

use std::time::Duration;

use strata_core::CacheValue;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::LayeredCache;

/// Spawn the periodic expiry sweep.
pub fn spawn_cleanup<V: CacheValue>(
    cache: LayeredCache<V>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so a freshly built
        // cache is not swept before it holds anything.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match cache.cleanup().await {
                Ok(purged) if purged > 0 => {
                    debug!(purged, "cleanup sweep purged expired entries");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "cleanup sweep failed"),
            }
        }
    })
}

/// Spawn the eventual-consistency synchronizer.
///
/// Only started when the cache runs at
/// [`ConsistencyLevel::Eventual`](strata_core::ConsistencyLevel).
pub fn spawn_synchronizer<V: CacheValue>(
    cache: LayeredCache<V>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = cache.synchronize().await {
                warn!(error = %e, "synchronizer pass failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::StorageAdapter;
    use crate::engine::{LayeredCache, SetOptions};
    use crate::memory::MemoryAdapter;
    use std::sync::Arc;
    use strata_core::{
        CacheSettings, ConsistencyLevel, LayerConfig, LayerLimits, MediumKind, WritePolicy,
    };

    #[tokio::test]
    async fn test_cleanup_task_purges_expired_entries() {
        let hot: Arc<dyn StorageAdapter<String>> =
            Arc::new(MemoryAdapter::new("hot", LayerLimits::default()));
        let cache = LayeredCache::builder(
            CacheSettings::new()
                .with_consistency(ConsistencyLevel::Weak)
                .with_cleanup_interval(Duration::from_millis(20)),
        )
        .layer(
            LayerConfig::new("hot", MediumKind::Memory, 0),
            Arc::clone(&hot),
        )
        .build()
        .unwrap();

        cache
            .set_with(
                "stale",
                "v".to_string(),
                SetOptions::new().with_ttl(Duration::from_millis(1)),
            )
            .await
            .unwrap();

        for _ in 0..50 {
            if hot.peek("stale").await.unwrap().is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(hot.peek("stale").await.unwrap().is_none());
        cache.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn test_synchronizer_task_cascades_between_layers() {
        let hot: Arc<dyn StorageAdapter<String>> =
            Arc::new(MemoryAdapter::new("hot", LayerLimits::default()));
        let cold: Arc<dyn StorageAdapter<String>> =
            Arc::new(MemoryAdapter::new("cold", LayerLimits::default()));
        let cache = LayeredCache::builder(
            CacheSettings::new()
                .with_write_policy(WritePolicy::Back)
                .with_cleanup_interval(Duration::ZERO)
                .with_sync_interval(Duration::from_millis(20)),
        )
        .layer(
            LayerConfig::new("hot", MediumKind::Memory, 0),
            Arc::clone(&hot),
        )
        .layer(
            LayerConfig::new("cold", MediumKind::Memory, 1),
            Arc::clone(&cold),
        )
        .build()
        .unwrap();

        cache.set("k", "v".to_string()).await.unwrap();
        cold.clear(None).await.unwrap();

        for _ in 0..50 {
            if cold.peek("k").await.unwrap().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(cold.peek("k").await.unwrap().is_some());
        cache.destroy().await.unwrap();
    }
}
