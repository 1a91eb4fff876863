//! The layered cache orchestrator.
//!
//! [`LayeredCache`] owns the layer registry, metrics, event bus, transaction
//! registry, and background maintenance tasks. Operations are per-key; no
//! cross-entry locking exists. Per-layer failures are absorbed wherever the
//! active policy allows partial success (read scans, delete/clear fan-out)
//! and surfaced where it does not (write-through, transaction commit).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use std::collections::HashSet;
use std::future::Future;
use strata_core::{
    CacheEntry, CacheEvent, CacheEventKind, CacheQuery, CacheSettings, CacheValue, ConfigError,
    ConsistencyLevel, EntryMetadata, EntryPriority, IsolationLevel, LayerConfig, StrataError,
    StrataResult, TransactionError, WritePolicy,
};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::adapter::{estimate_size, sort_entries, StorageAdapter};
use crate::events::{EventBus, ListenerId};
use crate::metrics::{MetricsRecorder, MetricsSnapshot, OperationKind};
use crate::registry::{Layer, LayerRegistry, OrderedLayer};
use crate::sync;
use crate::transaction::{TransactionOp, TransactionStore};

/// Keys loaded concurrently per warmup batch.
const WARMUP_BATCH_SIZE: usize = 10;

/// Per-write options.
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// TTL for this entry; the cache default applies when absent.
    pub ttl: Option<Duration>,
    pub tags: Vec<String>,
    pub priority: EntryPriority,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_priority(mut self, priority: EntryPriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Introspection report for one layer.
#[derive(Debug, Clone)]
pub struct LayerReport {
    pub name: String,
    pub priority: u32,
    pub enabled: bool,
    pub online: bool,
    pub key_count: u64,
    pub size_bytes: u64,
    pub oldest: Option<String>,
    pub newest: Option<String>,
    pub most_accessed: Option<String>,
    pub largest: Option<String>,
}

/// Snapshot of the whole cache's layer state.
#[derive(Debug, Clone)]
pub struct CacheInspection {
    pub layers: Vec<LayerReport>,
}

struct CacheInner<V: CacheValue> {
    settings: CacheSettings,
    registry: RwLock<LayerRegistry<V>>,
    metrics: MetricsRecorder,
    events: EventBus,
    transactions: TransactionStore<V>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

/// Multi-tier cache engine.
///
/// Cheap to clone: clones share one underlying cache instance. The caller's
/// composition root owns the lifetime and must call [`destroy`](Self::destroy)
/// on shutdown to stop background tasks and close the layer adapters.
pub struct LayeredCache<V: CacheValue> {
    inner: Arc<CacheInner<V>>,
}

impl<V: CacheValue> Clone for LayeredCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Builder collecting layers before the cache starts.
pub struct LayeredCacheBuilder<V: CacheValue> {
    settings: CacheSettings,
    layers: Vec<Layer<V>>,
}

impl<V: CacheValue> LayeredCacheBuilder<V> {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            settings,
            layers: Vec::new(),
        }
    }

    /// Add a layer backed by an already-initialized adapter.
    pub fn layer(mut self, config: LayerConfig, adapter: Arc<dyn StorageAdapter<V>>) -> Self {
        self.layers.push(Layer {
            config,
            adapter,
            online: true,
        });
        self
    }

    /// Add a layer whose adapter may have failed to initialize.
    ///
    /// A failed medium is recorded offline and excluded from lookup without
    /// aborting startup of the other layers.
    pub fn try_layer(
        mut self,
        config: LayerConfig,
        init: StrataResult<Arc<dyn StorageAdapter<V>>>,
    ) -> Self {
        match init {
            Ok(adapter) => {
                self.layers.push(Layer {
                    config,
                    adapter,
                    online: true,
                });
            }
            Err(e) => {
                warn!(layer = %config.name, error = %e, "layer failed to initialize, excluded");
                self.layers.push(Layer {
                    adapter: Arc::new(crate::memory::MemoryAdapter::new(
                        config.name.clone(),
                        config.limits.clone(),
                    )),
                    config: LayerConfig {
                        enabled: false,
                        ..config
                    },
                    online: false,
                });
            }
        }
        self
    }

    /// Validate configuration, start background maintenance, and return the
    /// running cache. Must be called within a tokio runtime.
    pub fn build(self) -> StrataResult<LayeredCache<V>> {
        self.settings.validate()?;
        let registry = LayerRegistry::new(self.layers)?;

        let cache = LayeredCache {
            inner: Arc::new(CacheInner {
                settings: self.settings,
                registry: RwLock::new(registry),
                metrics: MetricsRecorder::new(),
                events: EventBus::new(),
                transactions: TransactionStore::new(),
                tasks: Mutex::new(Vec::new()),
                destroyed: AtomicBool::new(false),
            }),
        };

        let mut tasks = Vec::new();
        if !cache.inner.settings.cleanup_interval.is_zero() {
            tasks.push(sync::spawn_cleanup(
                cache.clone(),
                cache.inner.settings.cleanup_interval,
            ));
        }
        if cache.inner.settings.consistency == ConsistencyLevel::Eventual {
            tasks.push(sync::spawn_synchronizer(
                cache.clone(),
                cache.inner.settings.sync_interval,
            ));
        }
        if let Ok(mut slot) = cache.inner.tasks.lock() {
            *slot = tasks;
        }

        Ok(cache)
    }
}

impl<V: CacheValue> LayeredCache<V> {
    /// Start building a cache with the given settings.
    pub fn builder(settings: CacheSettings) -> LayeredCacheBuilder<V> {
        LayeredCacheBuilder::new(settings)
    }

    /// The cache-wide settings.
    pub fn settings(&self) -> &CacheSettings {
        &self.inner.settings
    }

    fn ordering(&self) -> Arc<Vec<OrderedLayer<V>>> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
            .ordering()
    }

    fn layer_snapshot(&self) -> Vec<(LayerConfig, bool, Arc<dyn StorageAdapter<V>>)> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
            .snapshot()
    }

    /// Flag a layer offline after a failed operation on an absorbable path.
    fn flag_offline(&self, name: &str, error: &StrataError) {
        warn!(layer = name, error = %error, "layer operation failed, taking layer offline");
        let changed = self
            .inner
            .registry
            .write()
            .unwrap_or_else(|poison| poison.into_inner())
            .mark_offline(name);
        if changed {
            self.inner.events.emit(&CacheEvent::error(error.to_string()));
            self.inner.events.emit(&CacheEvent::layer_offline(name));
        }
    }

    /// Enable or disable a layer at runtime. Enabling brings an offline
    /// layer back into the lookup order.
    pub fn set_layer_enabled(&self, name: &str, enabled: bool) -> bool {
        let changed = self
            .inner
            .registry
            .write()
            .unwrap_or_else(|poison| poison.into_inner())
            .set_enabled(name, enabled);
        if changed {
            let event = if enabled {
                CacheEvent::layer_online(name)
            } else {
                CacheEvent::layer_offline(name)
            };
            self.inner.events.emit(&event);
        }
        changed
    }

    // ------------------------------------------------------------------
    // Core operations
    // ------------------------------------------------------------------

    /// Look up a key, promoting the entry into faster tiers on a hit.
    pub async fn get(&self, key: &str) -> StrataResult<Option<V>> {
        let started = Instant::now();
        let result = self.get_inner(key).await;
        self.inner
            .metrics
            .record_operation(OperationKind::Get, started.elapsed(), result.is_ok());
        result
    }

    async fn get_inner(&self, key: &str) -> StrataResult<Option<V>> {
        let order = self.ordering();
        let now = Utc::now();

        for (position, layer) in order.iter().enumerate() {
            let entry = match layer.adapter.get(key).await {
                Ok(entry) => entry,
                Err(e) => {
                    self.flag_offline(&layer.name, &e);
                    continue;
                }
            };
            let Some(entry) = entry else { continue };

            if entry.is_expired(now) {
                // Lazy expiry: schedule removal in this layer and keep
                // scanning lower-priority layers. The deferred task
                // re-checks the resident entry so a fresh write for the
                // same key landing in between is never clobbered.
                let adapter = Arc::clone(&layer.adapter);
                let stale_key = key.to_string();
                tokio::spawn(async move {
                    if let Ok(Some(current)) = adapter.peek(&stale_key).await {
                        if current.is_expired(Utc::now()) {
                            let _ = adapter.delete(&stale_key).await;
                        }
                    }
                });
                self.inner.events.emit(&CacheEvent::expire(key, &layer.name));
                continue;
            }

            // Promote into every layer closer to the caller that lacks a
            // live copy.
            for target in &order[..position] {
                match target.adapter.contains(key).await {
                    Ok(true) => {}
                    Ok(false) => match target.adapter.set(entry.clone()).await {
                        Ok(evicted) => self.emit_evictions(&target.name, &evicted),
                        Err(e) => {
                            warn!(layer = %target.name, key, error = %e, "promotion failed");
                        }
                    },
                    Err(e) => {
                        warn!(layer = %target.name, key, error = %e, "promotion check failed");
                    }
                }
            }

            self.inner.metrics.record_hit();
            self.inner.events.emit(&CacheEvent::hit(key, &layer.name));
            return Ok(Some(entry.value));
        }

        self.inner.metrics.record_miss();
        self.inner.events.emit(&CacheEvent::miss(key));
        Ok(None)
    }

    /// Store a value with default options.
    pub async fn set(&self, key: &str, value: V) -> StrataResult<()> {
        self.set_with(key, value, SetOptions::default()).await
    }

    /// Store a value under the configured write policy.
    ///
    /// Write-around normally skips the fastest tier. With a single
    /// configured layer it degrades to writing that sole layer, so the
    /// value is never dropped on the floor.
    pub async fn set_with(&self, key: &str, value: V, options: SetOptions) -> StrataResult<()> {
        let started = Instant::now();
        let result = self.set_inner(key, value, options).await;
        self.inner
            .metrics
            .record_operation(OperationKind::Set, started.elapsed(), result.is_ok());
        result
    }

    async fn set_inner(&self, key: &str, value: V, options: SetOptions) -> StrataResult<()> {
        let order = self.ordering();
        if order.is_empty() {
            return Err(ConfigError::NoLayers.into());
        }

        let now = Utc::now();
        let version = self.next_version(&order, key, now).await;
        let ttl = options.ttl.unwrap_or(self.inner.settings.default_ttl);
        let metadata = EntryMetadata::new(
            now,
            ttl,
            estimate_size(&value),
            options.tags,
            options.priority,
            version,
        );
        let entry = CacheEntry::new(key, value, metadata);

        match self.inner.settings.write_policy {
            WritePolicy::Through => {
                // Every enabled layer, synchronously; the first failure
                // aborts and surfaces, earlier layers are left as written.
                for layer in order.iter() {
                    let scoped = clamp_ttl(entry.clone(), layer.ttl_override, now);
                    match layer.adapter.set(scoped).await {
                        Ok(evicted) => self.emit_evictions(&layer.name, &evicted),
                        Err(e) => {
                            self.inner.events.emit(&CacheEvent::error(e.to_string()));
                            return Err(e);
                        }
                    }
                }
            }
            WritePolicy::Back => {
                // Highest-priority layer synchronously, the rest in the
                // background.
                let front = &order[0];
                let scoped = clamp_ttl(entry.clone(), front.ttl_override, now);
                let evicted = front.adapter.set(scoped).await?;
                self.emit_evictions(&front.name, &evicted);

                if order.len() > 1 {
                    let cache = self.clone();
                    let rest = order.clone();
                    let entry = entry.clone();
                    tokio::spawn(async move {
                        for layer in rest.iter().skip(1) {
                            let scoped = clamp_ttl(entry.clone(), layer.ttl_override, now);
                            match layer.adapter.set(scoped).await {
                                Ok(evicted) => cache.emit_evictions(&layer.name, &evicted),
                                Err(e) => {
                                    warn!(layer = %layer.name, key = %entry.key, error = %e,
                                          "write-back propagation failed");
                                }
                            }
                        }
                    });
                }
            }
            WritePolicy::Around => {
                // Skip the fast tier unless it is the only layer at all.
                let targets: Vec<_> = if order.len() == 1 {
                    order.iter().collect()
                } else {
                    order.iter().skip(1).collect()
                };
                for layer in targets {
                    let scoped = clamp_ttl(entry.clone(), layer.ttl_override, now);
                    match layer.adapter.set(scoped).await {
                        Ok(evicted) => self.emit_evictions(&layer.name, &evicted),
                        Err(e) => {
                            self.inner.events.emit(&CacheEvent::error(e.to_string()));
                            return Err(e);
                        }
                    }
                }
            }
        }

        self.inner.events.emit(&CacheEvent::set(key));
        Ok(())
    }

    /// The version the next write of `key` should carry: one past the
    /// highest live version resident in any layer.
    async fn next_version(
        &self,
        order: &[OrderedLayer<V>],
        key: &str,
        now: chrono::DateTime<Utc>,
    ) -> u64 {
        let mut prior = 0u64;
        for layer in order {
            match layer.adapter.peek(key).await {
                Ok(Some(existing)) if !existing.is_expired(now) => {
                    prior = prior.max(existing.metadata.version);
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(layer = %layer.name, key, error = %e, "version scan skipped layer");
                }
            }
        }
        prior + 1
    }

    fn emit_evictions(&self, layer: &str, evicted: &[String]) {
        for key in evicted {
            self.inner.events.emit(&CacheEvent::evict(key, layer));
        }
    }

    /// Delete a key from every enabled layer.
    ///
    /// Returns true when at least one layer reported the key existed.
    pub async fn delete(&self, key: &str) -> StrataResult<bool> {
        let started = Instant::now();
        let result = self.delete_inner(key).await;
        self.inner
            .metrics
            .record_operation(OperationKind::Delete, started.elapsed(), result.is_ok());
        result
    }

    async fn delete_inner(&self, key: &str) -> StrataResult<bool> {
        let order = self.ordering();
        let mut existed = false;
        for layer in order.iter() {
            match layer.adapter.delete(key).await {
                Ok(found) => existed |= found,
                Err(e) => self.flag_offline(&layer.name, &e),
            }
        }
        self.inner.events.emit(&CacheEvent::delete(key));
        Ok(existed)
    }

    /// Clear matching keys (or everything) in every enabled layer.
    pub async fn clear(&self, pattern: Option<&str>) -> StrataResult<u64> {
        let started = Instant::now();
        let result = self.clear_inner(pattern).await;
        self.inner
            .metrics
            .record_operation(OperationKind::Clear, started.elapsed(), result.is_ok());
        result
    }

    async fn clear_inner(&self, pattern: Option<&str>) -> StrataResult<u64> {
        let regex = match pattern {
            None => None,
            Some(raw) => Some(regex::Regex::new(raw).map_err(|e| {
                StrataError::from(strata_core::QueryError::InvalidPattern {
                    pattern: raw.to_string(),
                    reason: e.to_string(),
                })
            })?),
        };

        let order = self.ordering();
        let mut removed = 0u64;
        for layer in order.iter() {
            match layer.adapter.clear(regex.as_ref()).await {
                Ok(count) => removed += count,
                Err(e) => self.flag_offline(&layer.name, &e),
            }
        }
        self.inner.events.emit(&CacheEvent::clear(pattern));
        Ok(removed)
    }

    /// Run a read-only query across all layers.
    ///
    /// Results are de-duplicated by key keeping the highest-priority
    /// occurrence, expired entries are dropped, and the descriptor's sort
    /// and pagination are applied. Sorting is total: ties break by key.
    pub async fn query(&self, query: &CacheQuery) -> StrataResult<Vec<CacheEntry<V>>> {
        let started = Instant::now();
        let result = self.query_inner(query).await;
        self.inner
            .metrics
            .record_operation(OperationKind::Query, started.elapsed(), result.is_ok());
        result
    }

    async fn query_inner(&self, query: &CacheQuery) -> StrataResult<Vec<CacheEntry<V>>> {
        // Surface a bad pattern synchronously before touching any layer.
        query.compiled_pattern()?;

        let order = self.ordering();
        let now = Utc::now();
        let mut seen: HashSet<String> = HashSet::new();
        let mut merged: Vec<CacheEntry<V>> = Vec::new();

        for layer in order.iter() {
            match layer.adapter.query(query).await {
                Ok(entries) => {
                    for entry in entries {
                        if entry.is_expired(now) || seen.contains(&entry.key) {
                            continue;
                        }
                        seen.insert(entry.key.clone());
                        merged.push(entry);
                    }
                }
                Err(e) => self.flag_offline(&layer.name, &e),
            }
        }

        sort_entries(&mut merged, query.sort_field, query.sort_direction);

        let offset = query.offset.min(merged.len());
        let mut page: Vec<CacheEntry<V>> = merged.split_off(offset);
        if let Some(limit) = query.limit {
            page.truncate(limit);
        }
        Ok(page)
    }

    /// Propagate entries from each layer into its immediate lower-priority
    /// neighbor: the eventual-consistency cascade.
    pub async fn synchronize(&self) -> StrataResult<()> {
        let started = Instant::now();
        let result = self.synchronize_inner().await;
        self.inner.metrics.record_operation(
            OperationKind::Synchronize,
            started.elapsed(),
            result.is_ok(),
        );
        result
    }

    async fn synchronize_inner(&self) -> StrataResult<()> {
        let order = self.ordering();
        let now = Utc::now();

        for pair in order.windows(2) {
            let (source, target) = (&pair[0], &pair[1]);
            let entries = match source.adapter.query(&CacheQuery::all()).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(layer = %source.name, error = %e, "synchronize skipped source layer");
                    continue;
                }
            };

            for entry in entries {
                if entry.is_expired(now) {
                    continue;
                }
                let outdated = match target.adapter.peek(&entry.key).await {
                    Ok(Some(existing)) => existing.metadata.version < entry.metadata.version,
                    Ok(None) => true,
                    Err(e) => {
                        warn!(layer = %target.name, key = %entry.key, error = %e,
                              "synchronize peek failed");
                        false
                    }
                };
                if outdated {
                    if let Err(e) = target.adapter.set(entry.clone()).await {
                        warn!(layer = %target.name, key = %entry.key, error = %e,
                              "synchronize write failed");
                    }
                }
            }

            self.inner
                .events
                .emit(&CacheEvent::sync(&source.name, &target.name));
        }
        Ok(())
    }

    /// Pre-populate keys via a loader callback.
    ///
    /// Keys are processed in fixed-size batches; loaders run concurrently
    /// within a batch and batches execute strictly in order. A loader
    /// failure for one key is logged and never aborts the rest.
    ///
    /// Returns the number of keys successfully loaded and stored.
    pub async fn warmup<F, Fut>(&self, keys: &[String], loader: F) -> StrataResult<u64>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = StrataResult<V>>,
    {
        let started = Instant::now();
        let mut loaded = 0u64;

        for batch in keys.chunks(WARMUP_BATCH_SIZE) {
            let futures = batch.iter().map(|key| {
                let fut = loader(key.clone());
                async move { (key.clone(), fut.await) }
            });
            for (key, result) in join_all(futures).await {
                match result {
                    Ok(value) => match self.set(&key, value).await {
                        Ok(()) => loaded += 1,
                        Err(e) => warn!(key, error = %e, "warmup store failed"),
                    },
                    Err(e) => warn!(key, error = %e, "warmup loader failed"),
                }
            }
        }

        self.inner
            .metrics
            .record_operation(OperationKind::Warmup, started.elapsed(), true);
        Ok(loaded)
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Open a transaction and arm its auto-rollback timer.
    pub fn begin_transaction(&self, isolation: IsolationLevel) -> Uuid {
        let timeout = self.inner.settings.transaction_timeout;
        let id = self.inner.transactions.begin(isolation, timeout);

        let cache = self.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(ops) = cache.inner.transactions.take_if_open(id) {
                debug!(transaction = %id, "transaction timed out, rolling back");
                cache.reverse_ops(&ops).await;
            }
        });
        self.inner.transactions.arm_timer(id, timer);
        id
    }

    /// Record a `set` operation on an open transaction.
    pub fn transaction_set(
        &self,
        id: Uuid,
        key: impl Into<String>,
        value: V,
    ) -> StrataResult<()> {
        self.inner.transactions.append(
            id,
            TransactionOp::Set {
                key: key.into(),
                value,
            },
        )
    }

    /// Record a `delete` operation on an open transaction.
    pub fn transaction_delete(&self, id: Uuid, key: impl Into<String>) -> StrataResult<()> {
        self.inner
            .transactions
            .append(id, TransactionOp::Delete { key: key.into() })
    }

    /// Replay a transaction's operations in recorded order.
    ///
    /// A failure mid-replay rolls back the already-applied prefix in LIFO
    /// order, leaves the transaction rolled-back, and re-raises.
    pub async fn commit_transaction(&self, id: Uuid) -> StrataResult<()> {
        let ops = self.inner.transactions.start_commit(id)?;

        for (applied, op) in ops.iter().enumerate() {
            let result = match op {
                TransactionOp::Set { key, value } => self.set(key, value.clone()).await,
                TransactionOp::Delete { key } => self.delete(key).await.map(|_| ()),
            };
            if let Err(e) = result {
                self.reverse_ops(&ops[..applied]).await;
                self.inner.transactions.mark_rolled_back(id);
                return Err(TransactionError::CommitFailed {
                    id,
                    reason: e.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Reverse a transaction's recorded operations in LIFO order.
    ///
    /// Reversal is lossy: a recorded `set` reverses to a delete without
    /// restoring the prior value, and a recorded `delete` is a no-op.
    pub async fn rollback_transaction(&self, id: Uuid) -> StrataResult<()> {
        let ops = self.inner.transactions.start_rollback(id)?;
        self.reverse_ops(&ops).await;
        Ok(())
    }

    async fn reverse_ops(&self, ops: &[TransactionOp<V>]) {
        for op in ops.iter().rev() {
            match op {
                TransactionOp::Set { key, .. } => {
                    if let Err(e) = self.delete(key).await {
                        warn!(key, error = %e, "rollback step failed, continuing");
                    }
                }
                TransactionOp::Delete { .. } => {
                    // No captured pre-image; nothing to restore.
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Maintenance and observability
    // ------------------------------------------------------------------

    /// Purge expired entries in every layer and sweep expired transactions.
    pub async fn cleanup(&self) -> StrataResult<u64> {
        let started = Instant::now();
        let order = self.ordering();
        let mut purged = 0u64;

        for layer in order.iter() {
            match layer.adapter.cleanup().await {
                Ok(count) => purged += count,
                Err(e) => {
                    warn!(layer = %layer.name, error = %e, "layer cleanup failed");
                }
            }
        }

        for (id, ops) in self.inner.transactions.sweep(Utc::now()) {
            debug!(transaction = %id, "expired transaction swept, rolling back");
            self.reverse_ops(&ops).await;
        }

        self.inner
            .metrics
            .record_operation(OperationKind::Cleanup, started.elapsed(), true);
        Ok(purged)
    }

    /// Cleanup plus layer defragmentation, returning fresh usage statistics.
    pub async fn optimize(&self) -> StrataResult<CacheInspection> {
        self.cleanup().await?;
        let order = self.ordering();
        for layer in order.iter() {
            if layer.adapter.supports_defragment() {
                if let Err(e) = layer.adapter.defragment().await {
                    warn!(layer = %layer.name, error = %e, "defragment failed");
                }
            }
        }
        Ok(self.inspect().await)
    }

    /// Per-layer usage report, including offline layers.
    pub async fn inspect(&self) -> CacheInspection {
        let mut layers = Vec::new();
        for (config, online, adapter) in self.layer_snapshot() {
            let usable = online && config.enabled;
            let report = if usable {
                LayerReport {
                    name: config.name.clone(),
                    priority: config.priority,
                    enabled: config.enabled,
                    online,
                    key_count: adapter.key_count().await.unwrap_or(0),
                    size_bytes: adapter.size_bytes().await.unwrap_or(0),
                    oldest: adapter.oldest().await.unwrap_or(None),
                    newest: adapter.newest().await.unwrap_or(None),
                    most_accessed: adapter.most_accessed().await.unwrap_or(None),
                    largest: adapter.largest().await.unwrap_or(None),
                }
            } else {
                LayerReport {
                    name: config.name.clone(),
                    priority: config.priority,
                    enabled: config.enabled,
                    online,
                    key_count: 0,
                    size_bytes: 0,
                    oldest: None,
                    newest: None,
                    most_accessed: None,
                    largest: None,
                }
            };
            layers.push(report);
        }
        CacheInspection { layers }
    }

    /// Immutable snapshot of hit/miss and per-operation counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Subscribe to one event kind.
    pub fn on<F>(&self, kind: CacheEventKind, listener: F) -> ListenerId
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, listener)
    }

    /// Unsubscribe a listener.
    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.events.off(id)
    }

    /// Stop background tasks, roll back open transactions, close every
    /// layer adapter, and drop all listeners. Idempotent.
    pub async fn destroy(&self) -> StrataResult<()> {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let handles: Vec<JoinHandle<()>> = match self.inner.tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            handle.abort();
        }

        for id in self.inner.transactions.open_ids() {
            if let Some(ops) = self.inner.transactions.take_if_open(id) {
                self.reverse_ops(&ops).await;
            }
        }

        for (config, _, adapter) in self.layer_snapshot() {
            if let Err(e) = adapter.close().await {
                warn!(layer = %config.name, error = %e, "adapter close failed");
            }
        }

        self.inner.events.clear();
        Ok(())
    }
}

/// Cap an entry's expiry at the layer's TTL override, if any.
fn clamp_ttl<V: CacheValue>(
    mut entry: CacheEntry<V>,
    ttl_override: Option<Duration>,
    now: chrono::DateTime<Utc>,
) -> CacheEntry<V> {
    if let Some(ttl) = ttl_override {
        if let Some(cap) = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
        {
            entry.metadata.expires_at = entry.metadata.expires_at.min(cap);
        }
    }
    entry
}
