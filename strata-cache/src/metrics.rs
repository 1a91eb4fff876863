//! Cache metrics.
//!
//! Counters are updated incrementally on every operation and exposed as an
//! immutable [`MetricsSnapshot`]. Metric recording is best-effort: a
//! poisoned lock drops the data point rather than failing the operation.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Operation kinds tracked per-operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Get,
    Set,
    Delete,
    Clear,
    Query,
    Synchronize,
    Warmup,
    Cleanup,
}

#[derive(Debug, Clone, Default)]
struct OpStats {
    count: u64,
    errors: u64,
    total: Duration,
    min: Option<Duration>,
    max: Duration,
}

#[derive(Debug, Default)]
struct MetricsInner {
    hits: u64,
    misses: u64,
    operations: HashMap<OperationKind, OpStats>,
}

/// Per-operation-kind aggregate in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSnapshot {
    pub count: u64,
    pub errors: u64,
    pub total: Duration,
    pub average: Duration,
    pub min: Duration,
    pub max: Duration,
}

/// Immutable view of the cache's counters at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub operations: HashMap<OperationKind, OperationSnapshot>,
}

/// Incremental metrics recorder.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    inner: RwLock<MetricsInner>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.hits += 1;
        }
    }

    pub fn record_miss(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.misses += 1;
        }
    }

    /// Record one completed operation of `kind`.
    pub fn record_operation(&self, kind: OperationKind, elapsed: Duration, ok: bool) {
        if let Ok(mut inner) = self.inner.write() {
            let stats = inner.operations.entry(kind).or_default();
            stats.count += 1;
            if !ok {
                stats.errors += 1;
            }
            stats.total += elapsed;
            stats.min = Some(stats.min.map_or(elapsed, |min| min.min(elapsed)));
            stats.max = stats.max.max(elapsed);
        }
    }

    /// Take an immutable snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = match self.inner.read() {
            Ok(inner) => inner,
            Err(_) => {
                return MetricsSnapshot {
                    hits: 0,
                    misses: 0,
                    hit_rate: 0.0,
                    operations: HashMap::new(),
                }
            }
        };

        let total_lookups = inner.hits + inner.misses;
        let hit_rate = if total_lookups == 0 {
            0.0
        } else {
            inner.hits as f64 / total_lookups as f64
        };

        let operations = inner
            .operations
            .iter()
            .map(|(kind, stats)| {
                let average = if stats.count == 0 {
                    Duration::ZERO
                } else {
                    stats.total / stats.count as u32
                };
                (
                    *kind,
                    OperationSnapshot {
                        count: stats.count,
                        errors: stats.errors,
                        total: stats.total,
                        average,
                        min: stats.min.unwrap_or(Duration::ZERO),
                        max: stats.max,
                    },
                )
            })
            .collect();

        MetricsSnapshot {
            hits: inner.hits,
            misses: inner.misses,
            hit_rate,
            operations,
        }
    }
}
