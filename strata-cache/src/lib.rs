//! Multi-tier cache engine.
//!
//! The engine composes priority-ordered storage layers behind one
//! [`LayeredCache`] handle: lookups scan layers fastest-first and promote
//! hits upward, writes follow the configured [`WritePolicy`], and a
//! background synchronizer cascades fresh entries downward under eventual
//! consistency. Transactions batch operations with timeout auto-rollback;
//! metrics and a typed event bus expose what the cache is doing.
//!
//! [`WritePolicy`]: strata_core::WritePolicy

pub mod adapter;
pub mod engine;
pub mod events;
pub mod lmdb;
pub mod memory;
pub mod metrics;
pub mod registry;
pub mod sync;
pub mod transaction;

pub use adapter::StorageAdapter;
pub use engine::{
    CacheInspection, LayerReport, LayeredCache, LayeredCacheBuilder, SetOptions,
};
pub use events::{EventBus, ListenerId};
pub use lmdb::LmdbAdapter;
pub use memory::MemoryAdapter;
pub use metrics::{MetricsSnapshot, OperationKind, OperationSnapshot};
pub use registry::{Layer, LayerRegistry, OrderedLayer};
pub use transaction::{TransactionOp, TransactionState, TransactionStore};
