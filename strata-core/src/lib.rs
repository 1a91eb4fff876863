//! STRATA Core - Shared data types for the layered cache framework
//!
//! This crate defines the data model every other STRATA crate builds on:
//!
//! - [`CacheEntry`] / [`EntryMetadata`]: the unit stored by cache layers
//! - [`LayerConfig`]: per-layer medium, priority, and limits
//! - [`CacheQuery`]: read-only filter descriptors for cache scans
//! - [`ChatSession`] / [`ChatMessage`]: session entities consumed by the
//!   search and export crates
//! - [`CacheSettings`]: cache-wide policy configuration
//! - [`CacheEvent`]: the typed event surface
//! - The error taxonomy, folded into [`StrataError`]
//!
//! The crate carries no behavior beyond constructors, validation, and small
//! derived accessors; the engine itself lives in `strata-cache`.

pub mod config;
pub mod entry;
pub mod error;
pub mod event;
pub mod layer;
pub mod query;
pub mod session;

pub use config::{CacheSettings, ConsistencyLevel, IsolationLevel, WritePolicy};
pub use entry::{CacheEntry, CacheValue, EntryMetadata, EntryPriority};
pub use error::{
    AdapterError, ConfigError, ExportError, QueryError, StrataError, StrataResult,
    TransactionError,
};
pub use event::{CacheEvent, CacheEventKind};
pub use layer::{LayerConfig, LayerLimits, MediumKind};
pub use query::{CacheQuery, SortDirection, SortField};
pub use session::{ChatMessage, ChatSession};
