//! Typed cache events.
//!
//! Every observable cache transition is reported through one of these
//! events. Listener registration is keyed by [`CacheEventKind`] so that a
//! subscriber only receives the kinds it asked for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheEventKind {
    Hit,
    Miss,
    Set,
    Delete,
    Expire,
    Evict,
    Clear,
    Sync,
    Error,
    LayerOnline,
    LayerOffline,
}

/// A cache event with its contextual payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEvent {
    pub kind: CacheEventKind,
    /// The key involved, when the event concerns a single entry.
    pub key: Option<String>,
    /// The layer involved, when the event is layer-scoped.
    pub layer: Option<String>,
    /// Free-form detail (error text, clear pattern, sync target).
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

impl CacheEvent {
    fn base(kind: CacheEventKind) -> Self {
        Self {
            kind,
            key: None,
            layer: None,
            detail: None,
            at: Utc::now(),
        }
    }

    /// A `get` served from `layer`.
    pub fn hit(key: impl Into<String>, layer: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            layer: Some(layer.into()),
            ..Self::base(CacheEventKind::Hit)
        }
    }

    /// A `get` that found no live entry in any layer.
    pub fn miss(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::base(CacheEventKind::Miss)
        }
    }

    pub fn set(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::base(CacheEventKind::Set)
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::base(CacheEventKind::Delete)
        }
    }

    /// An expired entry was encountered and scheduled for removal.
    pub fn expire(key: impl Into<String>, layer: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            layer: Some(layer.into()),
            ..Self::base(CacheEventKind::Expire)
        }
    }

    /// A resident entry was evicted by a layer to make room.
    pub fn evict(key: impl Into<String>, layer: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            layer: Some(layer.into()),
            ..Self::base(CacheEventKind::Evict)
        }
    }

    pub fn clear(pattern: Option<&str>) -> Self {
        Self {
            detail: pattern.map(str::to_string),
            ..Self::base(CacheEventKind::Clear)
        }
    }

    /// One synchronizer pass from `source` into its neighbor `target`.
    pub fn sync(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            layer: Some(source.into()),
            detail: Some(target.into()),
            ..Self::base(CacheEventKind::Sync)
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::base(CacheEventKind::Error)
        }
    }

    pub fn layer_online(layer: impl Into<String>) -> Self {
        Self {
            layer: Some(layer.into()),
            ..Self::base(CacheEventKind::LayerOnline)
        }
    }

    pub fn layer_offline(layer: impl Into<String>) -> Self {
        Self {
            layer: Some(layer.into()),
            ..Self::base(CacheEventKind::LayerOffline)
        }
    }
}
