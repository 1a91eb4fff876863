//! Layer configuration.
//!
//! A layer is one physical storage medium participating in the multi-tier
//! cache. The numeric priority defines lookup order (lower = checked first)
//! and, transitively, promotion targets: a hit at priority `p` populates
//! every enabled layer with priority below `p`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The physical medium backing a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediumKind {
    /// Process-local map, fastest tier.
    Memory,
    /// Durable key/value store (LMDB).
    Persistent,
}

/// Per-layer capacity and lifetime limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerLimits {
    /// Maximum number of resident entries. Zero means unlimited.
    pub max_entries: usize,
    /// Maximum total payload size in bytes. Zero means unlimited.
    pub max_size_bytes: u64,
    /// Per-layer TTL override; `None` uses the cache-wide default.
    pub ttl: Option<Duration>,
}

impl Default for LayerLimits {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_size_bytes: 64 * 1024 * 1024,
            ttl: None,
        }
    }
}

/// Configuration for a single cache layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Unique name within a cache instance.
    pub name: String,
    pub medium: MediumKind,
    /// Lookup priority: lower numbers are checked first.
    pub priority: u32,
    pub enabled: bool,
    pub limits: LayerLimits,
    /// Compress payloads before storing (persistent media only).
    pub compress: bool,
    /// Maintain secondary indexes for query acceleration.
    pub index: bool,
}

impl LayerConfig {
    /// Create an enabled layer with default limits.
    pub fn new(name: impl Into<String>, medium: MediumKind, priority: u32) -> Self {
        Self {
            name: name.into(),
            medium,
            priority,
            enabled: true,
            limits: LayerLimits::default(),
            compress: false,
            index: false,
        }
    }

    /// Set the capacity limits.
    pub fn with_limits(mut self, limits: LayerLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the per-layer TTL override.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.limits.ttl = Some(ttl);
        self
    }

    /// Enable or disable the layer at construction time.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Enable payload compression.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}
