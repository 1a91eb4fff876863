//! Layer registry and priority ordering.
//!
//! The registry owns the configured layer set and a derived lookup order:
//! enabled, online layers ascending by priority, ties broken by declaration
//! order. The order is the one structure every cache operation reads, so it
//! is copy-on-change: recomputed wholesale into a fresh `Arc` whenever layer
//! configuration changes, never mutated in place.

use std::sync::Arc;

use strata_core::{CacheValue, ConfigError, LayerConfig, StrataResult};

use crate::adapter::StorageAdapter;

/// One configured layer and its adapter.
pub struct Layer<V> {
    pub config: LayerConfig,
    pub adapter: Arc<dyn StorageAdapter<V>>,
    /// Cleared when an operation against the medium fails.
    pub online: bool,
}

/// A snapshot element of the derived lookup order.
#[derive(Clone)]
pub struct OrderedLayer<V> {
    pub name: String,
    pub priority: u32,
    /// Per-layer TTL override from the layer limits.
    pub ttl_override: Option<std::time::Duration>,
    pub adapter: Arc<dyn StorageAdapter<V>>,
}

/// Registry of configured layers with a cached priority ordering.
pub struct LayerRegistry<V> {
    layers: Vec<Layer<V>>,
    ordering: Arc<Vec<OrderedLayer<V>>>,
}

impl<V: CacheValue> LayerRegistry<V> {
    /// Build a registry from configured layers.
    ///
    /// Fails only when layer names collide or nothing was configured;
    /// individual layers may be disabled without aborting the rest.
    pub fn new(layers: Vec<Layer<V>>) -> StrataResult<Self> {
        if layers.is_empty() {
            return Err(ConfigError::NoLayers.into());
        }
        for (i, layer) in layers.iter().enumerate() {
            if layers[..i].iter().any(|l| l.config.name == layer.config.name) {
                return Err(ConfigError::DuplicateLayerName {
                    name: layer.config.name.clone(),
                }
                .into());
            }
        }
        let mut registry = Self {
            layers,
            ordering: Arc::new(Vec::new()),
        };
        registry.recompute();
        Ok(registry)
    }

    /// The current lookup order. Cheap to clone; stable for the holder even
    /// if the registry changes underneath.
    pub fn ordering(&self) -> Arc<Vec<OrderedLayer<V>>> {
        Arc::clone(&self.ordering)
    }

    /// All configured layers, in declaration order.
    pub fn layers(&self) -> &[Layer<V>] {
        &self.layers
    }

    /// Owned snapshot of every configured layer, usable across await
    /// points: `(config, online, adapter)` in declaration order.
    pub fn snapshot(&self) -> Vec<(LayerConfig, bool, Arc<dyn StorageAdapter<V>>)> {
        self.layers
            .iter()
            .map(|l| (l.config.clone(), l.online, Arc::clone(&l.adapter)))
            .collect()
    }

    /// Flag a layer offline after a failed operation.
    ///
    /// Returns true if the flag changed.
    pub fn mark_offline(&mut self, name: &str) -> bool {
        let changed = self
            .layers
            .iter_mut()
            .find(|l| l.config.name == name && l.online)
            .map(|l| {
                l.online = false;
                true
            })
            .unwrap_or(false);
        if changed {
            self.recompute();
        }
        changed
    }

    /// Enable or disable a layer. Enabling also brings it back online.
    ///
    /// Returns true if anything changed.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        let changed = self
            .layers
            .iter_mut()
            .find(|l| l.config.name == name)
            .map(|l| {
                let changed = l.config.enabled != enabled || (enabled && !l.online);
                l.config.enabled = enabled;
                if enabled {
                    l.online = true;
                }
                changed
            })
            .unwrap_or(false);
        if changed {
            self.recompute();
        }
        changed
    }

    fn recompute(&mut self) {
        let mut indexed: Vec<usize> = self
            .layers
            .iter()
            .enumerate()
            .filter(|(_, l)| l.config.enabled && l.online)
            .map(|(i, _)| i)
            .collect();
        // Stable sort keeps declaration order on priority ties.
        indexed.sort_by_key(|&i| self.layers[i].config.priority);

        self.ordering = Arc::new(
            indexed
                .into_iter()
                .map(|i| OrderedLayer {
                    name: self.layers[i].config.name.clone(),
                    priority: self.layers[i].config.priority,
                    ttl_override: self.layers[i].config.limits.ttl,
                    adapter: Arc::clone(&self.layers[i].adapter),
                })
                .collect(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryAdapter;
    use strata_core::{LayerLimits, MediumKind};

    fn layer(name: &str, priority: u32, enabled: bool) -> Layer<String> {
        Layer {
            config: LayerConfig::new(name, MediumKind::Memory, priority).with_enabled(enabled),
            adapter: Arc::new(MemoryAdapter::new(name, LayerLimits::default())),
            online: true,
        }
    }

    fn names<V>(ordering: &[OrderedLayer<V>]) -> Vec<&str> {
        ordering.iter().map(|l| l.name.as_str()).collect()
    }

    #[test]
    fn test_ordering_ascending_by_priority() {
        let registry =
            LayerRegistry::new(vec![layer("cold", 2, true), layer("hot", 0, true), layer("warm", 1, true)])
                .unwrap();
        assert_eq!(names(&registry.ordering()), vec!["hot", "warm", "cold"]);
    }

    #[test]
    fn test_ordering_ties_break_by_declaration_order() {
        let registry =
            LayerRegistry::new(vec![layer("first", 1, true), layer("second", 1, true)]).unwrap();
        assert_eq!(names(&registry.ordering()), vec!["first", "second"]);
    }

    #[test]
    fn test_disabled_layers_excluded() {
        let registry =
            LayerRegistry::new(vec![layer("hot", 0, false), layer("cold", 1, true)]).unwrap();
        assert_eq!(names(&registry.ordering()), vec!["cold"]);
    }

    #[test]
    fn test_mark_offline_recomputes() {
        let mut registry =
            LayerRegistry::new(vec![layer("hot", 0, true), layer("cold", 1, true)]).unwrap();
        let stale = registry.ordering();

        assert!(registry.mark_offline("hot"));
        assert_eq!(names(&registry.ordering()), vec!["cold"]);
        // Prior holders keep their snapshot untouched.
        assert_eq!(names(&stale), vec!["hot", "cold"]);

        // Second call is a no-op.
        assert!(!registry.mark_offline("hot"));
    }

    #[test]
    fn test_set_enabled_brings_layer_back() {
        let mut registry =
            LayerRegistry::new(vec![layer("hot", 0, true), layer("cold", 1, true)]).unwrap();
        registry.mark_offline("hot");

        assert!(registry.set_enabled("hot", true));
        assert_eq!(names(&registry.ordering()), vec!["hot", "cold"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = LayerRegistry::new(vec![layer("dup", 0, true), layer("dup", 1, true)])
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(
            err,
            strata_core::StrataError::Config(ConfigError::DuplicateLayerName { .. })
        ));
    }

    #[test]
    fn test_empty_registry_rejected() {
        let err = LayerRegistry::<String>::new(vec![]).map(|_| ()).unwrap_err();
        assert!(matches!(
            err,
            strata_core::StrataError::Config(ConfigError::NoLayers)
        ));
    }
}
