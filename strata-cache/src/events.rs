//! In-process event bus for cache events.
//!
//! Listeners subscribe per [`CacheEventKind`] and are invoked synchronously
//! on the emitting path. A panicking listener is isolated with
//! `catch_unwind` and logged; it never blocks delivery to other listeners
//! and never propagates into the cache operation that triggered the event.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use strata_core::{CacheEvent, CacheEventKind};
use tracing::warn;

/// Handle returned by [`EventBus::on`], used to unsubscribe.
pub type ListenerId = u64;

type Listener = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

/// Typed publish/subscribe surface over [`CacheEvent`].
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<CacheEventKind, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one event kind. Returns an id usable with [`off`](Self::off).
    pub fn on<F>(&self, kind: CacheEventKind, listener: F) -> ListenerId
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut listeners) = self.listeners.write() {
            listeners
                .entry(kind)
                .or_default()
                .push((id, Arc::new(listener)));
        }
        id
    }

    /// Unsubscribe a listener. Returns whether it was registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let Ok(mut listeners) = self.listeners.write() else {
            return false;
        };
        let mut removed = false;
        for registered in listeners.values_mut() {
            let before = registered.len();
            registered.retain(|(listener_id, _)| *listener_id != id);
            removed |= registered.len() != before;
        }
        removed
    }

    /// Deliver an event to every listener registered for its kind.
    pub fn emit(&self, event: &CacheEvent) {
        // Snapshot under the lock, invoke outside it: a listener may
        // subscribe or unsubscribe reentrantly.
        let snapshot: Vec<Listener> = match self.listeners.read() {
            Ok(listeners) => listeners
                .get(&event.kind)
                .map(|registered| registered.iter().map(|(_, l)| Arc::clone(l)).collect())
                .unwrap_or_default(),
            Err(_) => return,
        };

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(kind = ?event.kind, "cache event listener panicked");
            }
        }
    }

    /// Drop every listener. Used on cache shutdown.
    pub fn clear(&self) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.clear();
        }
    }
}
