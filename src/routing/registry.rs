//! # Registry: key-based consumer selection.
//!
//! [`ConsumerRegistry`] matches keys exactly (`HashMap` lookup). Selector-based
//! matching (patterns, predicates) is left to other [`Registry`] implementations.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

use super::consumer::Consumer;

/// Selects the consumers registered for a key.
pub trait Registry<K, E>: Send + Sync + 'static {
    /// Returns the consumers for `key` (empty if none), in registration order.
    fn select(&self, key: &K) -> Vec<Arc<dyn Consumer<E>>>;
}

/// Exact-key registry.
pub struct ConsumerRegistry<K, E> {
    entries: RwLock<HashMap<K, Vec<Arc<dyn Consumer<E>>>>>,
}

impl<K, E> Default for ConsumerRegistry<K, E> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, E> ConsumerRegistry<K, E>
where
    K: Eq + Hash,
{
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `consumer` under `key`, after any consumers already registered there.
    pub fn register(&self, key: K, consumer: Arc<dyn Consumer<E>>) {
        self.entries.write().entry(key).or_default().push(consumer);
    }

    /// Removes every consumer under `key`; returns `true` if any was removed.
    pub fn unregister(&self, key: &K) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Number of registered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True if no key is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<K, E> Registry<K, E> for ConsumerRegistry<K, E>
where
    K: Eq + Hash + Send + Sync + 'static,
    E: 'static,
{
    fn select(&self, key: &K) -> Vec<Arc<dyn Consumer<E>>> {
        self.entries.read().get(key).cloned().unwrap_or_default()
    }
}
