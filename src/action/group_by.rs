//! # GroupByAction: partition a stream by key.
//!
//! Every item is mapped to a key; each distinct key gets its own grouped stream,
//! announced downstream the first time the key is seen.
//!
//! ```text
//!   ("a",1) ("b",2) ("a",3)
//!        │
//!   key_fn(item)
//!        │           groups (insertion order)
//!        ├─ "a" new ─► GroupedByAction{a} ──► broadcast_next(stream)  then  stream ◄─ ("a",1)
//!        ├─ "b" new ─► GroupedByAction{b} ──► broadcast_next(stream)  then  stream ◄─ ("b",2)
//!        └─ "a"     ─────────────────────────────────────────────────────── stream ◄─ ("a",3)
//! ```
//!
//! ## Rules
//! - A grouped stream shares the parent's dispatcher, capacity and environment.
//! - Nothing is dropped for a slow consumer: the outer stream of streams and
//!   every grouped stream buffer past `capacity` instead of discarding.
//! - `cancel_key` / `complete_key` may be called from any thread; the removal runs
//!   on the dispatcher. An unknown key is a no-op.
//! - Parent error: every live grouped stream fails (groups are kept), then the parent.
//! - Parent completion: every live grouped stream completes, groups are cleared,
//!   then the parent completes.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::action::Action;
use super::grouped::{GroupedByAction, GroupedStream};
use super::operator::Operator;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::{DispatchError, StreamError};
use crate::subscribers::DownstreamSet;

type KeyFn<T, K> = Box<dyn Fn(&T) -> K + Send + Sync>;

struct Groups<K, T> {
    by_key: HashMap<K, GroupedStream<K, T>>,
    order: Vec<K>,
}

impl<K: Eq + Hash + Clone, T> Groups<K, T> {
    fn remove(&mut self, key: &K) -> Option<GroupedStream<K, T>> {
        let stream = self.by_key.remove(key)?;
        self.order.retain(|k| k != key);
        Some(stream)
    }

    fn streams(&self) -> Vec<GroupedStream<K, T>> {
        self.order
            .iter()
            .filter_map(|k| self.by_key.get(k).cloned())
            .collect()
    }
}

/// Operator partitioning `T` items by key `K`.
pub struct GroupBy<T, K> {
    key_fn: KeyFn<T, K>,
    groups: Mutex<Groups<K, T>>,
}

/// Stage emitting one [`GroupedStream`] per distinct key.
pub type GroupByAction<T, K> = Action<T, GroupedStream<K, T>, GroupBy<T, K>>;

impl<T, K> GroupBy<T, K>
where
    K: Eq + Hash + Clone,
{
    fn streams(&self) -> Vec<GroupedStream<K, T>> {
        self.groups.lock().streams()
    }

    fn take_all(&self) -> Vec<GroupedStream<K, T>> {
        let mut groups = self.groups.lock();
        let streams = groups.streams();
        groups.by_key.clear();
        groups.order.clear();
        streams
    }

    fn remove(&self, key: &K) -> Option<GroupedStream<K, T>> {
        self.groups.lock().remove(key)
    }
}

impl<T, K> Operator<T, GroupedStream<K, T>> for GroupBy<T, K>
where
    T: Clone + Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn do_next(
        &self,
        action: &Arc<Action<T, GroupedStream<K, T>, Self>>,
        value: T,
    ) -> Result<(), StreamError> {
        let key = (self.key_fn)(&value);
        let (stream, created) = {
            let mut groups = self.groups.lock();
            match groups.by_key.get(&key) {
                Some(stream) => (Arc::clone(stream), false),
                None => {
                    let dispatcher = Arc::clone(action.dispatcher());
                    let stream = GroupedByAction::new(key.clone(), dispatcher);
                    stream.set_capacity(action.capacity());
                    if let Some(env) = action.environment() {
                        stream.set_environment(env);
                    }
                    groups.by_key.insert(key.clone(), Arc::clone(&stream));
                    groups.order.push(key);
                    (stream, true)
                }
            }
        };
        if created {
            action.broadcast_next(Arc::clone(&stream));
        }
        stream.broadcast_next(value);
        Ok(())
    }

    fn do_error(&self, action: &Arc<Action<T, GroupedStream<K, T>, Self>>, error: StreamError) {
        for stream in self.streams() {
            stream.broadcast_error(error.clone());
        }
        action.broadcast_error(error);
    }

    fn do_complete(&self, action: &Arc<Action<T, GroupedStream<K, T>, Self>>) {
        for stream in self.take_all() {
            stream.broadcast_complete();
        }
        action.broadcast_complete();
    }

    fn on_cancel(&self, _action: &Arc<Action<T, GroupedStream<K, T>, Self>>) {
        for stream in self.take_all() {
            stream.cancel();
        }
    }
}

impl<T, K> Action<T, GroupedStream<K, T>, GroupBy<T, K>>
where
    T: Clone + Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    /// Creates a group-by stage keyed by `key_fn`, running on `dispatcher`.
    pub fn new<F>(key_fn: F, dispatcher: Arc<dyn Dispatcher>) -> Arc<Self>
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self::build(
            dispatcher,
            GroupBy {
                key_fn: Box::new(key_fn),
                groups: Mutex::new(Groups {
                    by_key: HashMap::new(),
                    order: Vec::new(),
                }),
            },
            DownstreamSet::lossless(Config::DEFAULT_CAPACITY),
        )
    }

    /// Removes the stream for `key` and cancels it.
    ///
    /// Fails only if the dispatcher rejects the work.
    pub fn cancel_key(&self, key: K) -> Result<(), DispatchError> {
        self.dispatch(key, |action, key| {
            match action.operator().remove(&key) {
                Some(stream) => stream.cancel(),
                None => debug!("cancel of unknown group ignored"),
            }
            Ok(())
        })
    }

    /// Removes the stream for `key` and completes it.
    ///
    /// Fails only if the dispatcher rejects the work.
    pub fn complete_key(&self, key: K) -> Result<(), DispatchError> {
        self.dispatch(key, |action, key| {
            match action.operator().remove(&key) {
                Some(stream) => stream.broadcast_complete(),
                None => debug!("complete of unknown group ignored"),
            }
            Ok(())
        })
    }

    /// Returns the live keys, in the order they were first seen.
    pub fn keys(&self) -> Vec<K> {
        self.operator().groups.lock().order.clone()
    }

    /// Returns the live stream for `key`.
    pub fn group(&self, key: &K) -> Option<GroupedStream<K, T>> {
        self.operator().groups.lock().by_key.get(key).cloned()
    }
}
