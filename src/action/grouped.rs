//! # GroupedByAction: the sub-stream of one key.
//!
//! A grouped stream is fed by its parent group-by stage, never by a publisher of
//! its own. Items emitted before anyone subscribed are held for the first
//! subscriber, so nothing is lost between the stream being announced and being
//! subscribed to. Its demand never reaches the parent, so its buffers treat
//! `capacity` as a hint and never drop.

use std::fmt;
use std::sync::Arc;

use super::action::Action;
use super::operator::Operator;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::StreamError;
use crate::subscribers::DownstreamSet;
use crate::subscription::Demand;

/// Operator of a grouped stream: identity, keyed.
#[derive(Debug, Clone)]
pub struct Grouped<K> {
    key: K,
}

/// Sub-stream carrying the items of one key.
pub type GroupedByAction<K, T> = Action<T, T, Grouped<K>>;

/// Handle on a grouped stream, as emitted by a group-by stage.
pub type GroupedStream<K, T> = Arc<GroupedByAction<K, T>>;

impl<K, T> Operator<T, T> for Grouped<K>
where
    K: Send + Sync + 'static,
    T: Clone + Send + 'static,
{
    fn do_next(&self, action: &Arc<Action<T, T, Self>>, value: T) -> Result<(), StreamError> {
        action.broadcast_next(value);
        Ok(())
    }

    // Fed by the parent; downstream demand is served from the per-subscriber buffers.
    fn on_request(&self, _action: &Arc<Action<T, T, Self>>, _demand: Demand) {}
}

impl<K, T> Action<T, T, Grouped<K>>
where
    K: Send + Sync + 'static,
    T: Clone + Send + 'static,
{
    /// Creates the grouped stream for `key` on `dispatcher`.
    pub fn new(key: K, dispatcher: Arc<dyn Dispatcher>) -> Arc<Self> {
        Self::build(
            dispatcher,
            Grouped { key },
            DownstreamSet::holding(Config::DEFAULT_CAPACITY),
        )
    }

    /// Returns the key of this stream.
    pub fn key(&self) -> &K {
        &self.operator().key
    }
}

impl<K, T> fmt::Display for Action<T, T, Grouped<K>>
where
    K: fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupedByAction{{key={:?}}}", self.key())
    }
}
