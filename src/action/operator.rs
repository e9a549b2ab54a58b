//! # Operator hooks.
//!
//! An [`Operator`] is the behavior plugged into an [`Action`]. The action owns
//! the plumbing (upstream subscription, downstream fan-out, lifecycle); the
//! operator decides what each signal means.
//!
//! ```text
//! upstream ─► Action::on_subscribe ─► create_tracking_subscription ─► do_subscribe
//! upstream ─► Action::on_next      ─► do_next      ─► action.broadcast_next(..)
//! upstream ─► Action::on_error     ─► do_error     ─► action.broadcast_error(..)
//! upstream ─► Action::on_complete  ─► do_complete  ─► action.broadcast_complete()
//! downstream request(n)            ─► on_request   ─► action.request_upstream(n)
//! ```
//!
//! ## Rules
//! - `do_*` hooks run on the action's dispatcher; an `Err` or a panic from
//!   `do_next`/`do_subscribe` is turned into `do_error`.
//! - Hooks are never invoked once the action is terminal.

use std::sync::Arc;

use super::action::Action;
use crate::error::StreamError;
use crate::subscription::{Demand, PushSubscription, Subscription, TrackingSubscription};

/// Behavior of a stream stage turning `I` items into `O` items.
pub trait Operator<I, O>: Sized + Send + Sync + 'static
where
    I: Send + 'static,
    O: Clone + Send + 'static,
{
    /// Handles one upstream item.
    fn do_next(&self, action: &Arc<Action<I, O, Self>>, value: I) -> Result<(), StreamError>;

    /// Handles an upstream error. Defaults to broadcasting it.
    fn do_error(&self, action: &Arc<Action<I, O, Self>>, error: StreamError) {
        action.broadcast_error(error);
    }

    /// Handles upstream completion. Defaults to broadcasting it.
    fn do_complete(&self, action: &Arc<Action<I, O, Self>>) {
        action.broadcast_complete();
    }

    /// Wraps the raw upstream subscription. Defaults to a [`PushSubscription`].
    fn create_tracking_subscription(
        &self,
        _action: &Arc<Action<I, O, Self>>,
        upstream: Arc<dyn Subscription>,
    ) -> Arc<dyn TrackingSubscription> {
        Arc::new(PushSubscription::new(upstream))
    }

    /// Runs once the upstream subscription is installed.
    fn do_subscribe(
        &self,
        _action: &Arc<Action<I, O, Self>>,
        _upstream: &Arc<dyn TrackingSubscription>,
    ) -> Result<(), StreamError> {
        Ok(())
    }

    /// Handles demand a downstream subscriber could not get from its buffer.
    /// Defaults to forwarding it upstream.
    fn on_request(&self, action: &Arc<Action<I, O, Self>>, demand: Demand) {
        action.request_upstream(demand);
    }

    /// Runs after the action was cancelled.
    fn on_cancel(&self, _action: &Arc<Action<I, O, Self>>) {}

    /// Runs after the action was paused.
    fn on_pause(&self, _action: &Arc<Action<I, O, Self>>) {}

    /// Runs after the action was resumed.
    fn on_resume(&self, _action: &Arc<Action<I, O, Self>>) {}
}

/// Identity operator: re-broadcasts every item.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl<T: Clone + Send + 'static> Operator<T, T> for Passthrough {
    fn do_next(&self, action: &Arc<Action<T, T, Self>>, value: T) -> Result<(), StreamError> {
        action.broadcast_next(value);
        Ok(())
    }
}
