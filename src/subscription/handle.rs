//! # Subscription and publisher contracts.
//!
//! A [`Subscription`] is the demand channel between one publisher and one
//! subscriber. A [`Publisher`] hands a subscription to each subscriber it accepts.
//!
//! ## Rules
//! - `request` and `cancel` may be called from any thread.
//! - After `cancel`, further `request` calls are ignored.
//! - A publisher never delivers more items than were requested through the subscription
//!   (stages enforce this per downstream with a bounded overflow buffer).

use std::sync::Arc;

use super::demand::Demand;
use crate::subscribers::Subscriber;

/// Demand channel between a publisher and one subscriber.
pub trait Subscription: Send + Sync + 'static {
    /// Signals demand for more items.
    fn request(&self, demand: Demand);

    /// Stops delivery and releases the subscription.
    fn cancel(&self);
}

/// Source of items for any number of subscribers.
pub trait Publisher<T>: Send + Sync {
    /// Attaches `subscriber`; it receives `on_subscribe` with its own [`Subscription`].
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>);
}

/// Subscription handed to subscribers that will never receive anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSubscription;

impl Subscription for NoopSubscription {
    fn request(&self, _demand: Demand) {}

    fn cancel(&self) {}
}
