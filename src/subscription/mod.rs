//! Demand protocol: subscriptions, publishers and demand accounting.
//!
//! ## Contents
//! - [`Demand`], [`DemandCounter`] demand signals and saturation-safe accounting
//! - [`Subscription`], [`Publisher`] the reactive-streams contracts
//! - [`TrackingSubscription`], [`PushSubscription`] the upstream side of a stage
//!
//! ## Quick wiring
//! ```text
//! Publisher::subscribe(stage)
//!      └─► stage.on_subscribe(Arc<dyn Subscription>)
//!           └─► Operator::create_tracking_subscription() ─► PushSubscription (or decorator)
//!                └─► stored as the stage's upstream; all upstream demand goes through it
//! ```

mod demand;
mod handle;
mod push;

pub use demand::{Demand, DemandCounter};
pub use handle::{NoopSubscription, Publisher, Subscription};
pub use push::{PushSubscription, TrackingSubscription};
