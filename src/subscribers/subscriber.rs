//! # Stream subscriber trait.
//!
//! Provides [`Subscriber`] the receiving end of the demand protocol.
//!
//! Each subscriber attached to a stage gets:
//! - **Its own subscription** (demand is tracked per subscriber)
//! - **Per-subscriber bounded buffer** (items arriving without demand wait there)
//! - **Ordered delivery** (signals arrive in the order the stage emitted them)
//!
//! ## Signal grammar
//! ```text
//! on_subscribe (on_next)* (on_error | on_complete)?
//! ```
//!
//! ## Rules
//! - A slow subscriber only affects its own buffer.
//! - Buffer overflow drops the item **for this subscriber only** and logs a warning.
//! - Exactly one terminal signal, never followed by anything else.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use streamvisor::{Demand, StreamError, Subscriber, Subscription};
//!
//! struct Printer;
//!
//! impl Subscriber<u32> for Printer {
//!     fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
//!         subscription.request(Demand::Unbounded);
//!     }
//!     fn on_next(&self, value: u32) { println!("{value}"); }
//!     fn on_error(&self, error: StreamError) { eprintln!("{error}"); }
//!     fn on_complete(&self) {}
//!
//!     fn name(&self) -> &'static str { "printer" }
//! }
//! ```

use std::sync::Arc;

use crate::error::StreamError;
use crate::subscription::Subscription;

/// Receiver of stream signals.
///
/// ### Implementation requirements
/// - Do not block: signals are delivered on the publishing stage's dispatcher.
/// - Requesting more from inside `on_next` is allowed (delivery is re-entrant safe).
pub trait Subscriber<T>: Send + Sync + 'static {
    /// Receives the subscription; nothing is delivered until demand is requested through it.
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>);

    /// Receives one item.
    fn on_next(&self, value: T);

    /// Terminal: the stream failed.
    fn on_error(&self, error: StreamError);

    /// Terminal: the stream completed.
    fn on_complete(&self);

    /// Returns the subscriber name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
