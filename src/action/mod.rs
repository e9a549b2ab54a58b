//! Stream stages: the [`Action`] base and the operators built on it.
//!
//! ## Contents
//! - [`Action`], [`ActionState`] the stage: upstream subscription, downstream fan-out, lifecycle
//! - [`Operator`], [`Passthrough`] the hooks a stage runs
//! - [`GroupByAction`], [`GroupedByAction`] partition a stream into keyed sub-streams
//! - [`ThrottleAction`], [`TimeoutTracker`] release upstream demand at a fixed rate
//!
//! ```text
//! publisher ─► GroupByAction ─► GroupedStream("a") ─► subscribers
//!                            └► GroupedStream("b") ─► subscribers
//!
//! publisher ◄─ Request(1) every period ─ ThrottleAction ─► subscribers
//! ```

#[allow(clippy::module_inception)]
mod action;
mod group_by;
mod grouped;
mod operator;
mod throttle;

pub use action::{Action, ActionState};
pub use group_by::{GroupBy, GroupByAction};
pub use grouped::{Grouped, GroupedByAction, GroupedStream};
pub use operator::{Operator, Passthrough};
pub use throttle::{Throttle, ThrottleAction, TimeoutTracker};
