//! # streamvisor
//!
//! **Streamvisor** is a small reactive-stream execution core for Rust.
//!
//! It provides dispatchers that decide where stream work runs, stream stages
//! with demand-driven backpressure, and two operators built on them: a
//! partitioning group-by and a timer-driven throttle. The crate is designed as
//! a building block for higher-level stream pipelines.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐
//!     │  Publisher   │  (any source implementing Publisher<T>)
//!     └──────┬───────┘
//!            │ on_subscribe / on_next / on_error / on_complete
//!            ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Action<I, O, Op>  (stream stage)                                 │
//! │  - TrackingSubscription (upstream demand, pause, pending)         │
//! │  - Operator hooks (do_next, do_error, do_complete, on_request)    │
//! │  - DownstreamSet (per-subscriber demand + bounded buffer)         │
//! └──────┬──────────────────────────────────────────────────┬─────────┘
//!        │ every hook is submitted to                       │ broadcast_*
//!        ▼                                                  ▼
//! ┌──────────────────────────────┐              ┌──────────────────────┐
//! │  Dispatcher                  │              │  Subscriber<O> × N   │
//! │  - SyncDispatcher (inline)   │              │  (own demand, own    │
//! │  - EventLoopDispatcher       │              │   buffer each)       │
//! │    (ordered, single task)    │              └──────────────────────┘
//! └──────┬───────────────────────┘
//!        ▼
//!   Router ──► Consumer × N   (failures isolated per consumer)
//! ```
//!
//! ### Demand
//! ```text
//! Subscriber ── request(n) ──► lane buffer drains first
//!                                └─► remainder ─► Operator::on_request
//!                                                   ├─ default:  upstream.request(n)
//!                                                   ├─ grouped:  ignored (parent drives demand)
//!                                                   └─ throttle: pending += n; timer releases 1/period
//! ```
//!
//! ## Features
//! | Area              | Description                                                      | Key types / traits                         |
//! |-------------------|------------------------------------------------------------------|--------------------------------------------|
//! | **Dispatch**      | Where work runs; lifecycle, capacity and ordering queries.      | [`Dispatcher`], [`DispatcherExt`]          |
//! | **Routing**       | Consumer invocation with per-consumer failure isolation.        | [`Router`], [`ConsumerRegistry`]           |
//! | **Demand**        | Reactive-streams subscriptions with pending-demand tracking.    | [`Subscription`], [`TrackingSubscription`] |
//! | **Stages**        | Base stage with hooks, fan-out, pause/resume and cancel.        | [`Action`], [`Operator`]                   |
//! | **Operators**     | Keyed partitioning and rate limiting.                           | [`GroupByAction`], [`ThrottleAction`]      |
//! | **Timers**        | Periodic tasks with pause/resume/cancel registrations.          | [`Timer`], [`TokioTimer`]                  |
//! | **Errors**        | Typed errors for dispatch, streams and construction.            | [`DispatchError`], [`StreamError`]         |
//! | **Configuration** | Shared buffer capacity, backlog and shutdown grace.             | [`Config`], [`Environment`]                |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use streamvisor::{
//!     Demand, GroupByAction, Publisher, StreamError, Subscriber, Subscription, SyncDispatcher,
//! };
//!
//! struct Printer;
//!
//! impl Subscriber<(&'static str, u32)> for Printer {
//!     fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
//!         subscription.request(Demand::Unbounded);
//!     }
//!     fn on_next(&self, value: (&'static str, u32)) { println!("{value:?}"); }
//!     fn on_error(&self, error: StreamError) { eprintln!("{error}"); }
//!     fn on_complete(&self) {}
//! }
//!
//! let by_key = GroupByAction::<(&'static str, u32), &'static str>::new(
//!     |item: &(&'static str, u32)| item.0,
//!     Arc::new(SyncDispatcher::new()),
//! );
//! by_key.on_next(("a", 1));
//! by_key.on_next(("b", 2));
//! by_key.on_next(("a", 3));
//!
//! assert_eq!(by_key.keys(), vec!["a", "b"]);
//! if let Some(group) = by_key.group(&"a") {
//!     group.subscribe(Arc::new(Printer)); // prints ("a", 1) then ("a", 3)
//! }
//! ```
mod action;
mod config;
mod dispatch;
mod environment;
mod error;
mod routing;
mod subscribers;
mod subscription;
mod timer;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use action::{
    Action, ActionState, GroupBy, GroupByAction, Grouped, GroupedByAction, GroupedStream,
    Operator, Passthrough, Throttle, ThrottleAction, TimeoutTracker,
};
pub use config::Config;
pub use dispatch::{Dispatcher, DispatcherExt, EventLoopDispatcher, SyncDispatcher, Work};
pub use environment::Environment;
pub use error::{ActionError, DispatchError, StreamError};
pub use routing::{
    CompletionConsumer, Consumer, ConsumerRegistry, ConsumerRouter, ErrorConsumer, Registry,
    Router,
};
pub use subscribers::Subscriber;
pub use subscription::{
    Demand, DemandCounter, NoopSubscription, Publisher, PushSubscription, Subscription,
    TrackingSubscription,
};
pub use timer::{Registration, Timer, TimerTask, TokioTimer};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
