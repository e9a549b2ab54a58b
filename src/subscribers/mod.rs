//! # Stream subscribers.
//!
//! This module provides the [`Subscriber`] trait, the demand-aware fan-out a stage
//! uses to serve its subscribers, and built-in implementations.
//!
//! ## Architecture
//! ```text
//! Signal flow:
//!   Action ── broadcast_next(item) ──► DownstreamSet ──► per-subscriber lane
//!                                                            │
//!                                                 ┌──────────┼──────────┐
//!                                                 ▼          ▼          ▼
//!                                          demand? deliver  buffer   overflow? drop + warn
//!                                                 │
//!                                                 ▼
//!                                       Subscriber::on_next(item)
//!
//! Demand flow:
//!   Subscriber ── Subscription::request(n) ──► lane drains buffer
//!                                                 │
//!                                                 └─► remainder ──► Operator::on_request ──► upstream
//! ```
//!
//! ## Subscriber types
//! - **Sinks** - terminal consumers (logging, collecting, forwarding to channels)
//! - **Stages** - every [`Action`](crate::Action) is itself a subscriber of its upstream

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscriber;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub(crate) use set::{DemandSink, Downstream, DownstreamSet, DownstreamSubscription};
pub use subscriber::Subscriber;
