//! Dispatchers: where stream work runs.
//!
//! ## Contents
//! - [`Dispatcher`], [`DispatcherExt`] the contract and its routed entry points
//! - [`SyncDispatcher`] runs work on the calling thread
//! - [`EventLoopDispatcher`] runs work in order on a single tokio task
//!
//! High-throughput ring-buffer and thread-pool dispatchers plug in through the
//! same [`Dispatcher`] trait.

mod dispatcher;
mod event_loop;
mod sync;

pub use dispatcher::{Dispatcher, DispatcherExt, Work};
pub use event_loop::EventLoopDispatcher;
pub use sync::SyncDispatcher;
