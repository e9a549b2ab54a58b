//! Consumer routing: what a dispatch invokes and how failures are isolated.
//!
//! ## Contents
//! - [`Consumer`], [`ErrorConsumer`], [`CompletionConsumer`] the callables
//! - [`Router`], [`ConsumerRouter`] invocation strategy with per-consumer isolation
//! - [`Registry`], [`ConsumerRegistry`] key-based consumer selection

mod consumer;
mod registry;
mod router;

pub use consumer::{CompletionConsumer, Consumer, ErrorConsumer};
pub use registry::{ConsumerRegistry, Registry};
pub(crate) use router::guarded;
pub use router::{ConsumerRouter, Router};
