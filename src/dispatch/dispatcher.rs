//! # Dispatcher contract.
//!
//! A [`Dispatcher`] executes units of work on a managed execution context.
//! [`DispatcherExt`] layers the routed entry points on top of the primitive
//! [`Dispatcher::execute`]:
//!
//! ```text
//! dispatch_keyed(key, data, registry, error, router, completion)
//!     └─► execute(work) ──► [context] ──► registry.select(key)
//!                                           └─► router.route(data, consumers, completion, error)
//!
//! dispatch(data, router, consumer, error)
//!     └─► execute(work) ──► [context] ──► router.route_one(data, consumer, error)
//! ```
//!
//! ## Rules
//! - After shutdown every submission fails with [`DispatchError::Shutdown`].
//! - The liveness check is not atomic with a concurrent shutdown; a racing
//!   submission either runs or is rejected, it never crashes.
//! - Consumer failures never reach the submitter: they go to the error consumer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DispatchError;
use crate::routing::{CompletionConsumer, Consumer, ErrorConsumer, Registry, Router};

/// Type-erased unit of work.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Executes work on a managed execution context.
#[async_trait]
pub trait Dispatcher: Send + Sync + 'static {
    /// Submits `work`.
    ///
    /// Fails with [`DispatchError::Shutdown`] when not alive and with
    /// [`DispatchError::Saturated`] when a bounded backlog is full.
    fn execute(&self, work: Work) -> Result<(), DispatchError>;

    /// Submits `work` that was already admitted upstream (a stream signal
    /// covered by demand).
    ///
    /// Fails only with [`DispatchError::Shutdown`]; a full backlog is exceeded
    /// instead of refusing the work. Defaults to [`execute`](Self::execute) for
    /// dispatchers without a bounded backlog.
    fn execute_admitted(&self, work: Work) -> Result<(), DispatchError> {
        self.execute(work)
    }

    /// Returns `true` until shutdown begins.
    fn alive(&self) -> bool;

    /// Stops accepting work and releases the context. Idempotent.
    fn shutdown(&self);

    /// Stops accepting work, waits for accepted work to drain, then shuts down.
    ///
    /// Returns `false` if the context could not be drained.
    async fn await_and_shutdown(&self) -> bool;

    /// Like [`await_and_shutdown`](Self::await_and_shutdown), bounded by `timeout`.
    ///
    /// Returns `false` if the timeout elapsed first; undrained work is discarded.
    async fn await_and_shutdown_timeout(&self, timeout: Duration) -> bool;

    /// Free backlog slots, `None` if the dispatcher has no bounded backlog.
    fn remaining_slots(&self) -> Option<usize>;

    /// Total backlog size, `None` if the dispatcher has no bounded backlog.
    fn backlog_size(&self) -> Option<usize>;

    /// Returns `true` if work runs in submission order.
    fn supports_ordering(&self) -> bool;

    /// Returns `true` if the caller is running on this dispatcher's context.
    fn in_context(&self) -> bool;
}

/// Routed submission helpers available on every [`Dispatcher`].
pub trait DispatcherExt: Dispatcher {
    /// Selects consumers for `key` and routes `data` to them on the dispatcher.
    ///
    /// `completion` runs after every consumer; failures go to `error`.
    fn dispatch_keyed<K, E>(
        &self,
        key: K,
        data: E,
        registry: Arc<dyn Registry<K, E>>,
        error: Option<ErrorConsumer>,
        router: Arc<dyn Router<E>>,
        completion: Option<CompletionConsumer<E>>,
    ) -> Result<(), DispatchError>
    where
        K: Send + 'static,
        E: Send + 'static,
    {
        if !self.alive() {
            return Err(DispatchError::Shutdown);
        }
        self.execute(Box::new(move || {
            let consumers = registry.select(&key);
            router.route(data, &consumers, completion, error.as_ref());
        }))
    }

    /// Routes `data` to a single known consumer on the dispatcher.
    fn dispatch<E>(
        &self,
        data: E,
        router: Arc<dyn Router<E>>,
        consumer: Arc<dyn Consumer<E>>,
        error: Option<ErrorConsumer>,
    ) -> Result<(), DispatchError>
    where
        E: Send + 'static,
    {
        if !self.alive() {
            return Err(DispatchError::Shutdown);
        }
        self.execute(Box::new(move || {
            router.route_one(data, &consumer, error.as_ref());
        }))
    }
}

impl<D: Dispatcher + ?Sized> DispatcherExt for D {}
