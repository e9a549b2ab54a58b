//! # SyncDispatcher: runs work on the calling thread.
//!
//! Every caller is "in context", submission order equals execution order, and
//! there is no backlog to introspect.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::error;

use super::dispatcher::{Dispatcher, Work};
use crate::error::{DispatchError, StreamError};

/// Calling-thread dispatcher.
#[derive(Debug)]
pub struct SyncDispatcher {
    alive: AtomicBool,
}

impl Default for SyncDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncDispatcher {
    /// Creates a live dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            alive: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl Dispatcher for SyncDispatcher {
    fn execute(&self, work: Work) -> Result<(), DispatchError> {
        if !self.alive() {
            return Err(DispatchError::Shutdown);
        }
        if let Err(payload) = catch_unwind(AssertUnwindSafe(work)) {
            let err = StreamError::from_panic(payload);
            error!(dispatcher = "sync", err = %err, "work panicked");
        }
        Ok(())
    }

    fn alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn shutdown(&self) {
        self.alive.store(false, Ordering::Release);
    }

    async fn await_and_shutdown(&self) -> bool {
        self.shutdown();
        true
    }

    async fn await_and_shutdown_timeout(&self, _timeout: Duration) -> bool {
        self.await_and_shutdown().await
    }

    fn remaining_slots(&self) -> Option<usize> {
        None
    }

    fn backlog_size(&self) -> Option<usize> {
        None
    }

    fn supports_ordering(&self) -> bool {
        true
    }

    fn in_context(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::dispatch::DispatcherExt;
    use crate::routing::{ConsumerRegistry, ConsumerRouter, ErrorConsumer, Registry, Router};

    #[test]
    fn test_runs_inline() {
        let d = SyncDispatcher::new();
        let hit = Arc::new(AtomicBool::new(false));
        let h = Arc::clone(&hit);

        d.execute(Box::new(move || h.store(true, Ordering::SeqCst)))
            .expect("alive");

        assert!(hit.load(Ordering::SeqCst));
        assert!(d.in_context());
        assert_eq!(d.remaining_slots(), None);
        assert_eq!(d.backlog_size(), None);
    }

    #[test]
    fn test_rejects_after_shutdown() {
        let d = SyncDispatcher::new();
        d.shutdown();
        d.shutdown();

        assert!(!d.alive());
        assert_eq!(
            d.execute(Box::new(|| {})).unwrap_err(),
            DispatchError::Shutdown
        );

        let router: Arc<dyn Router<u32>> = Arc::new(ConsumerRouter);
        let consumer: Arc<dyn crate::Consumer<u32>> =
            Arc::new(|_v: u32| -> Result<(), StreamError> { Ok(()) });
        assert_eq!(
            d.dispatch(1, router, consumer, None).unwrap_err(),
            DispatchError::Shutdown
        );
    }

    #[test]
    fn test_panicking_work_is_contained() {
        let d = SyncDispatcher::new();
        assert!(d.execute(Box::new(|| panic!("boom"))).is_ok());
        assert!(d.alive());
    }

    #[test]
    fn test_dispatch_keyed_selects_and_completes() {
        let d = SyncDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = Arc::new(ConsumerRegistry::<&'static str, u32>::new());

        let s = Arc::clone(&seen);
        registry.register(
            "orders",
            Arc::new(move |v: u32| -> Result<(), StreamError> {
                s.lock().push(format!("orders:{v}"));
                Ok(())
            }),
        );
        registry.register(
            "orders",
            Arc::new(|_v: u32| -> Result<(), StreamError> { Err(StreamError::failed("bad")) }),
        );

        let errors = Arc::new(Mutex::new(Vec::new()));
        let e = Arc::clone(&errors);
        let on_error: ErrorConsumer = Arc::new(move |err: StreamError| e.lock().push(err));
        let s = Arc::clone(&seen);

        d.dispatch_keyed(
            "orders",
            5,
            registry.clone() as Arc<dyn Registry<&'static str, u32>>,
            Some(on_error),
            Arc::new(ConsumerRouter),
            Some(Box::new(move |v| s.lock().push(format!("done:{v}")))),
        )
        .expect("alive");

        assert_eq!(
            *seen.lock(),
            vec!["orders:5".to_string(), "done:5".to_string()]
        );
        assert_eq!(*errors.lock(), vec![StreamError::failed("bad")]);
    }
}
