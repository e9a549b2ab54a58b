//! # Router: invokes the consumers matched for one dispatch.
//!
//! [`ConsumerRouter`] is the in-order implementation.
//!
//! ## Rules
//! - Consumers run in the order they were selected.
//! - A consumer returning `Err` **or panicking** is isolated: the failure goes to the
//!   error consumer and the remaining consumers still run.
//! - Without an error consumer the failure is logged and swallowed.
//!
//! ```text
//! route(data, [c1, c2, c3], completion, error)
//!    ├─► c1.accept(data.clone())   Ok
//!    ├─► c2.accept(data.clone())   Err/panic ──► error(err)
//!    ├─► c3.accept(data.clone())   Ok
//!    └─► completion(data)
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::warn;

use super::consumer::{CompletionConsumer, Consumer, ErrorConsumer};
use crate::error::StreamError;

/// Strategy for invoking consumers.
pub trait Router<E>: Send + Sync + 'static {
    /// Invokes every consumer with `data`, then `completion`.
    fn route(
        &self,
        data: E,
        consumers: &[Arc<dyn Consumer<E>>],
        completion: Option<CompletionConsumer<E>>,
        error: Option<&ErrorConsumer>,
    );

    /// Invokes a single known consumer.
    fn route_one(&self, data: E, consumer: &Arc<dyn Consumer<E>>, error: Option<&ErrorConsumer>);
}

/// Router invoking consumers sequentially, in order.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsumerRouter;

impl ConsumerRouter {
    /// Construct a new [`ConsumerRouter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<E: Clone + Send + 'static> Router<E> for ConsumerRouter {
    fn route(
        &self,
        data: E,
        consumers: &[Arc<dyn Consumer<E>>],
        completion: Option<CompletionConsumer<E>>,
        error: Option<&ErrorConsumer>,
    ) {
        for consumer in consumers {
            let value = data.clone();
            guarded(|| consumer.accept(value), error);
        }
        if let Some(done) = completion {
            guarded(
                || {
                    done(data);
                    Ok(())
                },
                error,
            );
        }
    }

    fn route_one(&self, data: E, consumer: &Arc<dyn Consumer<E>>, error: Option<&ErrorConsumer>) {
        guarded(|| consumer.accept(data), error);
    }
}

/// Runs `f`, turning an `Err` or a panic into a report to `error`.
pub(crate) fn guarded<F>(f: F, error: Option<&ErrorConsumer>)
where
    F: FnOnce() -> Result<(), StreamError>,
{
    let outcome = match catch_unwind(AssertUnwindSafe(f)) {
        Ok(res) => res,
        Err(payload) => Err(StreamError::from_panic(payload)),
    };
    if let Err(err) = outcome {
        report(err, error);
    }
}

/// Hands `err` to the error consumer, or logs it when there is none.
pub(crate) fn report(err: StreamError, error: Option<&ErrorConsumer>) {
    match error {
        Some(on_error) => on_error(err),
        None => warn!(err = %err, label = err.as_label(), "consumer failed without error consumer"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recording(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Arc<dyn Consumer<u32>> {
        let log = Arc::clone(log);
        Arc::new(move |v: u32| -> Result<(), StreamError> {
            log.lock().push(format!("{tag}:{v}"));
            Ok(())
        })
    }

    #[test]
    fn test_failure_isolated_per_consumer() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let errs = Arc::clone(&errors);
        let on_error: ErrorConsumer = Arc::new(move |e: StreamError| errs.lock().push(e));

        let failing: Arc<dyn Consumer<u32>> =
            Arc::new(|_v: u32| -> Result<(), StreamError> { Err(StreamError::failed("nope")) });
        let panicking: Arc<dyn Consumer<u32>> = Arc::new(|_v: u32| -> Result<(), StreamError> {
            panic!("kaboom");
        });
        let consumers = vec![
            recording(&log, "a"),
            failing,
            panicking,
            recording(&log, "b"),
        ];

        ConsumerRouter.route(7, &consumers, None, Some(&on_error));

        assert_eq!(*log.lock(), vec!["a:7".to_string(), "b:7".to_string()]);
        let errors = errors.lock();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], StreamError::failed("nope"));
        assert_eq!(errors[1].as_label(), "consumer_panicked");
    }

    #[test]
    fn test_completion_runs_after_consumers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let done_log = Arc::clone(&log);
        let consumers = vec![recording(&log, "a")];

        ConsumerRouter.route(
            1,
            &consumers,
            Some(Box::new(move |v| done_log.lock().push(format!("done:{v}")))),
            None,
        );

        assert_eq!(*log.lock(), vec!["a:1".to_string(), "done:1".to_string()]);
    }

    #[test]
    fn test_failure_without_error_consumer_is_swallowed() {
        let failing: Arc<dyn Consumer<u32>> =
            Arc::new(|_v: u32| -> Result<(), StreamError> { Err(StreamError::failed("ignored")) });
        ConsumerRouter.route_one(1, &failing, None);
    }
}
