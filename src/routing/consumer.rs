//! # Consumers: the callables a router invokes.
//!
//! A [`Consumer`] accepts one value and may fail. Plain closures are consumers:
//!
//! ```rust
//! use std::sync::Arc;
//! use streamvisor::{Consumer, StreamError};
//!
//! let double: Arc<dyn Consumer<u32>> = Arc::new(|v: u32| {
//!     if v == 0 {
//!         return Err(StreamError::failed("zero"));
//!     }
//!     println!("{}", v * 2);
//!     Ok(())
//! });
//! assert!(double.accept(2).is_ok());
//! ```

use crate::error::StreamError;

/// Receives routed values.
pub trait Consumer<T>: Send + Sync + 'static {
    /// Handles one value. Errors are reported to the dispatch's error consumer.
    fn accept(&self, value: T) -> Result<(), StreamError>;
}

impl<T, F> Consumer<T> for F
where
    F: Fn(T) -> Result<(), StreamError> + Send + Sync + 'static,
{
    fn accept(&self, value: T) -> Result<(), StreamError> {
        self(value)
    }
}

/// Receives failures raised while routing (consumer errors and panics).
pub type ErrorConsumer = std::sync::Arc<dyn Fn(StreamError) + Send + Sync>;

/// Runs once after every selected consumer has been invoked.
pub type CompletionConsumer<T> = Box<dyn FnOnce(T) + Send>;
