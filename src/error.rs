//! Error types used by dispatchers, stream stages and operators.
//!
//! This module defines three error enums:
//!
//! - [`DispatchError`] - lifecycle errors raised by a [`Dispatcher`](crate::Dispatcher)
//!   when work cannot be accepted.
//! - [`StreamError`] - errors travelling through a stream (`on_error` signals),
//!   including failures captured at the dispatch boundary.
//! - [`ActionError`] - invalid operator construction parameters.
//!
//! All types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::any::Any;
use std::borrow::Cow;

use thiserror::Error;

/// # Errors produced when submitting work to a dispatcher.
///
/// These are **lifecycle** errors: they are returned to the caller immediately
/// and never routed through a stream.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The dispatcher has been shut down (or is shutting down) and accepts no more work.
    #[error("dispatcher is not alive")]
    Shutdown,

    /// The dispatcher's bounded backlog is full.
    #[error("dispatcher backlog of {backlog} slots is full")]
    Saturated {
        /// The configured backlog size.
        backlog: usize,
    },

    /// No tokio runtime is available to host the execution context.
    #[error("no tokio runtime available")]
    NoRuntime,
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use streamvisor::DispatchError;
    ///
    /// assert_eq!(DispatchError::Shutdown.as_label(), "dispatch_shutdown");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::Shutdown => "dispatch_shutdown",
            DispatchError::Saturated { .. } => "dispatch_saturated",
            DispatchError::NoRuntime => "dispatch_no_runtime",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            DispatchError::Shutdown => "dispatcher shut down".to_string(),
            DispatchError::Saturated { backlog } => format!("backlog full ({backlog} slots)"),
            DispatchError::NoRuntime => "no runtime".to_string(),
        }
    }
}

/// # Errors delivered through a stream.
///
/// A `StreamError` is what downstream subscribers observe in `on_error`.
/// It is `Clone` because an error signal fans out to every downstream subscriber
/// (and, for group-by, to every live grouped stream).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Error signalled by an upstream publisher.
    #[error("upstream error: {reason}")]
    Upstream {
        /// The underlying error message.
        reason: Cow<'static, str>,
    },

    /// A consumer or stage hook returned an error.
    #[error("consumer failed: {reason}")]
    ConsumerFailed {
        /// The underlying error message.
        reason: Cow<'static, str>,
    },

    /// A consumer or stage hook panicked; the panic was caught at the dispatch boundary.
    #[error("consumer panicked: {info}")]
    ConsumerPanicked {
        /// Panic payload rendered as text (when it was a string).
        info: Cow<'static, str>,
    },

    /// A subscriber requested zero items, which the demand protocol forbids.
    #[error("demand must be positive")]
    InvalidDemand,

    /// A signal could not be dispatched.
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

impl StreamError {
    /// Creates an [`StreamError::Upstream`] error.
    pub fn upstream(reason: impl Into<Cow<'static, str>>) -> Self {
        StreamError::Upstream {
            reason: reason.into(),
        }
    }

    /// Creates a [`StreamError::ConsumerFailed`] error.
    ///
    /// # Example
    /// ```
    /// use streamvisor::StreamError;
    ///
    /// let err = StreamError::failed("boom");
    /// assert_eq!(err.as_label(), "consumer_failed");
    /// assert_eq!(err.to_string(), "consumer failed: boom");
    /// ```
    pub fn failed(reason: impl Into<Cow<'static, str>>) -> Self {
        StreamError::ConsumerFailed {
            reason: reason.into(),
        }
    }

    /// Converts a caught panic payload into [`StreamError::ConsumerPanicked`].
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let info: Cow<'static, str> = if let Some(s) = payload.downcast_ref::<&'static str>() {
            Cow::Borrowed(*s)
        } else if let Some(s) = payload.downcast_ref::<String>() {
            Cow::Owned(s.clone())
        } else {
            Cow::Borrowed("non-string panic payload")
        };
        StreamError::ConsumerPanicked { info }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StreamError::Upstream { .. } => "stream_upstream",
            StreamError::ConsumerFailed { .. } => "consumer_failed",
            StreamError::ConsumerPanicked { .. } => "consumer_panicked",
            StreamError::InvalidDemand => "invalid_demand",
            StreamError::Dispatch(e) => e.as_label(),
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            StreamError::Upstream { reason } => format!("upstream: {reason}"),
            StreamError::ConsumerFailed { reason } => format!("error: {reason}"),
            StreamError::ConsumerPanicked { info } => format!("panic: {info}"),
            StreamError::InvalidDemand => "non-positive demand".to_string(),
            StreamError::Dispatch(e) => e.as_message(),
        }
    }
}

/// # Errors produced when constructing an operator.
///
/// Required collaborators are enforced by the type system; what remains are
/// parameter values that would make the operator meaningless.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionError {
    /// A throttle period of zero would release demand in a busy loop.
    #[error("throttle period must be greater than zero")]
    ZeroPeriod,
}

impl ActionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ActionError::ZeroPeriod => "action_zero_period",
        }
    }

    /// Returns a human-readable message (for logs).
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}
