//! # LogWriter: simple signal printer
//!
//! A minimal subscriber that requests everything and logs every signal it receives
//! through `tracing`. Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! INFO [subscribed] stream="orders"
//! INFO [next] stream="orders" value=Order { id: 7 }
//! INFO [error] stream="orders" err="upstream error: closed" label="stream_upstream"
//! INFO [complete] stream="orders"
//! ```

use std::fmt::Debug;
use std::sync::Arc;

use tracing::info;

use crate::error::StreamError;
use crate::subscribers::Subscriber;
use crate::subscription::{Demand, Subscription};

/// Signal writer subscriber.
#[derive(Debug, Clone)]
pub struct LogWriter {
    stream: &'static str,
}

impl Default for LogWriter {
    fn default() -> Self {
        Self::new("stream")
    }
}

impl LogWriter {
    /// Construct a new [`LogWriter`] tagging its lines with `stream`.
    #[must_use]
    pub fn new(stream: &'static str) -> Self {
        Self { stream }
    }
}

impl<T: Debug + Send + 'static> Subscriber<T> for LogWriter {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        info!(stream = self.stream, "[subscribed]");
        subscription.request(Demand::Unbounded);
    }

    fn on_next(&self, value: T) {
        info!(stream = self.stream, value = ?value, "[next]");
    }

    fn on_error(&self, error: StreamError) {
        info!(
            stream = self.stream,
            err = %error,
            label = error.as_label(),
            "[error]"
        );
    }

    fn on_complete(&self) {
        info!(stream = self.stream, "[complete]");
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
