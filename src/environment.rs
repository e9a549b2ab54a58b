//! # Environment: shared configuration, timer and dispatchers.
//!
//! An [`Environment`] is what stages share besides their dispatcher:
//! - the [`Config`] (default buffer capacity, dispatcher backlog, shutdown grace),
//! - a [`Timer`] (defaults to [`TokioTimer`]),
//! - the event-loop dispatchers it created, so they can be drained together.
//!
//! ```text
//! Environment::new(cfg)
//!   ├─► event_loop("ingest")  ─► EventLoopDispatcher(backlog = cfg.backlog)
//!   ├─► event_loop("output")  ─► EventLoopDispatcher(backlog = cfg.backlog)
//!   └─► shutdown()            ─► await_and_shutdown_timeout(cfg.grace) on each
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::dispatch::{Dispatcher, EventLoopDispatcher};
use crate::error::DispatchError;
use crate::timer::{Timer, TokioTimer};

/// Shared runtime context for stream stages.
pub struct Environment {
    config: Config,
    timer: Arc<dyn Timer>,
    dispatchers: Mutex<Vec<Arc<dyn Dispatcher>>>,
}

impl Environment {
    /// Creates an environment with a [`TokioTimer`].
    #[must_use]
    pub fn new(config: Config) -> Arc<Self> {
        Self::with_timer(config, Arc::new(TokioTimer::new()))
    }

    /// Creates an environment with a custom timer.
    #[must_use]
    pub fn with_timer(config: Config, timer: Arc<dyn Timer>) -> Arc<Self> {
        Arc::new(Self {
            config,
            timer,
            dispatchers: Mutex::new(Vec::new()),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the shared timer.
    pub fn timer(&self) -> Arc<dyn Timer> {
        Arc::clone(&self.timer)
    }

    /// Creates an event-loop dispatcher sized by `config.backlog` and tracks it
    /// for [`shutdown`](Self::shutdown).
    pub fn event_loop(
        &self,
        name: impl Into<String>,
    ) -> Result<Arc<dyn Dispatcher>, DispatchError> {
        let dispatcher: Arc<dyn Dispatcher> =
            Arc::new(EventLoopDispatcher::new(name, self.config.backlog_clamped())?);
        self.dispatchers.lock().push(Arc::clone(&dispatcher));
        Ok(dispatcher)
    }

    /// Number of tracked dispatchers.
    pub fn dispatcher_count(&self) -> usize {
        self.dispatchers.lock().len()
    }

    /// Drains every tracked dispatcher, each bounded by `config.grace`.
    ///
    /// Returns `true` if all of them drained in time.
    pub async fn shutdown(&self) -> bool {
        let dispatchers = std::mem::take(&mut *self.dispatchers.lock());
        let mut drained = true;
        for d in dispatchers {
            if !d.await_and_shutdown_timeout(self.config.grace).await {
                drained = false;
            }
        }
        if drained {
            info!("all dispatchers drained within grace");
        } else {
            warn!(grace = ?self.config.grace, "grace exceeded");
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_shutdown_drains_tracked_dispatchers() {
        let env = Environment::new(Config {
            backlog: 8,
            grace: Duration::from_secs(1),
            ..Config::default()
        });
        let a = env.event_loop("a").expect("runtime");
        let b = env.event_loop("b").expect("runtime");
        assert_eq!(env.dispatcher_count(), 2);
        assert_eq!(a.backlog_size(), Some(8));

        let hits = Arc::new(AtomicUsize::new(0));
        for d in [&a, &b] {
            let h = Arc::clone(&hits);
            d.execute(Box::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            }))
            .expect("accepted");
        }

        assert!(env.shutdown().await);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(!a.alive() && !b.alive());
        assert_eq!(env.dispatcher_count(), 0);
    }

    #[test]
    fn test_event_loop_needs_runtime() {
        let env = Environment::new(Config::default());
        assert!(matches!(
            env.event_loop("x"),
            Err(DispatchError::NoRuntime)
        ));
    }
}
