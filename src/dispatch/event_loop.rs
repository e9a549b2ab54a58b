//! # EventLoopDispatcher: one ordered lane on a tokio task.
//!
//! Work is queued on a channel and executed, one item at a time, by a single
//! worker task. The worker runs inside a task-local context marker so
//! [`Dispatcher::in_context`] can tell whether the caller is that worker.
//!
//! ```text
//! execute(work)          ─► slot? ─► [mpsc lane] ─► worker task ─► work()
//!                            │                        (CONTEXT = id)
//!                            └─ backlog full → DispatchError::Saturated
//! execute_admitted(work) ─────────► [mpsc lane]   (never Saturated)
//!
//! closed lane → DispatchError::Shutdown
//! ```
//!
//! ## Backlog
//! - `backlog` bounds what [`execute`](Dispatcher::execute) accepts.
//! - Admitted work (stream signals already covered by demand) is counted but
//!   never refused for lack of a slot, so it can push the queue past `backlog`.
//!
//! ## Shutdown
//! - `shutdown()` closes the lane and cancels the worker; queued work is discarded.
//! - `await_and_shutdown*()` closes the lane and lets the worker drain what was
//!   accepted. On timeout the worker is cancelled.
//! - Awaiting from the worker itself would wait forever: it shuts down and returns `false`.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::dispatcher::{Dispatcher, Work};
use crate::error::{DispatchError, StreamError};

tokio::task_local! {
    static CONTEXT: u64;
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Single-lane, ordered dispatcher backed by a tokio task.
pub struct EventLoopDispatcher {
    id: u64,
    name: String,
    backlog: usize,
    alive: AtomicBool,
    queued: Arc<AtomicUsize>,
    tx: Mutex<Option<mpsc::UnboundedSender<Work>>>,
    token: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EventLoopDispatcher {
    /// Spawns the worker on the current tokio runtime.
    ///
    /// `backlog` is clamped to at least 1. Fails with [`DispatchError::NoRuntime`]
    /// outside a runtime.
    pub fn new(name: impl Into<String>, backlog: usize) -> Result<Self, DispatchError> {
        let handle = Handle::try_current().map_err(|_| DispatchError::NoRuntime)?;
        let name = name.into();
        let backlog = backlog.max(1);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let queued = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel::<Work>();

        let lane = run_lane(name.clone(), rx, Arc::clone(&queued), token.clone());
        let worker = handle.spawn(CONTEXT.scope(id, lane));
        debug!(dispatcher = %name, backlog, "event loop started");

        Ok(Self {
            id,
            name,
            backlog,
            alive: AtomicBool::new(true),
            queued,
            tx: Mutex::new(Some(tx)),
            token,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Returns the dispatcher name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, work: Work) -> Result<(), DispatchError> {
        let tx = self.tx.lock();
        let Some(tx) = tx.as_ref() else {
            return Err(DispatchError::Shutdown);
        };
        tx.send(work).map_err(|_| {
            self.queued.fetch_sub(1, Ordering::AcqRel);
            DispatchError::Shutdown
        })
    }

    /// Closes the lane so the worker exits once drained.
    fn close(&self) {
        self.alive.store(false, Ordering::Release);
        self.tx.lock().take();
    }

    async fn drain(&self, timeout: Option<Duration>) -> bool {
        if self.in_context() {
            warn!(dispatcher = %self.name, "await_and_shutdown called from own context");
            self.shutdown();
            return false;
        }
        self.close();

        let Some(worker) = self.worker.lock().take() else {
            return true;
        };
        let joined = match timeout {
            Some(d) => tokio::time::timeout(d, worker).await.ok(),
            None => Some(worker.await),
        };
        match joined {
            Some(_) => true,
            None => {
                warn!(dispatcher = %self.name, "drain timed out; discarding queued work");
                self.token.cancel();
                false
            }
        }
    }
}

async fn run_lane(
    name: String,
    mut rx: mpsc::UnboundedReceiver<Work>,
    queued: Arc<AtomicUsize>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            work = rx.recv() => match work {
                Some(work) => {
                    queued.fetch_sub(1, Ordering::AcqRel);
                    if let Err(payload) = catch_unwind(AssertUnwindSafe(work)) {
                        let err = StreamError::from_panic(payload);
                        error!(dispatcher = %name, err = %err, "work panicked");
                    }
                }
                None => break,
            }
        }
    }
    debug!(dispatcher = %name, "event loop stopped");
}

#[async_trait]
impl Dispatcher for EventLoopDispatcher {
    fn execute(&self, work: Work) -> Result<(), DispatchError> {
        if !self.alive() {
            return Err(DispatchError::Shutdown);
        }
        let backlog = self.backlog;
        self.queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < backlog).then_some(n + 1)
            })
            .map_err(|_| DispatchError::Saturated { backlog })?;
        self.send(work)
    }

    fn execute_admitted(&self, work: Work) -> Result<(), DispatchError> {
        if !self.alive() {
            return Err(DispatchError::Shutdown);
        }
        self.queued.fetch_add(1, Ordering::AcqRel);
        self.send(work)
    }

    fn alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn shutdown(&self) {
        self.close();
        self.token.cancel();
    }

    async fn await_and_shutdown(&self) -> bool {
        self.drain(None).await
    }

    async fn await_and_shutdown_timeout(&self, timeout: Duration) -> bool {
        self.drain(Some(timeout)).await
    }

    fn remaining_slots(&self) -> Option<usize> {
        if self.tx.lock().is_none() {
            return Some(0);
        }
        Some(self.backlog.saturating_sub(self.queued.load(Ordering::Acquire)))
    }

    fn backlog_size(&self) -> Option<usize> {
        Some(self.backlog)
    }

    fn supports_ordering(&self) -> bool {
        true
    }

    fn in_context(&self) -> bool {
        CONTEXT.try_with(|id| *id == self.id).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[test]
    fn test_requires_runtime() {
        assert!(matches!(
            EventLoopDispatcher::new("no-rt", 4),
            Err(DispatchError::NoRuntime)
        ));
    }

    #[tokio::test]
    async fn test_preserves_submission_order() {
        let d = EventLoopDispatcher::new("ordered", 256).expect("runtime");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let s = Arc::clone(&seen);
            d.execute(Box::new(move || s.lock().push(i))).expect("accepted");
        }

        assert!(d.await_and_shutdown().await);
        assert_eq!(*seen.lock(), (0..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_rejects_after_shutdown() {
        let d = EventLoopDispatcher::new("closing", 4).expect("runtime");
        assert!(d.alive());

        d.shutdown();
        d.shutdown();

        assert!(!d.alive());
        assert_eq!(
            d.execute(Box::new(|| {})).unwrap_err(),
            DispatchError::Shutdown
        );
        assert_eq!(d.remaining_slots(), Some(0));
    }

    #[tokio::test]
    async fn test_saturated_backlog() {
        let d = EventLoopDispatcher::new("tight", 1).expect("runtime");
        assert_eq!(d.backlog_size(), Some(1));
        assert_eq!(d.remaining_slots(), Some(1));

        d.execute(Box::new(|| {})).expect("first slot");
        assert_eq!(
            d.execute(Box::new(|| {})).unwrap_err(),
            DispatchError::Saturated { backlog: 1 }
        );
        assert!(d.await_and_shutdown().await);
    }

    #[tokio::test]
    async fn test_admitted_work_exceeds_backlog() {
        let d = EventLoopDispatcher::new("admitted", 1).expect("runtime");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        d.execute(Box::new(move || s.lock().push(1))).expect("first slot");
        for i in 2..=4 {
            let s = Arc::clone(&seen);
            d.execute_admitted(Box::new(move || s.lock().push(i)))
                .expect("admitted");
        }
        assert_eq!(d.remaining_slots(), Some(0));
        assert!(matches!(
            d.execute(Box::new(|| {})),
            Err(DispatchError::Saturated { backlog: 1 })
        ));

        assert!(d.await_and_shutdown().await);
        assert_eq!(*seen.lock(), vec![1, 2, 3, 4]);
        assert!(matches!(
            d.execute_admitted(Box::new(|| {})),
            Err(DispatchError::Shutdown)
        ));
    }

    #[tokio::test]
    async fn test_in_context_only_on_worker() {
        let d = Arc::new(EventLoopDispatcher::new("ctx", 4).expect("runtime"));
        let other = EventLoopDispatcher::new("other", 4).expect("runtime");
        assert!(!d.in_context());

        let flags = Arc::new(Mutex::new(Vec::new()));
        let (f, me) = (Arc::clone(&flags), Arc::clone(&d));
        let other_id = other.id;
        d.execute(Box::new(move || {
            f.lock().push(me.in_context());
            f.lock().push(CONTEXT.try_with(|id| *id == other_id).unwrap_or(false));
        }))
        .expect("accepted");

        assert!(d.await_and_shutdown().await);
        assert_eq!(*flags.lock(), vec![true, false]);
        other.shutdown();
    }

    #[tokio::test]
    async fn test_panicking_work_keeps_lane_running() {
        let d = EventLoopDispatcher::new("panics", 4).expect("runtime");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);

        d.execute(Box::new(|| panic!("boom"))).expect("accepted");
        d.execute(Box::new(move || s.lock().push("after")))
            .expect("accepted");

        assert!(d.await_and_shutdown().await);
        assert_eq!(*seen.lock(), vec!["after"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_await_timeout_returns_false() {
        let d = EventLoopDispatcher::new("slow", 4).expect("runtime");
        d.execute(Box::new(|| std::thread::sleep(Duration::from_millis(300))))
            .expect("accepted");

        assert!(!d.await_and_shutdown_timeout(Duration::from_millis(20)).await);
        assert!(!d.alive());
    }

    #[tokio::test]
    async fn test_await_from_own_context_does_not_wait() {
        let d = EventLoopDispatcher::new("self", 4).expect("runtime");

        let drained = CONTEXT.scope(d.id, d.await_and_shutdown()).await;

        assert!(!drained);
        assert!(!d.alive());
    }
}
