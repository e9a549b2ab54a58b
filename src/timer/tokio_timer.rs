//! # TokioTimer: periodic tasks on tokio time.
//!
//! Each registration is one spawned task driving a [`tokio::time::interval`];
//! missed ticks are delayed, never bursted.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::runtime::Handle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::timer::{Registration, Timer, TimerTask};
use crate::error::{DispatchError, StreamError};

/// [`Timer`] backed by the tokio runtime it is called from.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioTimer;

impl TokioTimer {
    /// Construct a new [`TokioTimer`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Default)]
struct TokioRegistration {
    token: CancellationToken,
    paused: AtomicBool,
}

impl Registration for TokioRegistration {
    fn cancel(&self) {
        self.token.cancel();
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }
}

impl Timer for TokioTimer {
    fn schedule(
        &self,
        task: TimerTask,
        period: Duration,
        delay: Duration,
    ) -> Result<Arc<dyn Registration>, DispatchError> {
        let handle = Handle::try_current().map_err(|_| DispatchError::NoRuntime)?;
        // interval() panics on a zero period
        let period = period.max(Duration::from_millis(1));
        let reg = Arc::new(TokioRegistration::default());
        let r = Arc::clone(&reg);

        handle.spawn(async move {
            tokio::select! {
                _ = r.token.cancelled() => return,
                _ = sleep(delay) => {}
            }
            let mut ticks = interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = r.token.cancelled() => break,
                    _ = ticks.tick() => {
                        if r.is_paused() {
                            continue;
                        }
                        let run = catch_unwind(AssertUnwindSafe(|| task(now_millis())));
                        if let Err(payload) = run {
                            let err = StreamError::from_panic(payload);
                            warn!(err = %err, "timer task panicked");
                        }
                    }
                }
            }
        });

        Ok(reg)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, TimerTask) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, Arc::new(move |_now: u64| {
            c.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn test_requires_runtime() {
        let (_, task) = counter();
        assert!(matches!(
            TokioTimer.schedule(task, Duration::from_millis(10), Duration::ZERO),
            Err(DispatchError::NoRuntime)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_after_delay_then_every_period() {
        let (count, task) = counter();
        let reg = TokioTimer
            .schedule(task, Duration::from_millis(100), Duration::from_millis(50))
            .expect("runtime");

        sleep(Duration::from_millis(40)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(220)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        reg.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_skips_and_cancel_stops() {
        let (count, task) = counter();
        let reg = TokioTimer
            .schedule(task, Duration::from_millis(100), Duration::ZERO)
            .expect("runtime");

        sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        reg.pause();
        assert!(reg.is_paused());
        sleep(Duration::from_millis(300)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        reg.resume();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        reg.cancel();
        assert!(reg.is_cancelled());
        sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
