//! # ThrottleAction: release upstream demand one item per tick.
//!
//! Downstream demand is never forwarded upstream directly. It is recorded as
//! pending on the upstream subscription, and a timer releases one unit per
//! period:
//!
//! ```text
//! downstream request(n) ─► on_request ─► update_pending_requests(n)
//!
//! timer tick ─► dispatch ─► upstream.request(ReleaseOne)
//!                              └─► TimeoutTracker ─► Request(1) ─► publisher
//! ```
//!
//! ## Rules
//! - The timer is scheduled once, when the upstream subscription arrives
//!   (after `delay`, then every `period`).
//! - A tick without an upstream subscription does nothing.
//! - Pause/resume mirror onto the timer; cancel, complete and error cancel it.
//! - Downstream buffers hold a single item; a release landing on a full
//!   buffer is dropped.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use super::action::Action;
use super::operator::Operator;
use crate::dispatch::Dispatcher;
use crate::error::{ActionError, StreamError};
use crate::subscription::{Demand, PushSubscription, Subscription, TrackingSubscription};
use crate::timer::{Registration, Timer, TimerTask};

/// Upstream subscription of a throttle stage.
///
/// Translates every [`Demand::ReleaseOne`] into `Request(1)` (consuming one
/// pending unit when there is one) and passes any other demand through.
pub struct TimeoutTracker {
    inner: PushSubscription,
}

impl TimeoutTracker {
    /// Wraps `inner`.
    pub fn new(inner: PushSubscription) -> Self {
        Self { inner }
    }
}

impl Subscription for TimeoutTracker {
    fn request(&self, demand: Demand) {
        match demand {
            Demand::ReleaseOne => {
                if !self.inner.take_one() {
                    debug!("release with nothing pending");
                }
                self.inner.forward(Demand::Request(1));
            }
            other => self.inner.request(other),
        }
    }

    fn cancel(&self) {
        self.inner.cancel();
    }
}

impl TrackingSubscription for TimeoutTracker {
    fn update_pending_requests(&self, demand: Demand) {
        self.inner.update_pending_requests(demand);
    }

    fn pending_requests(&self) -> Demand {
        self.inner.pending_requests()
    }

    /// The timer releases pending demand; there is never a backlog to hand back.
    fn clear_pending_request(&self) -> Option<Demand> {
        None
    }

    fn pause(&self) {
        self.inner.pause();
    }

    fn resume(&self) {
        self.inner.resume();
    }

    fn is_paused(&self) -> bool {
        self.inner.is_paused()
    }

    fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }
}

/// Operator releasing one upstream item per period.
pub struct Throttle {
    timer: Arc<dyn Timer>,
    period: Duration,
    delay: Duration,
    registration: Mutex<Option<Arc<dyn Registration>>>,
}

/// Stage rate-limiting its upstream to one item per period.
pub type ThrottleAction<T> = Action<T, T, Throttle>;

impl Throttle {
    fn stop(&self) {
        if let Some(reg) = self.registration.lock().take() {
            reg.cancel();
        }
    }

    fn registration(&self) -> Option<Arc<dyn Registration>> {
        self.registration.lock().clone()
    }
}

impl Drop for Throttle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<T: Clone + Send + 'static> Operator<T, T> for Throttle {
    fn do_next(&self, action: &Arc<Action<T, T, Self>>, value: T) -> Result<(), StreamError> {
        action.broadcast_next(value);
        Ok(())
    }

    fn do_error(&self, action: &Arc<Action<T, T, Self>>, error: StreamError) {
        self.stop();
        action.broadcast_error(error);
    }

    fn do_complete(&self, action: &Arc<Action<T, T, Self>>) {
        self.stop();
        action.broadcast_complete();
    }

    fn create_tracking_subscription(
        &self,
        _action: &Arc<Action<T, T, Self>>,
        upstream: Arc<dyn Subscription>,
    ) -> Arc<dyn TrackingSubscription> {
        Arc::new(TimeoutTracker::new(PushSubscription::new(upstream)))
    }

    fn do_subscribe(
        &self,
        action: &Arc<Action<T, T, Self>>,
        _upstream: &Arc<dyn TrackingSubscription>,
    ) -> Result<(), StreamError> {
        let weak = Arc::downgrade(action);
        let tick: TimerTask = Arc::new(move |_now: u64| {
            let Some(action) = weak.upgrade() else {
                return;
            };
            if action.upstream_subscription().is_none() {
                return;
            }
            let released = action.dispatch((), |a, ()| {
                if let Some(up) = a.upstream_subscription() {
                    up.request(Demand::ReleaseOne);
                }
                Ok(())
            });
            if let Err(err) = released {
                debug!(err = %err, "throttle tick dropped");
            }
        });

        let reg = self.timer.schedule(tick, self.period, self.delay)?;
        if let Some(previous) = self.registration.lock().replace(reg) {
            previous.cancel();
        }
        Ok(())
    }

    fn on_request(&self, action: &Arc<Action<T, T, Self>>, demand: Demand) {
        let recorded = action.try_sync_dispatch(demand, |a, d| {
            a.update_pending_requests(d);
            Ok(())
        });
        if let Err(err) = recorded {
            debug!(err = %err, "throttle demand dropped");
        }
    }

    fn on_cancel(&self, _action: &Arc<Action<T, T, Self>>) {
        self.stop();
    }

    fn on_pause(&self, _action: &Arc<Action<T, T, Self>>) {
        if let Some(reg) = self.registration() {
            reg.pause();
        }
    }

    fn on_resume(&self, _action: &Arc<Action<T, T, Self>>) {
        if let Some(reg) = self.registration() {
            reg.resume();
        }
    }
}

impl<T: Clone + Send + 'static> Action<T, T, Throttle> {
    /// Creates a throttle stage releasing one item every `period`, starting after `delay`.
    ///
    /// Fails with [`ActionError::ZeroPeriod`] if `period` is zero.
    pub fn new(
        dispatcher: Arc<dyn Dispatcher>,
        timer: Arc<dyn Timer>,
        period: Duration,
        delay: Duration,
    ) -> Result<Arc<Self>, ActionError> {
        if period.is_zero() {
            return Err(ActionError::ZeroPeriod);
        }
        let action = Self::with_operator(
            dispatcher,
            Throttle {
                timer,
                period,
                delay,
                registration: Mutex::new(None),
            },
        );
        action.set_capacity(1);
        Ok(action)
    }

    /// Returns the release period.
    pub fn period(&self) -> Duration {
        self.operator().period
    }

    /// Returns the delay before the first release.
    pub fn delay(&self) -> Duration {
        self.operator().delay
    }

    /// Returns the timer registration once subscribed.
    pub fn registration(&self) -> Option<Arc<dyn Registration>> {
        self.operator().registration()
    }
}
