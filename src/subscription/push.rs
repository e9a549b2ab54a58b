//! # PushSubscription: upstream demand tracking for one stage.
//!
//! A stage never talks to its upstream subscription directly. It wraps it in a
//! [`TrackingSubscription`], by default a [`PushSubscription`], which adds:
//! - a pending-demand counter (demand accepted but not yet forwarded upstream),
//! - pause/resume (demand requested while paused is held back, not lost),
//! - exactly-once cancellation.
//!
//! ## Decorators
//! ```text
//! Stage ──request(d)──► [decorator] ──request(d')──► PushSubscription ──► upstream
//! ```
//! Operators that need to intercept the demand protocol implement
//! [`TrackingSubscription`] around a `PushSubscription` and override only the
//! methods they change (see the throttle stage's `TimeoutTracker`).
//!
//! ## Rules
//! - `Demand::ReleaseOne` releases one pending unit if any is pending, otherwise nothing.
//! - While paused, `Request`/`Unbounded` demand accumulates in the pending counter.
//! - `clear_pending_request` hands the accumulated demand back to the caller
//!   (used by the stage on resume); `None` means there is nothing to release.

use std::sync::Arc;

use parking_lot::Mutex;

use super::demand::{Demand, DemandCounter};
use super::handle::Subscription;

/// The subscription contract a stage holds for its upstream.
pub trait TrackingSubscription: Subscription {
    /// Adds demand to the pending counter without forwarding it upstream.
    fn update_pending_requests(&self, demand: Demand);

    /// Returns the pending demand (`Request(0)` when nothing is pending).
    fn pending_requests(&self) -> Demand;

    /// Takes the pending demand so the caller can release it.
    ///
    /// `None` means there is no backlog to report: either nothing is pending or
    /// the subscription manages its own release.
    fn clear_pending_request(&self) -> Option<Demand>;

    /// Holds back subsequent demand until [`resume`](Self::resume).
    fn pause(&self);

    /// Stops holding back demand. Already pending demand is not flushed here;
    /// the owner decides via [`clear_pending_request`](Self::clear_pending_request).
    fn resume(&self);

    /// Returns `true` while paused.
    fn is_paused(&self) -> bool;

    /// Returns `true` once cancelled.
    fn is_cancelled(&self) -> bool;
}

#[derive(Debug, Default)]
struct PushState {
    pending: DemandCounter,
    paused: bool,
    cancelled: bool,
}

/// Default [`TrackingSubscription`]: wraps exactly one upstream subscription.
pub struct PushSubscription {
    upstream: Arc<dyn Subscription>,
    state: Mutex<PushState>,
}

impl PushSubscription {
    /// Wraps `upstream`.
    pub fn new(upstream: Arc<dyn Subscription>) -> Self {
        Self {
            upstream,
            state: Mutex::new(PushState::default()),
        }
    }

    /// Forwards `demand` upstream as-is, bypassing pause and pending bookkeeping.
    ///
    /// Ignored after cancellation.
    pub fn forward(&self, demand: Demand) {
        if self.state.lock().cancelled {
            return;
        }
        self.upstream.request(demand);
    }

    /// Consumes one pending unit if available.
    pub fn take_one(&self) -> bool {
        self.state.lock().pending.consume_one()
    }
}

impl Subscription for PushSubscription {
    fn request(&self, demand: Demand) {
        let forward = {
            let mut st = self.state.lock();
            if st.cancelled {
                return;
            }
            match demand {
                Demand::ReleaseOne => st.pending.consume_one().then_some(Demand::Request(1)),
                d if st.paused => {
                    st.pending.add(d);
                    None
                }
                d => Some(d),
            }
        };
        if let Some(d) = forward {
            self.upstream.request(d);
        }
    }

    fn cancel(&self) {
        {
            let mut st = self.state.lock();
            if st.cancelled {
                return;
            }
            st.cancelled = true;
        }
        self.upstream.cancel();
    }
}

impl TrackingSubscription for PushSubscription {
    fn update_pending_requests(&self, demand: Demand) {
        let mut st = self.state.lock();
        if !st.cancelled {
            st.pending.add(demand);
        }
    }

    fn pending_requests(&self) -> Demand {
        self.state.lock().pending.current()
    }

    fn clear_pending_request(&self) -> Option<Demand> {
        self.state.lock().pending.take()
    }

    fn pause(&self) {
        self.state.lock().paused = true;
    }

    fn resume(&self) {
        self.state.lock().paused = false;
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSubscription;

    #[test]
    fn test_request_passes_through_when_active() {
        let upstream = RecordingSubscription::new();
        let sub = PushSubscription::new(upstream.clone());

        sub.request(Demand::Request(5));
        sub.request(Demand::Unbounded);

        assert_eq!(
            upstream.requests(),
            vec![Demand::Request(5), Demand::Unbounded]
        );
    }

    #[test]
    fn test_release_one_only_consumes_pending() {
        let upstream = RecordingSubscription::new();
        let sub = PushSubscription::new(upstream.clone());

        sub.request(Demand::ReleaseOne);
        assert!(upstream.requests().is_empty());

        sub.update_pending_requests(Demand::Request(1));
        sub.request(Demand::ReleaseOne);
        sub.request(Demand::ReleaseOne);
        assert_eq!(upstream.requests(), vec![Demand::Request(1)]);
    }

    #[test]
    fn test_paused_demand_is_held_back() {
        let upstream = RecordingSubscription::new();
        let sub = PushSubscription::new(upstream.clone());

        sub.pause();
        sub.request(Demand::Request(3));
        sub.request(Demand::Request(4));
        assert!(upstream.requests().is_empty());
        assert_eq!(sub.pending_requests(), Demand::Request(7));

        sub.resume();
        assert_eq!(sub.clear_pending_request(), Some(Demand::Request(7)));
        assert_eq!(sub.clear_pending_request(), None);
    }

    #[test]
    fn test_cancel_is_exactly_once() {
        let upstream = RecordingSubscription::new();
        let sub = PushSubscription::new(upstream.clone());

        sub.cancel();
        sub.cancel();
        sub.request(Demand::Request(1));
        sub.forward(Demand::Request(1));

        assert_eq!(upstream.cancels(), 1);
        assert!(upstream.requests().is_empty());
        assert!(sub.is_cancelled());
    }
}
