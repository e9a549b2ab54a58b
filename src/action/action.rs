//! # Action: a stream stage.
//!
//! An [`Action`] subscribes to one upstream publisher and publishes to any number
//! of downstream subscribers. Its behavior comes from an [`Operator`]; the action
//! owns the plumbing around it:
//!
//! ```text
//!                    ┌───────────────────────────── Action ─────────────────────────────┐
//!  upstream ──on_*──►│ try_sync_dispatch ─► [dispatcher] ─► Operator::do_* ─► broadcast_*│──► DownstreamSet
//!      ▲             │                                                                  │       │
//!      │             │  TrackingSubscription ◄── request_upstream ◄── Operator::on_request ◄──┘ request(n)
//!      └─────────────│  (PushSubscription or decorator)                                 │
//!                    └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//! ```text
//! Unsubscribed ──on_subscribe──► Active ⇄ Paused
//!       │                          │
//!       └──────────────┬───────────┘
//!                      ▼
//!       Completed | Errored | Cancelled   (terminal, entered exactly once)
//! ```
//!
//! ## Rules
//! - Upstream signals and downstream demand always run through the action's
//!   dispatcher (inline when the caller already is on it), so subscribers only
//!   ever see `on_next`/`on_complete` from that context.
//! - Signals take the admitted path: a full backlog never drops them.
//! - A hook returning `Err` or panicking is isolated at the dispatch boundary and
//!   turned into `do_error`; the upstream is cancelled.
//! - Terminal transitions happen once; later signals are ignored.
//! - Demand requested before an upstream exists is kept and flushed on subscribe.
//! - Locks are never held while a hook or a subscriber runs.

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::operator::Operator;
use crate::config::Config;
use crate::dispatch::{Dispatcher, Work};
use crate::environment::Environment;
use crate::error::{DispatchError, StreamError};
use crate::routing::{ErrorConsumer, guarded};
use crate::subscribers::{
    DemandSink, Downstream, DownstreamSet, DownstreamSubscription, Subscriber,
};
use crate::subscription::{
    Demand, DemandCounter, NoopSubscription, Publisher, Subscription, TrackingSubscription,
};

/// Lifecycle state of an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    /// No upstream subscription yet.
    Unsubscribed,
    /// Subscribed and flowing.
    Active,
    /// Subscribed; upstream demand is held back.
    Paused,
    /// Completed (terminal).
    Completed,
    /// Cancelled (terminal).
    Cancelled,
    /// Failed (terminal).
    Errored,
}

impl ActionState {
    /// Returns `true` for completed, cancelled and errored.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionState::Completed | ActionState::Cancelled | ActionState::Errored
        )
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ActionState::Unsubscribed => "unsubscribed",
            ActionState::Active => "active",
            ActionState::Paused => "paused",
            ActionState::Completed => "completed",
            ActionState::Cancelled => "cancelled",
            ActionState::Errored => "errored",
        }
    }
}

struct Lifecycle {
    state: ActionState,
    /// Demand to request once an upstream exists.
    pending: DemandCounter,
    /// Demand to record (not request) once an upstream exists.
    pending_updates: DemandCounter,
    error: Option<StreamError>,
}

/// How a new downstream subscriber is served.
enum Attach<O> {
    Live(Arc<Downstream<O>>),
    Cancelled,
    Completed,
    Errored(StreamError),
}

/// Stream stage: subscriber of `I`, publisher of `O`, behavior `Op`.
pub struct Action<I, O, Op> {
    me: Weak<Self>,
    dispatcher: Arc<dyn Dispatcher>,
    op: Op,
    environment: RwLock<Option<Arc<Environment>>>,
    upstream: Mutex<Option<Arc<dyn TrackingSubscription>>>,
    downstream: DownstreamSet<O>,
    lifecycle: Mutex<Lifecycle>,
    on_error: ErrorConsumer,
    _input: PhantomData<fn(I)>,
}

impl<I, O, Op> Action<I, O, Op>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    Op: Operator<I, O>,
{
    /// Creates an action running `op` on `dispatcher`, with the default capacity.
    pub fn with_operator(dispatcher: Arc<dyn Dispatcher>, op: Op) -> Arc<Self> {
        Self::build(dispatcher, op, DownstreamSet::new(Config::DEFAULT_CAPACITY))
    }

    /// Creates an action sharing `environment`, sized by its configured capacity.
    pub fn with_environment(
        dispatcher: Arc<dyn Dispatcher>,
        op: Op,
        environment: Arc<Environment>,
    ) -> Arc<Self> {
        let action = Self::build(
            dispatcher,
            op,
            DownstreamSet::new(environment.config().capacity),
        );
        action.set_environment(environment);
        action
    }

    pub(crate) fn build(
        dispatcher: Arc<dyn Dispatcher>,
        op: Op,
        downstream: DownstreamSet<O>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Self>| {
            let weak = me.clone();
            let on_error: ErrorConsumer = Arc::new(move |err: StreamError| {
                if let Some(action) = weak.upgrade() {
                    action.cancel_upstream();
                    action.fail(err);
                }
            });
            Self {
                me: me.clone(),
                dispatcher,
                op,
                environment: RwLock::new(None),
                upstream: Mutex::new(None),
                downstream,
                lifecycle: Mutex::new(Lifecycle {
                    state: ActionState::Unsubscribed,
                    pending: DemandCounter::new(),
                    pending_updates: DemandCounter::new(),
                    error: None,
                }),
                on_error,
                _input: PhantomData,
            }
        })
    }

    /// Returns the dispatcher all hooks run on.
    pub fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.dispatcher
    }

    /// Returns the operator.
    pub fn operator(&self) -> &Op {
        &self.op
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> ActionState {
        self.lifecycle.lock().state
    }

    /// Per-subscriber buffer size (`0` = unbounded).
    pub fn capacity(&self) -> usize {
        self.downstream.capacity()
    }

    /// Sets the buffer size for subscribers attached from now on.
    pub fn set_capacity(&self, capacity: usize) {
        self.downstream.set_capacity(capacity);
    }

    /// Returns the shared environment, if any.
    pub fn environment(&self) -> Option<Arc<Environment>> {
        self.environment.read().clone()
    }

    /// Shares `environment` with this action.
    pub fn set_environment(&self, environment: Arc<Environment>) {
        *self.environment.write() = Some(environment);
    }

    /// Returns the upstream subscription once subscribed.
    pub fn upstream_subscription(&self) -> Option<Arc<dyn TrackingSubscription>> {
        self.upstream.lock().clone()
    }

    /// Number of attached downstream subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.downstream.len()
    }

    /// Runs `f(action, data)` on the dispatcher.
    ///
    /// Failures of `f` (error or panic) become `do_error`.
    pub fn dispatch<D, F>(&self, data: D, f: F) -> Result<(), DispatchError>
    where
        D: Send + 'static,
        F: FnOnce(&Arc<Self>, D) -> Result<(), StreamError> + Send + 'static,
    {
        self.dispatcher.execute(self.work(data, f))
    }

    /// Like [`dispatch`](Self::dispatch), but runs inline when the caller is
    /// already on the dispatcher's context.
    pub fn try_sync_dispatch<D, F>(&self, data: D, f: F) -> Result<(), DispatchError>
    where
        D: Send + 'static,
        F: FnOnce(&Arc<Self>, D) -> Result<(), StreamError> + Send + 'static,
    {
        self.submit(data, f, false)
    }

    fn work<D, F>(&self, data: D, f: F) -> Work
    where
        D: Send + 'static,
        F: FnOnce(&Arc<Self>, D) -> Result<(), StreamError> + Send + 'static,
    {
        let me = self.me.clone();
        Box::new(move || {
            if let Some(action) = me.upgrade() {
                action.run(data, f);
            }
        })
    }

    /// Runs inline on the own context, otherwise submits; `admitted` work is
    /// never refused for a full backlog.
    fn submit<D, F>(&self, data: D, f: F, admitted: bool) -> Result<(), DispatchError>
    where
        D: Send + 'static,
        F: FnOnce(&Arc<Self>, D) -> Result<(), StreamError> + Send + 'static,
    {
        if !self.dispatcher.in_context() {
            let work = self.work(data, f);
            return if admitted {
                self.dispatcher.execute_admitted(work)
            } else {
                self.dispatcher.execute(work)
            };
        }
        if !self.dispatcher.alive() {
            return Err(DispatchError::Shutdown);
        }
        if let Some(action) = self.me.upgrade() {
            action.run(data, f);
        }
        Ok(())
    }

    fn run<D, F>(self: &Arc<Self>, data: D, f: F)
    where
        F: FnOnce(&Arc<Self>, D) -> Result<(), StreamError>,
    {
        guarded(|| f(self, data), Some(&self.on_error));
    }

    /// Submits an upstream signal or downstream demand on the admitted path.
    ///
    /// After shutdown the signal is dropped. Any other rejection fails the
    /// stage so downstream still terminates.
    fn signal<D, F>(&self, what: &'static str, data: D, f: F) -> bool
    where
        D: Send + 'static,
        F: FnOnce(&Arc<Self>, D) -> Result<(), StreamError> + Send + 'static,
    {
        match self.submit(data, f, true) {
            Ok(()) => true,
            Err(DispatchError::Shutdown) => {
                debug!(
                    stage = type_name::<Op>(),
                    signal = what,
                    "dropped signal: dispatcher shut down"
                );
                false
            }
            Err(err) => {
                warn!(
                    stage = type_name::<Op>(),
                    signal = what,
                    err = %err,
                    label = err.as_label(),
                    "signal rejected; failing stage"
                );
                self.cancel_upstream();
                self.broadcast_error(StreamError::Dispatch(err));
                false
            }
        }
    }

    /// Routes `error` to `do_error` unless already terminal.
    fn fail(self: &Arc<Self>, error: StreamError) {
        if self.state().is_terminal() {
            debug!(stage = type_name::<Op>(), err = %error, "error after termination ignored");
            return;
        }
        debug!(stage = type_name::<Op>(), err = %error, label = error.as_label(), "stage failed");
        let fallback = error.clone();
        if catch_unwind(AssertUnwindSafe(|| self.op.do_error(self, error))).is_err() {
            self.broadcast_error(fallback);
        }
    }

    fn cancel_upstream(&self) {
        let upstream = self.upstream.lock().take();
        if let Some(up) = upstream {
            up.cancel();
        }
    }

    /// Installs the upstream subscription and runs the `do_subscribe` hook.
    fn attach(self: &Arc<Self>, upstream: Arc<dyn Subscription>) -> Result<(), StreamError> {
        if self.state() != ActionState::Unsubscribed {
            debug!(stage = type_name::<Op>(), "extra upstream subscription cancelled");
            upstream.cancel();
            return Ok(());
        }
        let tracking = self.op.create_tracking_subscription(self, upstream);
        let (pending, updates) = {
            let mut lc = self.lifecycle.lock();
            if lc.state != ActionState::Unsubscribed {
                drop(lc);
                tracking.cancel();
                return Ok(());
            }
            lc.state = ActionState::Active;
            *self.upstream.lock() = Some(Arc::clone(&tracking));
            (lc.pending.take(), lc.pending_updates.take())
        };
        if let Some(d) = updates {
            tracking.update_pending_requests(d);
        }
        if let Some(d) = pending {
            tracking.request(d);
        }
        self.op.do_subscribe(self, &tracking)
    }

    /// Delivers `value` to every downstream subscriber (buffering where there is no demand).
    pub fn broadcast_next(&self, value: O) {
        if self.state().is_terminal() {
            return;
        }
        self.downstream.emit_next(value);
    }

    /// Fails every downstream subscriber. Terminal; no-op if already terminal.
    pub fn broadcast_error(&self, error: StreamError) {
        {
            let mut lc = self.lifecycle.lock();
            if lc.state.is_terminal() {
                return;
            }
            lc.state = ActionState::Errored;
            lc.error = Some(error.clone());
        }
        self.upstream.lock().take();
        self.downstream.emit_error(&error);
    }

    /// Completes every downstream subscriber. Terminal; no-op if already terminal.
    pub fn broadcast_complete(&self) {
        {
            let mut lc = self.lifecycle.lock();
            if lc.state.is_terminal() {
                return;
            }
            lc.state = ActionState::Completed;
        }
        self.upstream.lock().take();
        self.downstream.emit_complete();
    }

    /// Cancels the upstream and detaches every downstream subscriber silently.
    pub fn cancel(&self) {
        {
            let mut lc = self.lifecycle.lock();
            if lc.state.is_terminal() {
                return;
            }
            lc.state = ActionState::Cancelled;
            lc.pending = DemandCounter::new();
            lc.pending_updates = DemandCounter::new();
        }
        self.cancel_upstream();
        self.downstream.clear();
        if let Some(action) = self.me.upgrade() {
            self.op.on_cancel(&action);
        }
    }

    /// Holds back upstream demand until [`resume`](Self::resume).
    pub fn pause(&self) {
        {
            let mut lc = self.lifecycle.lock();
            if lc.state != ActionState::Active {
                return;
            }
            lc.state = ActionState::Paused;
        }
        if let Some(up) = self.upstream_subscription() {
            up.pause();
        }
        if let Some(action) = self.me.upgrade() {
            self.op.on_pause(&action);
        }
    }

    /// Releases demand held back while paused.
    pub fn resume(&self) {
        {
            let mut lc = self.lifecycle.lock();
            if lc.state != ActionState::Paused {
                return;
            }
            lc.state = ActionState::Active;
        }
        if let Some(up) = self.upstream_subscription() {
            up.resume();
            if let Some(d) = up.clear_pending_request() {
                up.request(d);
            }
        }
        if let Some(action) = self.me.upgrade() {
            self.op.on_resume(&action);
        }
    }

    /// Requests `demand` from the upstream, or keeps it until one is attached.
    pub fn request_upstream(&self, demand: Demand) {
        let upstream = {
            let mut lc = self.lifecycle.lock();
            if lc.state.is_terminal() {
                return;
            }
            match self.upstream.lock().clone() {
                Some(up) => up,
                None => {
                    lc.pending.add(demand);
                    return;
                }
            }
        };
        upstream.request(demand);
    }

    /// Drains the buffer of downstream `id` against `demand` and hands the
    /// unsatisfied remainder to `on_request`. Runs on the dispatcher.
    fn serve_request(self: &Arc<Self>, id: u64, demand: Demand) {
        let Some(lane) = self.downstream.get(id) else {
            return;
        };
        if demand.is_empty() {
            self.downstream.remove(id);
            lane.fail(StreamError::InvalidDemand);
            return;
        }
        let rest = lane.request(demand);
        if lane.is_closed() {
            self.downstream.remove(id);
        }
        let Some(rest) = rest else {
            return;
        };
        if self.state().is_terminal() {
            return;
        }
        self.op.on_request(self, rest);
    }

    /// Records `demand` as pending on the upstream subscription without requesting it.
    pub fn update_pending_requests(&self, demand: Demand) {
        let upstream = {
            let mut lc = self.lifecycle.lock();
            if lc.state.is_terminal() {
                return;
            }
            match self.upstream.lock().clone() {
                Some(up) => up,
                None => {
                    lc.pending_updates.add(demand);
                    return;
                }
            }
        };
        upstream.update_pending_requests(demand);
    }
}

impl<I, O, Op> DemandSink for Action<I, O, Op>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    Op: Operator<I, O>,
{
    fn downstream_request(&self, id: u64, demand: Demand) {
        self.signal("request", (id, demand), |a, (id, demand)| {
            a.serve_request(id, demand);
            Ok(())
        });
    }

    fn downstream_cancel(&self, id: u64) {
        if let Some(lane) = self.downstream.remove(id) {
            lane.close();
        }
    }
}

impl<I, O, Op> Subscriber<I> for Action<I, O, Op>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    Op: Operator<I, O>,
{
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        let rejected = Arc::clone(&subscription);
        if !self.signal("subscribe", subscription, |a, s| a.attach(s)) {
            rejected.cancel();
        }
    }

    fn on_next(&self, value: I) {
        self.signal("next", value, |a, v| {
            if a.state().is_terminal() {
                return Ok(());
            }
            a.op.do_next(a, v)
        });
    }

    fn on_error(&self, error: StreamError) {
        self.signal("error", error, |a, e| {
            a.fail(e);
            Ok(())
        });
    }

    fn on_complete(&self) {
        self.signal("complete", (), |a, ()| {
            if !a.state().is_terminal() {
                a.op.do_complete(a);
            }
            Ok(())
        });
    }

    fn name(&self) -> &'static str {
        type_name::<Op>()
    }
}

impl<I, O, Op> Publisher<O> for Action<I, O, Op>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    Op: Operator<I, O>,
{
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<O>>) {
        let attach = {
            let lc = self.lifecycle.lock();
            match lc.state {
                ActionState::Cancelled => Attach::Cancelled,
                ActionState::Errored => Attach::Errored(
                    lc.error
                        .clone()
                        .unwrap_or_else(|| StreamError::upstream("stream failed")),
                ),
                ActionState::Completed if !self.downstream.has_held() => Attach::Completed,
                _ => Attach::Live(self.downstream.add(Arc::clone(&subscriber))),
            }
        };

        match attach {
            Attach::Live(lane) => {
                let sink: Weak<dyn DemandSink> = self.me.clone();
                subscriber.on_subscribe(Arc::new(DownstreamSubscription::new(lane.id(), sink)));
            }
            Attach::Cancelled => subscriber.on_subscribe(Arc::new(NoopSubscription)),
            Attach::Completed => {
                subscriber.on_subscribe(Arc::new(NoopSubscription));
                subscriber.on_complete();
            }
            Attach::Errored(err) => {
                subscriber.on_subscribe(Arc::new(NoopSubscription));
                subscriber.on_error(err);
            }
        }
    }
}

impl<I, O, Op> fmt::Debug for Action<I, O, Op>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    Op: Operator<I, O>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("operator", &type_name::<Op>())
            .field("state", &self.state())
            .field("capacity", &self.capacity())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
