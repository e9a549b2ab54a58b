//! Test doubles shared by the unit tests of this crate.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::StreamError;
use crate::subscribers::Subscriber;
use crate::subscription::{Demand, Publisher, Subscription};

/// Subscription that records every request and cancel.
#[derive(Default)]
pub(crate) struct RecordingSubscription {
    requests: Mutex<Vec<Demand>>,
    cancels: Mutex<usize>,
}

impl RecordingSubscription {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn requests(&self) -> Vec<Demand> {
        self.requests.lock().clone()
    }

    pub(crate) fn cancels(&self) -> usize {
        *self.cancels.lock()
    }
}

impl Subscription for RecordingSubscription {
    fn request(&self, demand: Demand) {
        self.requests.lock().push(demand);
    }

    fn cancel(&self) {
        *self.cancels.lock() += 1;
    }
}

/// Observed signal.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Signal<T> {
    Next(T),
    Error(StreamError),
    Complete,
}

/// Subscriber that records signals and optionally requests on subscribe.
pub(crate) struct Recorder<T> {
    initial: Option<Demand>,
    subscription: Mutex<Option<Arc<dyn Subscription>>>,
    signals: Mutex<Vec<Signal<T>>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    /// Recorder that requests nothing on its own.
    pub(crate) fn new() -> Arc<Self> {
        Self::with_demand(None)
    }

    /// Recorder that requests everything on subscribe.
    pub(crate) fn unbounded() -> Arc<Self> {
        Self::with_demand(Some(Demand::Unbounded))
    }

    pub(crate) fn with_demand(initial: Option<Demand>) -> Arc<Self> {
        Arc::new(Self {
            initial,
            subscription: Mutex::new(None),
            signals: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn request(&self, demand: Demand) {
        let sub = self.subscription.lock().clone();
        if let Some(sub) = sub {
            sub.request(demand);
        }
    }

    pub(crate) fn cancel(&self) {
        let sub = self.subscription.lock().clone();
        if let Some(sub) = sub {
            sub.cancel();
        }
    }

    pub(crate) fn is_subscribed(&self) -> bool {
        self.subscription.lock().is_some()
    }

    pub(crate) fn signals(&self) -> Vec<Signal<T>> {
        self.signals.lock().clone()
    }

    pub(crate) fn values(&self) -> Vec<T> {
        self.signals
            .lock()
            .iter()
            .filter_map(|s| match s {
                Signal::Next(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn completed(&self) -> bool {
        self.signals.lock().iter().any(|s| matches!(s, Signal::Complete))
    }

    pub(crate) fn error(&self) -> Option<StreamError> {
        self.signals.lock().iter().find_map(|s| match s {
            Signal::Error(e) => Some(e.clone()),
            _ => None,
        })
    }
}

impl<T: Clone + Send + 'static> Subscriber<T> for Recorder<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        *self.subscription.lock() = Some(Arc::clone(&subscription));
        if let Some(d) = self.initial {
            subscription.request(d);
        }
    }

    fn on_next(&self, value: T) {
        self.signals.lock().push(Signal::Next(value));
    }

    fn on_error(&self, error: StreamError) {
        self.signals.lock().push(Signal::Error(error));
    }

    fn on_complete(&self) {
        self.signals.lock().push(Signal::Complete);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

/// Manually driven publisher with a single subscriber.
///
/// Ignores demand: tests push items explicitly and inspect what was requested.
pub(crate) struct TestPublisher<T> {
    subscription: Arc<RecordingSubscription>,
    subscriber: Mutex<Option<Arc<dyn Subscriber<T>>>>,
}

impl<T: Send + 'static> TestPublisher<T> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            subscription: RecordingSubscription::new(),
            subscriber: Mutex::new(None),
        })
    }

    pub(crate) fn subscription(&self) -> &Arc<RecordingSubscription> {
        &self.subscription
    }

    fn current(&self) -> Option<Arc<dyn Subscriber<T>>> {
        self.subscriber.lock().clone()
    }

    pub(crate) fn emit(&self, value: T) {
        if let Some(s) = self.current() {
            s.on_next(value);
        }
    }

    pub(crate) fn fail(&self, error: StreamError) {
        if let Some(s) = self.current() {
            s.on_error(error);
        }
    }

    pub(crate) fn complete(&self) {
        if let Some(s) = self.current() {
            s.on_complete();
        }
    }
}

impl<T: Send + 'static> Publisher<T> for TestPublisher<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        *self.subscriber.lock() = Some(Arc::clone(&subscriber));
        subscriber.on_subscribe(self.subscription.clone());
    }
}
