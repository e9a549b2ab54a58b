//! # DownstreamSet: demand-aware fan-out over the subscribers of one stage
//!
//! [`DownstreamSet`] distributes each item emitted by a stage to every attached
//! subscriber, honoring each subscriber's own demand.
//!
//! ## What it guarantees
//! - Fan-out in subscription order.
//! - Per-subscriber FIFO (buffer order), also under re-entrant `request` calls.
//! - A subscriber without demand never receives `on_next`; its items wait in a
//!   buffer and are released by later `request` calls.
//! - A lossless set ([`DownstreamSet::lossless`], [`DownstreamSet::holding`])
//!   treats `capacity` as a hint and never drops.
//! - Completion is delivered after the buffer drains; errors are delivered at once.
//! - A holding set (grouped streams) keeps what was emitted before the first
//!   subscriber attached and hands it to that subscriber.
//!
//! ## What it does **not** guarantee
//! - No retries on per-subscriber buffer overflow in a dropping set (items are
//!   dropped for that subscriber, with a warning).
//!
//! ## Diagram
//! ```text
//!    emit_next(item)
//!        │                        (clone per subscriber)
//!        ├────────────────► [buffer S1] ─► demand? ─► S1.on_next()
//!        ├────────────────► [buffer S2] ─► demand? ─► S2.on_next()
//!        └────────────────► [buffer SN] ─► demand? ─► SN.on_next()
//! ```
//!
//! Locks are never held while a subscriber runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::Subscriber;
use crate::error::StreamError;
use crate::subscription::{Demand, DemandCounter, Subscription};

/// Receives demand and cancellation from the subscriptions a stage hands out.
pub(crate) trait DemandSink: Send + Sync + 'static {
    /// Demand arrived from downstream subscriber `id`.
    fn downstream_request(&self, id: u64, demand: Demand);

    /// Downstream subscriber `id` cancelled.
    fn downstream_cancel(&self, id: u64);
}

/// What a lane does with an item once its buffer holds `capacity` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Overflow {
    /// Drop the item for that subscriber and warn.
    Drop,
    /// Keep buffering; `capacity` is only a hint.
    Buffer,
}

#[derive(Debug)]
struct Lane<T> {
    demand: DemandCounter,
    buffer: VecDeque<T>,
    complete_pending: bool,
    closed: bool,
}

/// One attached subscriber with its demand counter and overflow buffer.
pub(crate) struct Downstream<T> {
    id: u64,
    subscriber: Arc<dyn Subscriber<T>>,
    capacity: Option<usize>,
    overflow: Overflow,
    lane: Mutex<Lane<T>>,
}

impl<T: Send + 'static> Downstream<T> {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lane.lock().closed
    }

    /// Number of items waiting for demand.
    #[cfg(test)]
    pub(crate) fn buffered(&self) -> usize {
        self.lane.lock().buffer.len()
    }

    /// Delivers `value` if the subscriber has demand, buffers it otherwise.
    fn offer(&self, value: T) {
        let deliver = {
            let mut lane = self.lane.lock();
            if lane.closed || lane.complete_pending {
                return;
            }
            if lane.buffer.is_empty() && lane.demand.consume_one() {
                Some(value)
            } else if self.capacity.is_some_and(|cap| lane.buffer.len() >= cap) {
                match self.overflow {
                    Overflow::Drop => {
                        warn!(
                            subscriber = self.subscriber.name(),
                            capacity = self.capacity,
                            "dropped item: buffer full"
                        );
                    }
                    Overflow::Buffer => {
                        if self.capacity == Some(lane.buffer.len()) {
                            debug!(
                                subscriber = self.subscriber.name(),
                                capacity = self.capacity,
                                "buffer grew past capacity"
                            );
                        }
                        lane.buffer.push_back(value);
                    }
                }
                None
            } else {
                lane.buffer.push_back(value);
                None
            }
        };
        if let Some(v) = deliver {
            self.subscriber.on_next(v);
        }
    }

    /// Adds demand and drains the buffer against it.
    ///
    /// Returns the part of `demand` the buffer could not satisfy, which the
    /// stage should forward upstream.
    pub(crate) fn request(&self, demand: Demand) -> Option<Demand> {
        {
            let mut lane = self.lane.lock();
            if lane.closed {
                return None;
            }
            lane.demand.add(demand);
        }

        let mut drained: u64 = 0;
        loop {
            let next = {
                let mut lane = self.lane.lock();
                if lane.closed {
                    return None;
                }
                if lane.buffer.is_empty() {
                    if lane.complete_pending {
                        lane.closed = true;
                        drop(lane);
                        self.subscriber.on_complete();
                        return None;
                    }
                    break;
                }
                if !lane.demand.consume_one() {
                    break;
                }
                lane.buffer.pop_front()
            };
            if let Some(v) = next {
                drained += 1;
                self.subscriber.on_next(v);
            }
        }

        match demand.amount() {
            None => Some(Demand::Unbounded),
            Some(n) if n > drained => Some(Demand::Request(n - drained)),
            Some(_) => None,
        }
    }

    /// Completes now if nothing is buffered, otherwise after the buffer drains.
    fn complete(&self) {
        {
            let mut lane = self.lane.lock();
            if lane.closed || lane.complete_pending {
                return;
            }
            if !lane.buffer.is_empty() {
                lane.complete_pending = true;
                return;
            }
            lane.closed = true;
        }
        self.subscriber.on_complete();
    }

    /// Fails the subscriber at once, discarding buffered items.
    pub(crate) fn fail(&self, error: StreamError) {
        {
            let mut lane = self.lane.lock();
            if lane.closed {
                return;
            }
            lane.closed = true;
            lane.buffer.clear();
        }
        self.subscriber.on_error(error);
    }

    /// Detaches silently (downstream cancelled).
    pub(crate) fn close(&self) {
        let mut lane = self.lane.lock();
        lane.closed = true;
        lane.buffer.clear();
    }
}

/// Items emitted before the first subscriber attached.
#[derive(Debug)]
struct Held<T> {
    items: VecDeque<T>,
    complete: bool,
}

impl<T> Default for Held<T> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
            complete: false,
        }
    }
}

struct Inner<T> {
    lanes: Vec<Arc<Downstream<T>>>,
    held: Option<Held<T>>,
}

/// Composite fan-out with per-subscriber demand and buffers.
pub(crate) struct DownstreamSet<T> {
    inner: Mutex<Inner<T>>,
    capacity: AtomicUsize,
    overflow: Overflow,
    next_id: AtomicU64,
}

impl<T: Clone + Send + 'static> DownstreamSet<T> {
    /// Creates a set whose lanes buffer up to `capacity` items (`0` = unbounded)
    /// and drop beyond that.
    ///
    /// Items emitted while nobody is attached are discarded.
    pub(crate) fn new(capacity: usize) -> Self {
        Self::with_overflow(capacity, Overflow::Drop)
    }

    /// Like [`new`](Self::new), but lanes never drop: `capacity` is a hint.
    pub(crate) fn lossless(capacity: usize) -> Self {
        Self::with_overflow(capacity, Overflow::Buffer)
    }

    /// Like [`lossless`](Self::lossless), and items (and completion) emitted
    /// before the first subscriber attaches are held for that subscriber.
    pub(crate) fn holding(capacity: usize) -> Self {
        let set = Self::lossless(capacity);
        set.inner.lock().held = Some(Held::default());
        set
    }

    fn with_overflow(capacity: usize, overflow: Overflow) -> Self {
        Self {
            inner: Mutex::new(Inner {
                lanes: Vec::new(),
                held: None,
            }),
            capacity: AtomicUsize::new(capacity),
            overflow,
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    pub(crate) fn set_capacity(&self, capacity: usize) {
        self.capacity.store(capacity, Ordering::Relaxed);
    }

    fn limit(&self) -> Option<usize> {
        match self.capacity() {
            0 => None,
            n => Some(n),
        }
    }

    /// Returns `true` while held items wait for a first subscriber.
    pub(crate) fn has_held(&self) -> bool {
        self.inner
            .lock()
            .held
            .as_ref()
            .is_some_and(|h| !h.items.is_empty())
    }

    /// Attaches a subscriber; the first one inherits any held items.
    pub(crate) fn add(&self, subscriber: Arc<dyn Subscriber<T>>) -> Arc<Downstream<T>> {
        let mut inner = self.inner.lock();
        let held = inner.held.take().unwrap_or_default();
        let lane = Arc::new(Downstream {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            subscriber,
            capacity: self.limit(),
            overflow: self.overflow,
            lane: Mutex::new(Lane {
                demand: DemandCounter::new(),
                complete_pending: held.complete && !held.items.is_empty(),
                buffer: held.items,
                closed: false,
            }),
        });
        inner.lanes.push(Arc::clone(&lane));
        lane
    }

    pub(crate) fn get(&self, id: u64) -> Option<Arc<Downstream<T>>> {
        self.inner.lock().lanes.iter().find(|l| l.id == id).cloned()
    }

    pub(crate) fn remove(&self, id: u64) -> Option<Arc<Downstream<T>>> {
        let mut inner = self.inner.lock();
        let pos = inner.lanes.iter().position(|l| l.id == id)?;
        Some(inner.lanes.remove(pos))
    }

    /// Fan-out one item to all subscribers, in subscription order.
    pub(crate) fn emit_next(&self, value: T) {
        let lanes = {
            let mut inner = self.inner.lock();
            if inner.lanes.is_empty() {
                if let Some(held) = inner.held.as_mut() {
                    held.items.push_back(value);
                }
                return;
            }
            inner.lanes.clone()
        };
        let Some((last, rest)) = lanes.split_last() else {
            return;
        };
        for lane in rest {
            lane.offer(value.clone());
        }
        last.offer(value);
    }

    /// Fails every subscriber and detaches them all.
    pub(crate) fn emit_error(&self, error: &StreamError) {
        let lanes = {
            let mut inner = self.inner.lock();
            inner.held = None;
            std::mem::take(&mut inner.lanes)
        };
        for lane in lanes {
            lane.fail(error.clone());
        }
    }

    /// Completes every subscriber; subscribers with buffered items stay attached
    /// until they drain.
    pub(crate) fn emit_complete(&self) {
        let lanes = {
            let mut inner = self.inner.lock();
            if let Some(held) = inner.held.as_mut() {
                held.complete = true;
            }
            inner.lanes.clone()
        };
        for lane in lanes {
            lane.complete();
        }
        self.inner.lock().lanes.retain(|l| !l.is_closed());
    }

    /// Detaches every subscriber without signalling them.
    pub(crate) fn clear(&self) {
        let lanes = {
            let mut inner = self.inner.lock();
            inner.held = None;
            std::mem::take(&mut inner.lanes)
        };
        for lane in lanes {
            lane.close();
        }
    }

    /// True if there are no subscribers.
    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.inner.lock().lanes.is_empty()
    }

    /// Number of subscribers.
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().lanes.len()
    }
}

/// Subscription handed to a downstream subscriber; routes signals back to the stage.
pub(crate) struct DownstreamSubscription {
    id: u64,
    sink: Weak<dyn DemandSink>,
}

impl DownstreamSubscription {
    pub(crate) fn new(id: u64, sink: Weak<dyn DemandSink>) -> Self {
        Self { id, sink }
    }
}

impl Subscription for DownstreamSubscription {
    fn request(&self, demand: Demand) {
        if let Some(sink) = self.sink.upgrade() {
            sink.downstream_request(self.id, demand);
        }
    }

    fn cancel(&self) {
        if let Some(sink) = self.sink.upgrade() {
            sink.downstream_cancel(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Recorder, Signal};

    #[test]
    fn test_items_wait_for_demand() {
        let set = DownstreamSet::<u32>::new(0);
        let rec = Recorder::<u32>::new();
        let lane = set.add(rec.clone());

        set.emit_next(1);
        set.emit_next(2);
        assert!(rec.values().is_empty());
        assert_eq!(lane.buffered(), 2);

        assert_eq!(lane.request(Demand::Request(1)), None);
        assert_eq!(rec.values(), vec![1]);

        assert_eq!(lane.request(Demand::Request(3)), Some(Demand::Request(2)));
        assert_eq!(rec.values(), vec![1, 2]);

        set.emit_next(3);
        assert_eq!(rec.values(), vec![1, 2, 3]);
    }

    #[test]
    fn test_overflow_drops_for_that_subscriber_only() {
        let set = DownstreamSet::<u32>::new(2);
        let slow = Recorder::<u32>::new();
        let fast = Recorder::<u32>::new();
        let slow_lane = set.add(slow.clone());
        let fast_lane = set.add(fast.clone());
        fast_lane.request(Demand::Unbounded);

        for i in 0..5 {
            set.emit_next(i);
        }

        assert_eq!(fast.values(), vec![0, 1, 2, 3, 4]);
        slow_lane.request(Demand::Unbounded);
        assert_eq!(slow.values(), vec![0, 1]);
    }

    #[test]
    fn test_lossless_set_buffers_past_capacity() {
        let set = DownstreamSet::<u32>::lossless(2);
        let rec = Recorder::<u32>::new();
        let lane = set.add(rec.clone());

        for i in 0..5 {
            set.emit_next(i);
        }
        assert_eq!(lane.buffered(), 5);

        lane.request(Demand::Unbounded);
        assert_eq!(rec.values(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_holding_set_keeps_everything_for_first_subscriber() {
        let set = DownstreamSet::<u32>::holding(4);
        for i in 0..100 {
            set.emit_next(i);
        }

        let rec = Recorder::<u32>::new();
        let lane = set.add(rec.clone());
        lane.request(Demand::Unbounded);
        assert_eq!(rec.values(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_complete_waits_for_buffer_to_drain() {
        let set = DownstreamSet::<u32>::new(0);
        let rec = Recorder::<u32>::new();
        let lane = set.add(rec.clone());

        set.emit_next(7);
        set.emit_complete();
        assert_eq!(set.len(), 1);
        assert!(rec.signals().is_empty());

        lane.request(Demand::Request(1));
        assert_eq!(rec.signals(), vec![Signal::Next(7), Signal::Complete]);
        assert!(lane.is_closed());
    }

    #[test]
    fn test_error_discards_buffer_and_detaches() {
        let set = DownstreamSet::<u32>::new(0);
        let rec = Recorder::<u32>::new();
        set.add(rec.clone());

        set.emit_next(1);
        set.emit_error(&StreamError::upstream("gone"));
        set.emit_complete();

        assert_eq!(
            rec.signals(),
            vec![Signal::Error(StreamError::upstream("gone"))]
        );
        assert!(set.is_empty());
    }

    #[test]
    fn test_without_subscribers_items_are_discarded() {
        let set = DownstreamSet::<u32>::new(0);
        set.emit_next(1);

        let rec = Recorder::<u32>::new();
        let lane = set.add(rec.clone());
        lane.request(Demand::Unbounded);
        assert!(rec.values().is_empty());
    }

    #[test]
    fn test_holding_set_hands_items_to_first_subscriber() {
        let set = DownstreamSet::<u32>::holding(0);
        set.emit_next(1);
        set.emit_next(2);
        set.emit_complete();
        assert!(set.has_held());

        let first = Recorder::<u32>::new();
        let lane = set.add(first.clone());
        assert!(!set.has_held());
        lane.request(Demand::Request(5));

        assert_eq!(
            first.signals(),
            vec![Signal::Next(1), Signal::Next(2), Signal::Complete]
        );
    }
}
