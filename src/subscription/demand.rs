//! # Demand signals and demand accounting.
//!
//! [`Demand`] is what flows upstream in `Subscription::request`. It replaces the
//! classic numeric conventions (`Long.MAX_VALUE` for "unbounded", `-1` for
//! "release one buffered unit") with explicit variants so that operators
//! transforming demand cannot misread each other's sentinels.
//!
//! [`DemandCounter`] accumulates demand with saturation into "unbounded".

/// Demand signal used for backpressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Demand {
    /// Request `n` more items.
    Request(u64),
    /// Request every item the publisher will ever produce.
    Unbounded,
    /// Release exactly one buffered unit, independent of any pending counter.
    ///
    /// Emitted by rate-limiting stages on each tick; a decorating subscription
    /// translates it into `Request(1)` before it reaches a real publisher.
    ReleaseOne,
}

impl Demand {
    /// Returns the number of items this demand asks for (`None` when unbounded).
    ///
    /// `ReleaseOne` counts as one item.
    #[must_use]
    pub const fn amount(&self) -> Option<u64> {
        match self {
            Demand::Request(n) => Some(*n),
            Demand::ReleaseOne => Some(1),
            Demand::Unbounded => None,
        }
    }

    /// Returns `true` for `Request(0)`, which the protocol forbids.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Demand::Request(0))
    }
}

impl From<u64> for Demand {
    /// `u64::MAX` maps to [`Demand::Unbounded`].
    fn from(n: u64) -> Self {
        if n == u64::MAX {
            Demand::Unbounded
        } else {
            Demand::Request(n)
        }
    }
}

/// Tracks outstanding demand.
///
/// `u64::MAX` is reserved internally for "unbounded": once reached, the counter
/// never decreases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemandCounter {
    current: u64,
}

impl DemandCounter {
    /// Creates a counter with zero demand.
    #[must_use]
    pub const fn new() -> Self {
        Self { current: 0 }
    }

    /// Adds demand; additions overflowing `u64` saturate into unbounded.
    pub fn add(&mut self, demand: Demand) {
        self.current = match demand.amount() {
            None => u64::MAX,
            Some(n) => self.current.saturating_add(n),
        };
    }

    /// Consumes a single unit when available.
    #[must_use]
    pub fn consume_one(&mut self) -> bool {
        match self.current {
            0 => false,
            u64::MAX => true,
            n => {
                self.current = n - 1;
                true
            }
        }
    }

    /// Takes the whole outstanding demand, leaving zero.
    ///
    /// Returns `None` when nothing is outstanding.
    pub fn take(&mut self) -> Option<Demand> {
        match std::mem::take(&mut self.current) {
            0 => None,
            n => Some(Demand::from(n)),
        }
    }

    /// Returns the outstanding demand as a signal (`Request(0)` when empty).
    #[must_use]
    pub fn current(&self) -> Demand {
        Demand::from(self.current)
    }

    /// Returns `true` if any demand is outstanding.
    #[must_use]
    pub const fn has_demand(&self) -> bool {
        self.current > 0
    }

    /// Returns `true` once the counter has saturated into unbounded demand.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.current == u64::MAX
    }
}
