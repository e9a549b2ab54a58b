//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings shared by dispatchers and stream stages.
//!
//! Config is used in two ways:
//! 1. **Environment creation**: `Environment::new(config)` shares it with every stage
//! 2. **Stage defaults**: an [`Action`](crate::Action) picks its buffer capacity from it
//!
//! ## Sentinel values
//! - `capacity = 0` → unbounded per-subscriber buffers
//! - `backlog = 0` → clamped to 1 (an event loop always needs one slot)

use std::time::Duration;

/// Global configuration for dispatchers and stream stages.
///
/// Defines:
/// - **Fan-out buffering**: per-subscriber overflow buffer size
/// - **Dispatch backlog**: event-loop queue size
/// - **Shutdown behavior**: how long to wait for accepted work to drain
///
/// ## Field semantics
/// - `capacity`: Per-downstream overflow buffer size (`0` = unbounded)
/// - `backlog`: Event-loop dispatcher queue size (min 1; clamped)
/// - `grace`: Maximum wait for an awaited shutdown (`0s` = do not wait)
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of items a stage buffers for one downstream subscriber that has no demand.
    ///
    /// - `0` = unbounded (buffer grows as needed)
    /// - `n > 0` = at most `n` items buffered; newer items are dropped for that subscriber
    ///
    /// Grouped streams inherit the capacity of their parent.
    pub capacity: usize,

    /// Capacity of an event-loop dispatcher's work queue.
    ///
    /// When the queue is full, dispatch fails with `DispatchError::Saturated`.
    /// Minimum value is 1 (enforced by the dispatcher).
    pub backlog: usize,

    /// Maximum time an environment waits for dispatchers to drain on shutdown.
    pub grace: Duration,
}

impl Config {
    /// Default per-subscriber buffer size.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Returns the per-subscriber buffer limit as an `Option`.
    ///
    /// - `None` → unbounded
    /// - `Some(n)` → at most `n` buffered items
    #[inline]
    pub fn capacity_limit(&self) -> Option<usize> {
        if self.capacity == 0 {
            None
        } else {
            Some(self.capacity)
        }
    }

    /// Returns a backlog clamped to a minimum of 1.
    #[inline]
    pub fn backlog_clamped(&self) -> usize {
        self.backlog.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `capacity = 1024`
    /// - `backlog = 2048`
    /// - `grace = 30s`
    fn default() -> Self {
        Self {
            capacity: Self::DEFAULT_CAPACITY,
            backlog: 2048,
            grace: Duration::from_secs(30),
        }
    }
}
