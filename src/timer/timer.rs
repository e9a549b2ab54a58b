//! # Timer SPI.
//!
//! A [`Timer`] runs a task periodically; the returned [`Registration`] controls it.
//!
//! ```text
//! schedule(task, period, delay)
//!   t0 ──delay──► task(now) ──period──► task(now) ──period──► ...
//!                                 pause() ┆ (ticks skipped)  ┆ resume()
//!                                                          cancel() ─► stop
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::error::DispatchError;

/// Periodic task; receives the tick's wall-clock time in milliseconds since the epoch.
pub type TimerTask = Arc<dyn Fn(u64) + Send + Sync>;

/// Control handle for a scheduled task.
pub trait Registration: Send + Sync + 'static {
    /// Stops the task for good. Idempotent.
    fn cancel(&self);

    /// Skips ticks until [`resume`](Self::resume).
    fn pause(&self);

    /// Resumes ticking after [`pause`](Self::pause).
    fn resume(&self);

    /// Returns `true` once cancelled.
    fn is_cancelled(&self) -> bool;

    /// Returns `true` while paused.
    fn is_paused(&self) -> bool;
}

/// Schedules periodic tasks.
pub trait Timer: Send + Sync + 'static {
    /// Runs `task` every `period`, the first time after `delay`.
    ///
    /// The task runs until its registration is cancelled.
    fn schedule(
        &self,
        task: TimerTask,
        period: Duration,
        delay: Duration,
    ) -> Result<Arc<dyn Registration>, DispatchError>;
}
