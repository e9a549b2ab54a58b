//! Timers driving periodic demand release.
//!
//! ## Contents
//! - [`Timer`], [`Registration`], [`TimerTask`] the SPI
//! - [`TokioTimer`] implementation on tokio time

mod timer;
mod tokio_timer;

pub use timer::{Registration, Timer, TimerTask};
pub use tokio_timer::TokioTimer;
