//! Supervisor module - owns the worker lifecycle.
//!
//! This module provides:
//! - Supervisor, the spawn / classify / restart loop
//! - RunEnd, StopReason and Summary describing how runs and sessions end
//! - Sleeper, the seam through which backoff delays are awaited

mod runner;
mod sleeper;

pub use runner::{RunEnd, StopReason, Summary, Supervisor};
pub use sleeper::{Sleeper, TokioSleeper};
