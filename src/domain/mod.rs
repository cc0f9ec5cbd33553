//! Domain types for restartd
//!
//! This module contains the process-lifecycle concepts:
//! - Run: one spawn-to-exit cycle of the worker
//! - Outcome: classification of a finished run
//! - CrashTracker: crash streak and restart policy
//!
//! Nothing here touches processes or the clock beyond `Instant::now()`,
//! so all policy decisions can be tested without spawning anything.

pub mod outcome;
pub mod run;
pub mod streak;

pub use outcome::{ExitCodes, Outcome, classify};
pub use run::{Run, exit_code_of};
pub use streak::{CrashTracker, Decision, RestartPolicy};
