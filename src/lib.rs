//! restartd - a supervisor for a single long-running worker process
//!
//! The worker is restarted on three triggers: a reserved "restart me" exit
//! code, a crash, and a change to its source files. Clean restarts are
//! immediate; rapid repeated crashes back off exponentially. Every stop goes
//! through SIGTERM, a grace period, then SIGKILL.

pub mod config;
pub mod domain;
pub mod error;
pub mod process;
pub mod signals;
pub mod supervisor;
pub mod watcher;

pub use error::{Result, SupervisorError};
