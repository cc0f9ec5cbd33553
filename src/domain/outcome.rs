//! Run termination outcome types.
//!
//! Every completed run is classified exactly once into an [`Outcome`],
//! which then drives the restart policy.

use serde::{Deserialize, Serialize};

/// Exit-code convention shared with the worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitCodes {
    /// Worker is done, no further restarts
    pub clean: i32,
    /// Worker asks to be respawned immediately
    pub restart: i32,
}

impl Default for ExitCodes {
    fn default() -> Self {
        Self { clean: 0, restart: 42 }
    }
}

/// Classification of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Worker exited with the clean code - stop supervising
    CleanExit,
    /// Worker exited with the restart code - respawn without delay
    RestartRequested,
    /// Run was cut short by a source change - respawn without delay
    FileTriggered,
    /// Anything else, including death by signal or a failed spawn
    Crashed,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::CleanExit => "clean_exit",
            Outcome::RestartRequested => "restart_requested",
            Outcome::FileTriggered => "file_triggered",
            Outcome::Crashed => "crashed",
        };
        write!(f, "{}", s)
    }
}

/// Classify a finished run.
///
/// A file-triggered run is always `FileTriggered`, whatever code the kill
/// produced. A missing exit code counts as a crash.
pub fn classify(exit_code: Option<i32>, file_triggered: bool, codes: &ExitCodes) -> Outcome {
    if file_triggered {
        return Outcome::FileTriggered;
    }
    match exit_code {
        Some(code) if code == codes.clean => Outcome::CleanExit,
        Some(code) if code == codes.restart => Outcome::RestartRequested,
        _ => Outcome::Crashed,
    }
}
