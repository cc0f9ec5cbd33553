//! Crash streak tracking and restart policy.
//!
//! Only fast crashes grow the streak. Clean exits, restart requests and
//! file-triggered reloads reset it and respawn without delay.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::outcome::Outcome;

/// Timing constants for the restart policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartPolicy {
    /// A crash faster than this counts towards the streak
    pub fast_crash_threshold_ms: u64,
    /// One backoff time unit
    pub backoff_unit_ms: u64,
    /// Upper bound for a single backoff sleep
    pub max_backoff_ms: u64,
    /// How long a SIGTERM'd worker gets before SIGKILL
    pub grace_ms: u64,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            fast_crash_threshold_ms: 10_000,
            backoff_unit_ms: 1_000,
            max_backoff_ms: 30_000,
            grace_ms: 10_000,
        }
    }
}

impl RestartPolicy {
    pub fn fast_crash_threshold(&self) -> Duration {
        Duration::from_millis(self.fast_crash_threshold_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    /// Backoff for a given streak: `unit * 2^streak`, capped at `max_backoff`.
    pub fn backoff_for(&self, streak: u32) -> Duration {
        let factor = 1u32.checked_shl(streak).unwrap_or(u32::MAX);
        Duration::from_millis(self.backoff_unit_ms)
            .saturating_mul(factor)
            .min(self.max_backoff())
    }
}

/// What the supervisor does after a classified run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Stop supervising
    Stop,
    /// Spawn the next run immediately
    Respawn,
    /// Sleep, then spawn the next run
    Backoff(Duration),
}

/// Owns the crash streak and turns outcomes into decisions.
#[derive(Debug, Clone, Default)]
pub struct CrashTracker {
    policy: RestartPolicy,
    streak: u32,
}

impl CrashTracker {
    pub fn new(policy: RestartPolicy) -> Self {
        Self { policy, streak: 0 }
    }

    /// Current consecutive fast-crash count.
    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn policy(&self) -> &RestartPolicy {
        &self.policy
    }

    /// Apply the restart policy to a classified run.
    ///
    /// A crash increments the streak before the backoff is computed, so the
    /// first fast crash already sleeps two units. A slow crash resets the
    /// streak and sleeps one unit.
    pub fn apply_policy(&mut self, outcome: Outcome, run_duration: Duration) -> Decision {
        match outcome {
            Outcome::CleanExit => {
                self.streak = 0;
                Decision::Stop
            }
            Outcome::FileTriggered | Outcome::RestartRequested => {
                self.streak = 0;
                Decision::Respawn
            }
            Outcome::Crashed => {
                if run_duration < self.policy.fast_crash_threshold() {
                    self.streak = self.streak.saturating_add(1);
                } else {
                    self.streak = 0;
                }
                Decision::Backoff(self.policy.backoff_for(self.streak))
            }
        }
    }
}
