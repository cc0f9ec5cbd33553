//! Run record - one spawn-to-exit cycle of the worker.

use std::process::ExitStatus;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// One spawn-to-exit cycle of the worker process.
#[derive(Debug, Clone)]
pub struct Run {
    /// 1-based sequence number within this supervisor session
    pub seq: u64,
    /// Wall-clock start, for logs
    pub started_at: DateTime<Utc>,
    /// Monotonic start, for the run duration
    pub started: Instant,
    /// Final exit code, `None` until the run has terminated
    pub exit_code: Option<i32>,
    /// Whether a source change cut this run short
    pub file_triggered: bool,
    /// Wall-clock runtime, set when the run ends
    pub duration: Duration,
}

impl Run {
    /// Start a new run now.
    pub fn start(seq: u64) -> Self {
        Self {
            seq,
            started_at: Utc::now(),
            started: Instant::now(),
            exit_code: None,
            file_triggered: false,
            duration: Duration::ZERO,
        }
    }

    /// Record the end of the run.
    pub fn finish(&mut self, exit_code: Option<i32>, file_triggered: bool) {
        self.exit_code = exit_code;
        self.file_triggered = file_triggered;
        self.duration = self.started.elapsed();
    }
}

/// Numeric exit code of a finished process.
///
/// On Unix a process killed by a signal has no code; it is reported as the
/// negated signal number (`-15` for SIGTERM, `-9` for SIGKILL).
pub fn exit_code_of(status: ExitStatus) -> Option<i32> {
    if let Some(code) = status.code() {
        return Some(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.signal().map(|sig| -sig)
    }
    #[cfg(not(unix))]
    {
        None
    }
}
