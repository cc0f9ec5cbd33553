//! Graceful-then-forceful termination of the worker.
//!
//! ```text
//! ALIVE ──SIGTERM──► SIGNALED ──exit within grace──► EXITED
//!                        │
//!                        └──grace elapsed──SIGKILL──► FORCE_KILLED
//! ```
//!
//! This is the only place the supervisor stops a worker, for both
//! file-triggered reloads and shutdown.

use std::time::Duration;

use log::{debug, warn};
use tokio::process::Child;

use crate::domain::exit_code_of;
use crate::error::{Result, SupervisorError};

/// How a termination request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Process had already exited; no signal was sent
    AlreadyExited(Option<i32>),
    /// Process exited within the grace period after SIGTERM
    Exited(Option<i32>),
    /// Grace period elapsed and the process was SIGKILLed
    ForceKilled(Option<i32>),
}

impl Termination {
    /// Final exit code of the process.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Termination::AlreadyExited(code)
            | Termination::Exited(code)
            | Termination::ForceKilled(code) => *code,
        }
    }

    pub fn was_forced(&self) -> bool {
        matches!(self, Termination::ForceKilled(_))
    }
}

/// Stop `child`, escalating to SIGKILL once `grace` has elapsed.
///
/// Returns only after the process has been reaped. Safe to call on a
/// process that has already exited.
pub async fn terminate(child: &mut Child, grace: Duration) -> Termination {
    match child.try_wait() {
        Ok(Some(status)) => return Termination::AlreadyExited(exit_code_of(status)),
        Ok(None) => {}
        Err(e) => warn!("Failed to poll worker status: {}", e),
    }

    if let Err(e) = send_graceful(child) {
        warn!("{}", e);
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => return Termination::Exited(exit_code_of(status)),
        Ok(Err(e)) => warn!("Failed waiting for worker after SIGTERM: {}", e),
        Err(_) => warn!(
            "Worker did not exit within {}ms of SIGTERM, sending SIGKILL",
            grace.as_millis()
        ),
    }

    if let Err(e) = child.start_kill() {
        debug!("SIGKILL not delivered: {}", e);
    }
    match child.wait().await {
        Ok(status) => Termination::ForceKilled(exit_code_of(status)),
        Err(e) => {
            warn!("Failed waiting for worker after SIGKILL: {}", e);
            Termination::ForceKilled(None)
        }
    }
}

#[cfg(unix)]
fn send_graceful(child: &mut Child) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    // No pid means tokio already reaped it.
    let Some(pid) = child.id() else {
        return Ok(());
    };

    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(SupervisorError::Signal(format!("SIGTERM to {}: {}", pid, e))),
    }
}

#[cfg(not(unix))]
fn send_graceful(child: &mut Child) -> Result<()> {
    child
        .start_kill()
        .map_err(|e| SupervisorError::Signal(format!("kill: {}", e)))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::process::Command;

    fn sh(script: &str) -> Child {
        Command::new("sh")
            .arg("-c")
            .arg(script)
            .kill_on_drop(true)
            .spawn()
            .unwrap()
    }

    #[tokio::test]
    async fn test_already_exited_is_noop() {
        let mut child = sh("exit 3");
        child.wait().await.unwrap();

        let first = terminate(&mut child, Duration::from_secs(1)).await;
        assert_eq!(first, Termination::AlreadyExited(Some(3)));

        let second = terminate(&mut child, Duration::from_secs(1)).await;
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_sigterm_within_grace() {
        let mut child = Command::new("sleep").arg("30").kill_on_drop(true).spawn().unwrap();

        let result = terminate(&mut child, Duration::from_secs(5)).await;
        assert_eq!(result, Termination::Exited(Some(-15)));
        assert!(!result.was_forced());
    }

    #[tokio::test]
    async fn test_trapped_sigterm_exit_code() {
        let mut child = sh("trap 'exit 7' TERM; while true; do sleep 0.05; done");
        tokio::time::sleep(Duration::from_millis(200)).await;

        let result = terminate(&mut child, Duration::from_secs(5)).await;
        assert_eq!(result.exit_code(), Some(7));
    }

    #[tokio::test]
    async fn test_escalates_after_grace() {
        let mut child = sh("trap '' TERM; while true; do sleep 0.05; done");
        // Let the shell install its trap before signalling.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let grace = Duration::from_millis(300);
        let start = Instant::now();
        let result = terminate(&mut child, grace).await;

        assert_eq!(result, Termination::ForceKilled(Some(-9)));
        assert!(start.elapsed() >= grace);
    }

    #[tokio::test]
    async fn test_terminate_after_force_kill_is_idempotent() {
        let mut child = sh("trap '' TERM; while true; do sleep 0.05; done");
        tokio::time::sleep(Duration::from_millis(200)).await;

        let first = terminate(&mut child, Duration::from_millis(100)).await;
        let second = terminate(&mut child, Duration::from_millis(100)).await;
        assert_eq!(second, Termination::AlreadyExited(first.exit_code()));
    }

    #[test]
    fn test_termination_exit_code() {
        assert_eq!(Termination::AlreadyExited(Some(0)).exit_code(), Some(0));
        assert_eq!(Termination::Exited(Some(-15)).exit_code(), Some(-15));
        assert_eq!(Termination::ForceKilled(None).exit_code(), None);
        assert!(Termination::ForceKilled(Some(-9)).was_forced());
        assert!(!Termination::Exited(Some(0)).was_forced());
    }
}
