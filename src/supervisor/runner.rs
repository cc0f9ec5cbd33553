//! Supervisor implementation - the spawn / classify / restart loop.
//!
//! ```text
//! SPAWNING ──► RUNNING ──► CLASSIFYING ──┬─► RESTARTING  (restart code, file change)
//!    ▲                                   ├─► BACKING_OFF (crash) ──sleep──┐
//!    └───────────────────────────────────┴────────────────────────────────┘
//!                                        └─► STOPPED     (clean code, shutdown)
//! ```
//!
//! Within one run the worker's own exit, the change source and the shutdown
//! token race in a single `select!`. Losing branches are plain futures
//! dropped in place, so nothing from a finished run outlives its
//! classification.

use std::path::PathBuf;

use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;

use super::sleeper::Sleeper;
use crate::domain::{
    CrashTracker, Decision, ExitCodes, Outcome, RestartPolicy, Run, classify, exit_code_of,
};
use crate::process::{Termination, WorkerCommand, terminate};
use crate::watcher::ChangeSource;

/// How a single run ended, from the loop's point of view.
#[derive(Debug, Clone)]
pub enum RunEnd {
    /// Run ended on its own or by a file change; classify it
    Finished(Run),
    /// Shutdown was requested; the worker has been terminated
    Cancelled(Run),
}

/// Why the supervisory loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Worker exited with the clean code
    CleanExit,
    /// Shutdown token was cancelled
    Cancelled,
}

/// Counters for a supervisor session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub runs: u64,
    pub clean_exits: u64,
    pub restarts_requested: u64,
    pub file_triggered: u64,
    pub crashes: u64,
    pub stop_reason: Option<StopReason>,
}

impl Summary {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::CleanExit => self.clean_exits += 1,
            Outcome::RestartRequested => self.restarts_requested += 1,
            Outcome::FileTriggered => self.file_triggered += 1,
            Outcome::Crashed => self.crashes += 1,
        }
    }
}

enum Race {
    Exited(std::io::Result<std::process::ExitStatus>),
    Changed(PathBuf),
    Cancelled,
}

/// Owns one worker at a time and restarts it according to the policy.
pub struct Supervisor<S, Z>
where
    S: ChangeSource,
    Z: Sleeper,
{
    worker: WorkerCommand,
    changes: S,
    sleeper: Z,
    codes: ExitCodes,
    tracker: CrashTracker,
    summary: Summary,
}

impl<S, Z> Supervisor<S, Z>
where
    S: ChangeSource,
    Z: Sleeper,
{
    pub fn new(
        worker: WorkerCommand,
        changes: S,
        sleeper: Z,
        codes: ExitCodes,
        policy: RestartPolicy,
    ) -> Self {
        Self {
            worker,
            changes,
            sleeper,
            codes,
            tracker: CrashTracker::new(policy),
            summary: Summary::default(),
        }
    }

    /// Current consecutive fast-crash count
    pub fn streak(&self) -> u32 {
        self.tracker.streak()
    }

    /// Spawn the worker and wait for the run to end.
    ///
    /// A relevant change or a cancelled `shutdown` token terminates the
    /// worker before returning. A spawn failure yields a finished run with
    /// no exit code.
    pub async fn spawn_and_run(&mut self, shutdown: &CancellationToken) -> RunEnd {
        self.summary.runs += 1;
        let mut run = Run::start(self.summary.runs);

        let mut child = match self.worker.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!("Run {}: {}", run.seq, e);
                run.finish(None, false);
                return RunEnd::Finished(run);
            }
        };
        info!(
            "Run {} started at {}: {} (pid {})",
            run.seq,
            run.started_at.format("%H:%M:%S"),
            self.worker.display(),
            child.id().map(|p| p.to_string()).unwrap_or_else(|| "?".to_string())
        );

        let race = tokio::select! {
            biased;
            _ = shutdown.cancelled() => Race::Cancelled,
            status = child.wait() => Race::Exited(status),
            path = self.changes.wait_for_change() => Race::Changed(path),
        };

        let grace = self.tracker.policy().grace();
        match race {
            Race::Exited(Ok(status)) => {
                run.finish(exit_code_of(status), false);
                RunEnd::Finished(run)
            }
            Race::Exited(Err(e)) => {
                warn!("Run {}: failed waiting for worker: {}", run.seq, e);
                let termination = terminate(&mut child, grace).await;
                run.finish(termination.exit_code(), false);
                RunEnd::Finished(run)
            }
            Race::Changed(path) => {
                info!("Run {}: {} changed, reloading worker", run.seq, path.display());
                let termination = terminate(&mut child, grace).await;
                log_termination(run.seq, "reload", &termination);
                run.finish(termination.exit_code(), true);
                RunEnd::Finished(run)
            }
            Race::Cancelled => {
                info!("Run {}: shutdown requested, stopping worker", run.seq);
                let termination = terminate(&mut child, grace).await;
                log_termination(run.seq, "shutdown", &termination);
                run.finish(termination.exit_code(), false);
                RunEnd::Cancelled(run)
            }
        }
    }

    /// Classify a finished run.
    pub fn classify(&self, run: &Run) -> Outcome {
        classify(run.exit_code, run.file_triggered, &self.codes)
    }

    /// Update the crash streak and decide what happens next.
    pub fn apply_policy(&mut self, outcome: Outcome, run: &Run) -> Decision {
        self.summary.record(outcome);
        let runtime = run.duration.as_secs_f64();
        match outcome {
            Outcome::Crashed => warn!(
                "Run {} crashed with exit code {} after {:.1}s",
                run.seq,
                run.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()),
                runtime
            ),
            _ => info!("Run {} ended after {:.1}s: {}", run.seq, runtime, outcome),
        }
        self.tracker.apply_policy(outcome, run.duration)
    }

    /// Run the supervisory loop until a clean exit or until `shutdown` is
    /// cancelled. Worker crashes never end the loop.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Summary {
        let reason = loop {
            if shutdown.is_cancelled() {
                break StopReason::Cancelled;
            }

            let run = match self.spawn_and_run(&shutdown).await {
                RunEnd::Finished(run) => run,
                RunEnd::Cancelled(_) => break StopReason::Cancelled,
            };

            let outcome = self.classify(&run);
            match self.apply_policy(outcome, &run) {
                Decision::Stop => break StopReason::CleanExit,
                Decision::Respawn => {}
                Decision::Backoff(delay) => {
                    info!(
                        "Restarting in {}ms (crash streak {})",
                        delay.as_millis(),
                        self.tracker.streak()
                    );
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break StopReason::Cancelled,
                        _ = self.sleeper.sleep(delay) => {}
                    }
                }
            }
        };

        self.summary.stop_reason = Some(reason);
        info!(
            "Supervisor stopped ({:?}) after {} runs: {} restarts, {} reloads, {} crashes",
            reason,
            self.summary.runs,
            self.summary.restarts_requested,
            self.summary.file_triggered,
            self.summary.crashes
        );
        self.summary.clone()
    }
}

fn log_termination(seq: u64, reason: &str, termination: &Termination) {
    if termination.was_forced() {
        warn!("Run {}: worker ignored SIGTERM during {} and was killed", seq, reason);
    } else {
        debug!("Run {}: terminated for {}: {:?}", seq, reason, termination);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::supervisor::TokioSleeper;
    use crate::watcher::Disabled;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Fires once, after a delay, on the first subscription only.
    struct ChangeAfter {
        delay: Duration,
        fired: Mutex<bool>,
    }

    impl ChangeAfter {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                fired: Mutex::new(false),
            }
        }
    }

    #[async_trait]
    impl ChangeSource for ChangeAfter {
        async fn wait_for_change(&self) -> PathBuf {
            let first = {
                let mut fired = self.fired.lock().unwrap();
                !std::mem::replace(&mut *fired, true)
            };
            if !first {
                return std::future::pending().await;
            }
            tokio::time::sleep(self.delay).await;
            PathBuf::from("worker/main.py")
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        calls: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.calls.lock().unwrap().push(duration);
        }
    }

    fn sh(script: &str) -> WorkerCommand {
        WorkerCommand::new("sh").arg("-c").arg(script)
    }

    fn policy() -> RestartPolicy {
        RestartPolicy {
            grace_ms: 2_000,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_spawn_and_run_reports_exit_code() {
        let mut sup = Supervisor::new(sh("exit 5"), Disabled, TokioSleeper, ExitCodes::default(), policy());
        let token = CancellationToken::new();

        match sup.spawn_and_run(&token).await {
            RunEnd::Finished(run) => {
                assert_eq!(run.exit_code, Some(5));
                assert!(!run.file_triggered);
                assert_eq!(sup.classify(&run), Outcome::Crashed);
            }
            RunEnd::Cancelled(_) => panic!("Expected finished run"),
        }
    }

    #[tokio::test]
    async fn test_file_change_terminates_worker() {
        let source = ChangeAfter::new(Duration::from_millis(200));
        let mut sup = Supervisor::new(sh("exec sleep 30"), source, TokioSleeper, ExitCodes::default(), policy());
        let token = CancellationToken::new();

        let RunEnd::Finished(run) = sup.spawn_and_run(&token).await else {
            panic!("Expected finished run");
        };
        assert!(run.file_triggered);
        assert_eq!(run.exit_code, Some(-15));
        assert!(run.duration < Duration::from_secs(5));
        assert_eq!(sup.classify(&run), Outcome::FileTriggered);
    }

    #[tokio::test]
    async fn test_reload_kills_worker_that_ignores_sigterm() {
        let source = ChangeAfter::new(Duration::from_millis(200));
        let worker = sh("trap '' TERM; while true; do sleep 0.05; done");
        let policy = RestartPolicy {
            grace_ms: 300,
            ..Default::default()
        };
        let mut sup = Supervisor::new(worker, source, TokioSleeper, ExitCodes::default(), policy);
        let token = CancellationToken::new();

        let RunEnd::Finished(run) = sup.spawn_and_run(&token).await else {
            panic!("Expected finished run");
        };
        assert!(run.file_triggered);
        assert_eq!(run.exit_code, Some(-9));
        assert_eq!(sup.classify(&run), Outcome::FileTriggered);
    }

    #[tokio::test]
    async fn test_cancellation_terminates_worker() {
        let mut sup = Supervisor::new(sh("exec sleep 30"), Disabled, TokioSleeper, ExitCodes::default(), policy());
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            canceller.cancel();
        });

        match sup.spawn_and_run(&token).await {
            RunEnd::Cancelled(run) => assert_eq!(run.exit_code, Some(-15)),
            RunEnd::Finished(_) => panic!("Expected cancelled run"),
        }
    }

    #[tokio::test]
    async fn test_spawn_failure_is_a_crash() {
        let worker = WorkerCommand::new("/definitely/not/a/real/program");
        let mut sup = Supervisor::new(worker, Disabled, TokioSleeper, ExitCodes::default(), policy());
        let token = CancellationToken::new();

        let RunEnd::Finished(run) = sup.spawn_and_run(&token).await else {
            panic!("Expected finished run");
        };
        assert_eq!(run.exit_code, None);
        assert_eq!(sup.classify(&run), Outcome::Crashed);
    }

    #[tokio::test]
    async fn test_run_stops_on_clean_exit() {
        let sleeper = RecordingSleeper::default();
        let mut sup = Supervisor::new(sh("exit 0"), Disabled, sleeper, ExitCodes::default(), policy());

        let summary = sup.run(CancellationToken::new()).await;
        assert_eq!(summary.runs, 1);
        assert_eq!(summary.clean_exits, 1);
        assert_eq!(summary.stop_reason, Some(StopReason::CleanExit));
        assert!(sup.sleeper.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_honours_custom_clean_code() {
        let codes = ExitCodes { clean: 9, restart: 42 };
        let mut sup = Supervisor::new(sh("exit 9"), Disabled, RecordingSleeper::default(), codes, policy());

        let summary = sup.run(CancellationToken::new()).await;
        assert_eq!(summary.runs, 1);
        assert_eq!(summary.stop_reason, Some(StopReason::CleanExit));
    }

    #[tokio::test]
    async fn test_already_cancelled_spawns_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let mut sup = Supervisor::new(
            sh("exit 1"),
            Disabled,
            RecordingSleeper::default(),
            ExitCodes::default(),
            policy(),
        );

        let summary = sup.run(token).await;
        assert_eq!(summary.runs, 0);
        assert_eq!(summary.stop_reason, Some(StopReason::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_during_backoff() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        // Real sleeper: the first crash backs off for 2s.
        let mut sup = Supervisor::new(sh("exit 1"), Disabled, TokioSleeper, ExitCodes::default(), policy());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            canceller.cancel();
        });

        let start = std::time::Instant::now();
        let summary = sup.run(token).await;
        assert_eq!(summary.runs, 1);
        assert_eq!(summary.crashes, 1);
        assert_eq!(summary.stop_reason, Some(StopReason::Cancelled));
        assert!(start.elapsed() < Duration::from_millis(1_500));
    }

    #[test]
    fn test_summary_record() {
        let mut summary = Summary::default();
        summary.record(Outcome::Crashed);
        summary.record(Outcome::Crashed);
        summary.record(Outcome::FileTriggered);
        summary.record(Outcome::RestartRequested);
        summary.record(Outcome::CleanExit);
        assert_eq!(summary.crashes, 2);
        assert_eq!(summary.file_triggered, 1);
        assert_eq!(summary.restarts_requested, 1);
        assert_eq!(summary.clean_exits, 1);
    }
}
