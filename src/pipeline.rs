//! The commit pipeline: one status → stage → commit → push cycle at a time.
//!
//! Outcomes are values, not errors. A failed step ends the cycle and is logged
//! here; callers decide what, if anything, to do with the outcome.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;

use crate::error::GitError;
use crate::git::VersionControl;
use crate::message::MessageStyle;

/// Push settings for the final pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTarget {
    pub enabled: bool,
    pub remote: String,
    pub branch: String,
}

/// Result of a successful commit step. The commit object itself belongs to git.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub message: String,
    /// Paths whose changes triggered this cycle.
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Status,
    Stage,
    Commit,
    Push,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Status => "status",
            Step::Stage => "stage",
            Step::Commit => "commit",
            Step::Push => "push",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum PushOutcome {
    Pushed,
    Disabled,
    /// The commit exists locally but did not reach the remote. Not rolled back.
    Failed(GitError),
}

/// Terminal result of one pipeline cycle. Every variant returns the cycle to idle.
#[derive(Debug)]
pub enum CycleOutcome {
    Committed {
        record: CommitRecord,
        push: PushOutcome,
    },
    /// Status reported a clean tree; nothing was staged, committed or pushed.
    NoChanges,
    Failed {
        step: Step,
        error: GitError,
    },
    /// Another cycle held the reservation; this call did nothing.
    Busy,
}

impl CycleOutcome {
    /// True when the cycle ran to completion without any step failing.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            CycleOutcome::Committed {
                push: PushOutcome::Pushed | PushOutcome::Disabled,
                ..
            } | CycleOutcome::NoChanges
        )
    }
}

/// Single-flight executor of status → stage → commit → push.
///
/// Steps run strictly in order and stop at the first failure. Nothing is rolled
/// back and nothing is retried: a failed cycle is over, and the next debounced
/// trigger is the only way forward.
pub struct CommitPipeline {
    vcs: Arc<dyn VersionControl>,
    style: MessageStyle,
    push: PushTarget,
    running: AtomicBool,
}

/// Releases the single-flight reservation on every exit path.
struct Reservation<'a>(&'a AtomicBool);

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl CommitPipeline {
    pub fn new(vcs: Arc<dyn VersionControl>, style: MessageStyle, push: PushTarget) -> Self {
        Self {
            vcs,
            style,
            push,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn reserve(&self) -> Option<Reservation<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Reservation(&self.running))
    }

    /// Execute one cycle for the given changeset. Returns `Busy` immediately if a
    /// cycle is already running.
    pub async fn run(&self, paths: Vec<PathBuf>) -> CycleOutcome {
        let Some(_reservation) = self.reserve() else {
            tracing::debug!("commit cycle already running; trigger dropped");
            return CycleOutcome::Busy;
        };

        tracing::info!(paths = paths.len(), "starting auto-commit cycle");
        let outcome = self.execute(paths).await;
        log_outcome(&outcome);
        outcome
    }

    async fn execute(&self, paths: Vec<PathBuf>) -> CycleOutcome {
        // Status: a clean tree ends the cycle before anything is staged.
        let status = match self.vcs.status().await {
            Ok(lines) => lines,
            Err(error) => return CycleOutcome::Failed { step: Step::Status, error },
        };
        if status.is_empty() {
            return CycleOutcome::NoChanges;
        }
        tracing::info!(changed = status.len(), "found changed files");

        // Stage: everything in the working tree, not only the debounced paths.
        if let Err(error) = self.vcs.stage_all().await {
            return CycleOutcome::Failed { step: Step::Stage, error };
        }
        tracing::info!(outcome = "success", "files staged");

        // Commit
        let message = self.style.render(Utc::now());
        if let Err(error) = self.vcs.commit(&message).await {
            return CycleOutcome::Failed { step: Step::Commit, error };
        }
        tracing::info!(outcome = "success", message = %message, "changes committed");

        let record = CommitRecord { message, paths };
        if !self.push.enabled {
            return CycleOutcome::Committed { record, push: PushOutcome::Disabled };
        }

        // Push: a failure leaves the local commit in place.
        let push = match self.vcs.push(&self.push.remote, &self.push.branch).await {
            Ok(()) => PushOutcome::Pushed,
            Err(error) => PushOutcome::Failed(error),
        };
        CycleOutcome::Committed { record, push }
    }
}

fn log_outcome(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Committed { push: PushOutcome::Pushed, .. } => {
            tracing::info!(outcome = "success", "changes pushed");
        }
        CycleOutcome::Committed { push: PushOutcome::Disabled, .. } => {
            tracing::debug!("push disabled; leaving commit local");
        }
        CycleOutcome::Committed { push: PushOutcome::Failed(error), .. } => {
            tracing::error!(step = %Step::Push, error = %error, "push failed; commit kept locally");
        }
        CycleOutcome::NoChanges => {
            tracing::warn!("no changes to commit");
        }
        CycleOutcome::Failed { step, error } => {
            tracing::error!(step = %step, error = %error, "commit cycle aborted");
        }
        CycleOutcome::Busy => {}
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::git::fake::{Call, FakeGit, Step as FakeStep};

    fn style() -> MessageStyle {
        MessageStyle {
            prefix: "Auto-commit".to_string(),
            use_timestamp: true,
        }
    }

    fn push(enabled: bool) -> PushTarget {
        PushTarget {
            enabled,
            remote: "origin".to_string(),
            branch: "main".to_string(),
        }
    }

    fn pipeline(git: &Arc<FakeGit>, push_enabled: bool) -> CommitPipeline {
        CommitPipeline::new(git.clone(), style(), push(push_enabled))
    }

    #[tokio::test]
    async fn test_full_cycle_runs_steps_in_order() {
        let git = Arc::new(FakeGit::dirty());
        let outcome = pipeline(&git, true).run(vec![PathBuf::from("a/x.txt")]).await;

        assert!(outcome.is_success(), "got {outcome:?}");
        let calls = git.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0], Call::Status);
        assert_eq!(calls[1], Call::StageAll);
        assert!(matches!(&calls[2], Call::Commit(m) if m.starts_with("Auto-commit: ")));
        assert_eq!(calls[3], Call::Push("origin".to_string(), "main".to_string()));

        match outcome {
            CycleOutcome::Committed { record, .. } => {
                assert_eq!(record.paths, vec![PathBuf::from("a/x.txt")]);
            }
            other => panic!("expected commit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_clean_status_issues_nothing_else() {
        let git = Arc::new(FakeGit::clean());
        let p = pipeline(&git, true);
        let outcome = p.run(vec![PathBuf::from("x")]).await;

        assert!(matches!(outcome, CycleOutcome::NoChanges));
        assert_eq!(git.calls(), vec![Call::Status]);
        assert!(!p.is_running());
    }

    #[tokio::test]
    async fn test_status_failure_aborts() {
        let git = Arc::new(FakeGit::dirty());
        git.fail(FakeStep::Status);
        let outcome = pipeline(&git, true).run(Vec::new()).await;

        assert!(matches!(outcome, CycleOutcome::Failed { step: Step::Status, .. }));
        assert_eq!(git.calls(), vec![Call::Status]);
    }

    #[tokio::test]
    async fn test_stage_failure_stops_before_commit() {
        let git = Arc::new(FakeGit::dirty());
        git.fail(FakeStep::StageAll);
        let outcome = pipeline(&git, true).run(Vec::new()).await;

        assert!(matches!(outcome, CycleOutcome::Failed { step: Step::Stage, .. }));
        assert_eq!(git.count(|c| matches!(c, Call::Commit(_))), 0);
        assert_eq!(git.count(|c| matches!(c, Call::Push(..))), 0);
    }

    #[tokio::test]
    async fn test_commit_failure_never_pushes() {
        let git = Arc::new(FakeGit::dirty());
        git.fail(FakeStep::Commit);
        let p = pipeline(&git, true);
        let outcome = p.run(Vec::new()).await;

        assert!(matches!(outcome, CycleOutcome::Failed { step: Step::Commit, .. }));
        assert_eq!(git.count(|c| matches!(c, Call::Push(..))), 0);
        assert!(!p.is_running(), "reservation released after failure");
    }

    #[tokio::test]
    async fn test_push_disabled_never_pushes() {
        let git = Arc::new(FakeGit::dirty());
        let outcome = pipeline(&git, false).run(Vec::new()).await;

        assert!(matches!(
            outcome,
            CycleOutcome::Committed { push: PushOutcome::Disabled, .. }
        ));
        assert_eq!(git.count(|c| matches!(c, Call::Push(..))), 0);
    }

    #[tokio::test]
    async fn test_push_failure_keeps_commit() {
        let git = Arc::new(FakeGit::dirty());
        git.fail(FakeStep::Push);
        let p = pipeline(&git, true);
        let outcome = p.run(Vec::new()).await;

        assert!(matches!(
            outcome,
            CycleOutcome::Committed { push: PushOutcome::Failed(_), .. }
        ));
        assert!(!outcome.is_success());
        assert_eq!(git.count(|c| matches!(c, Call::Commit(_))), 1);
        assert!(!p.is_running());

        // The next cycle is independent of the failed push.
        git.heal(FakeStep::Push);
        assert!(p.run(Vec::new()).await.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_runs_are_single_flight() {
        let git = Arc::new(FakeGit::dirty());
        git.set_delay(Duration::from_millis(100));
        let p = Arc::new(pipeline(&git, true));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let p = p.clone();
                tokio::spawn(async move { p.run(Vec::new()).await })
            })
            .collect();

        let mut committed = 0;
        let mut busy = 0;
        for handle in handles {
            match handle.await.unwrap() {
                CycleOutcome::Committed { .. } => committed += 1,
                CycleOutcome::Busy => busy += 1,
                other => panic!("unexpected outcome {other:?}"),
            }
        }

        assert_eq!(committed, 1);
        assert_eq!(busy, 7);
        assert_eq!(git.max_in_flight(), 1);
        assert_eq!(git.count(|c| *c == Call::Status), 1);
    }
}
