//! Debounce scheduler that folds filesystem changes into commit cycles.
//!
//! All mutable state (pending paths, timer deadline, in-flight run) is owned by a
//! single controller task. Callers talk to it through a [`ControllerHandle`].
//!
//! Known limitation: every `notify` restarts the quiet window, so a stream of
//! changes arriving faster than the window postpones the commit indefinitely.
//! There is no upper bound on postponement.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, sleep_until};

use crate::pipeline::{CommitPipeline, CycleOutcome};

/// Lifecycle of the (single) commit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitCycleState {
    Idle,
    /// A quiet window is armed and no cycle is running.
    Scheduled,
    /// A pipeline run is in flight. Never more than one.
    Running,
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub debounce: Duration,
    /// Accepted for configuration compatibility; a larger changeset is still
    /// committed in one cycle.
    pub max_files_per_commit: usize,
}

/// One finished pipeline run, with the changeset it was given.
#[derive(Debug)]
pub struct CycleReport {
    pub paths: Vec<PathBuf>,
    pub outcome: CycleOutcome,
}

enum Command {
    Notify(PathBuf),
    Shutdown,
}

/// Cheap, cloneable handle to the controller task.
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<CommitCycleState>,
}

impl ControllerHandle {
    /// Record a changed path and restart the quiet window. Never blocks.
    ///
    /// Returns false once the controller has stopped.
    pub fn notify(&self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return true;
        }
        self.commands.send(Command::Notify(path)).is_ok()
    }

    /// Cancel the pending quiet window and stop the controller. An in-flight run
    /// is neither awaited nor aborted.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    pub fn state(&self) -> CommitCycleState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<CommitCycleState> {
        self.state.clone()
    }
}

/// A started controller: its handle, the stream of finished cycles, and the task.
pub struct RunningController {
    pub handle: ControllerHandle,
    /// Reports for every completed run. May be dropped if nobody cares.
    pub reports: mpsc::UnboundedReceiver<CycleReport>,
    /// Resolves when the controller stops. An `Err` means a fatal fault.
    pub task: JoinHandle<anyhow::Result<()>>,
}

pub struct CommitCycleController {
    pipeline: Arc<CommitPipeline>,
    settings: ControllerSettings,
    pending: BTreeSet<PathBuf>,
    deadline: Option<Instant>,
    in_flight: Option<(Vec<PathBuf>, JoinHandle<CycleOutcome>)>,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<CommitCycleState>,
    reports: mpsc::UnboundedSender<CycleReport>,
}

impl CommitCycleController {
    /// Spawn the controller task on the current runtime.
    pub fn start(pipeline: Arc<CommitPipeline>, settings: ControllerSettings) -> RunningController {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(CommitCycleState::Idle);
        let (report_tx, report_rx) = mpsc::unbounded_channel();

        let controller = CommitCycleController {
            pipeline,
            settings,
            pending: BTreeSet::new(),
            deadline: None,
            in_flight: None,
            commands: command_rx,
            state: state_tx,
            reports: report_tx,
        };

        RunningController {
            handle: ControllerHandle {
                commands: command_tx,
                state: state_rx,
            },
            reports: report_rx,
            task: tokio::spawn(controller.run()),
        }
    }

    async fn run(mut self) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Notify(path)) => self.record(path),
                    Some(Command::Shutdown) | None => break,
                },
                () = wait_until(self.deadline) => self.on_quiet_window(),
                joined = join_in_flight(&mut self.in_flight) => self.on_run_finished(joined)?,
            }
            self.publish_state();
        }

        // The pending quiet window ends with this task. Dropping the join handle
        // detaches an in-flight run; it finishes on its own.
        if self.in_flight.take().is_none() {
            self.state.send_replace(CommitCycleState::Idle);
        }
        tracing::info!(pending = self.pending.len(), "commit watcher stopped");
        Ok(())
    }

    fn record(&mut self, path: PathBuf) {
        self.pending.insert(path);
        self.deadline = Some(Instant::now() + self.settings.debounce);
    }

    fn on_quiet_window(&mut self) {
        self.deadline = None;

        if self.in_flight.is_some() {
            tracing::debug!(
                pending = self.pending.len(),
                "quiet window elapsed during a running cycle; changes held for the next one"
            );
            return;
        }
        if self.pending.is_empty() {
            return;
        }

        let paths: Vec<PathBuf> = std::mem::take(&mut self.pending).into_iter().collect();
        if paths.len() > self.settings.max_files_per_commit {
            tracing::info!(
                paths = paths.len(),
                max_files_per_commit = self.settings.max_files_per_commit,
                "changeset larger than max_files_per_commit; committing it whole"
            );
        }

        self.state.send_replace(CommitCycleState::Scheduled);
        let pipeline = Arc::clone(&self.pipeline);
        let run_paths = paths.clone();
        let handle = tokio::spawn(async move { pipeline.run(run_paths).await });
        self.in_flight = Some((paths, handle));
    }

    fn on_run_finished(
        &mut self,
        joined: (Vec<PathBuf>, Result<CycleOutcome, JoinError>),
    ) -> anyhow::Result<()> {
        self.in_flight = None;
        let (paths, result) = joined;
        let outcome = result.map_err(|err| anyhow!("commit cycle task failed: {err}"))?;

        // Changes that arrived while the cycle ran get their own window now
        // rather than waiting for the next filesystem event.
        if !self.pending.is_empty() && self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.settings.debounce);
        }

        let _ = self.reports.send(CycleReport { paths, outcome });
        Ok(())
    }

    fn publish_state(&self) {
        let state = if self.in_flight.is_some() {
            CommitCycleState::Running
        } else if self.deadline.is_some() {
            CommitCycleState::Scheduled
        } else {
            CommitCycleState::Idle
        };
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn join_in_flight(
    slot: &mut Option<(Vec<PathBuf>, JoinHandle<CycleOutcome>)>,
) -> (Vec<PathBuf>, Result<CycleOutcome, JoinError>) {
    match slot {
        Some((paths, handle)) => {
            let result = handle.await;
            (std::mem::take(paths), result)
        }
        None => std::future::pending().await,
    }
}
