pub mod aggregator;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod git;
pub mod logging;
pub mod message;
pub mod pipeline;
pub mod watcher;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;

use aggregator::CommitCycleController;
use bootstrap::{BootstrapReport, BootstrapSettings};
use config::CommitWatchConfig;
use filter::IgnoreMatcher;
use git::{GitCli, VersionControl};
use pipeline::{CommitPipeline, CycleOutcome};
use watcher::PathFilter;

fn bootstrap_settings(config: &CommitWatchConfig) -> BootstrapSettings {
    BootstrapSettings {
        push_enabled: config.push,
        remote: config.remote.clone(),
    }
}

/// Run the repository bootstrap against `repo` only.
pub async fn run_bootstrap(
    repo: &Path,
    config: &CommitWatchConfig,
) -> anyhow::Result<BootstrapReport> {
    let git = GitCli::new(repo);
    bootstrap::bootstrap(&git, &bootstrap_settings(config)).await
}

/// Bootstrap, then execute exactly one commit cycle now.
pub async fn run_once(repo: &Path, config: &CommitWatchConfig) -> anyhow::Result<CycleOutcome> {
    let vcs: Arc<dyn VersionControl> = Arc::new(GitCli::new(repo));
    bootstrap::bootstrap(vcs.as_ref(), &bootstrap_settings(config)).await?;

    let pipeline = CommitPipeline::new(vcs, config.message_style(), config.push_target());
    Ok(pipeline.run(Vec::new()).await)
}

/// Bootstrap, subscribe to every watch root, and drive commit cycles until a
/// termination signal arrives.
///
/// On shutdown the pending quiet window is cancelled; an in-flight cycle is not
/// waited for.
pub async fn run_watch(repo: &Path, config: &CommitWatchConfig) -> anyhow::Result<()> {
    tracing::info!(
        dirs = ?config.watch_directories,
        debounce_ms = config.debounce_ms,
        push = config.push,
        "starting commit watcher"
    );

    let vcs: Arc<dyn VersionControl> = Arc::new(GitCli::new(repo));
    bootstrap::bootstrap(vcs.as_ref(), &bootstrap_settings(config)).await?;

    let matcher = Arc::new(IgnoreMatcher::new(&config.ignore_patterns)?);
    let (tx, mut rx) = mpsc::channel(256);
    let mut watchers = Vec::new();
    for target in config.watch_targets(repo) {
        let mut filter = PathFilter::new(Arc::clone(&matcher));
        if config.respect_gitignore && target.exists {
            filter = filter.with_gitignore(&target.path);
        }
        match watcher::start_watcher(&target, filter, tx.clone()) {
            Ok(Some(handle)) => watchers.push(handle),
            Ok(None) => {}
            Err(err) => {
                tracing::error!(dir = %target.path.display(), error = %err, "failed to start watcher");
            }
        }
    }
    drop(tx);
    if watchers.is_empty() {
        tracing::warn!("no watch directories could be subscribed; waiting for shutdown");
    }

    let pipeline = CommitPipeline::new(vcs, config.message_style(), config.push_target());
    let controller = CommitCycleController::start(Arc::new(pipeline), config.controller_settings());
    let handle = controller.handle;
    let mut task = controller.task;
    // Outcomes are already logged by the pipeline.
    drop(controller.reports);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(change) = rx.recv() => {
                handle.notify(change.full_path());
            }
            () = &mut shutdown => {
                tracing::info!("stopping commit watcher");
                handle.shutdown();
                break;
            }
            result = &mut task => {
                // The controller only stops on its own after a fatal fault.
                return result?;
            }
        }
    }

    drop(watchers);
    task.await?
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
