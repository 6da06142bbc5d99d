use anyhow::Context;

use crate::git::VersionControl;

/// Message of the commit created when the watcher initialises a repository.
pub const INITIAL_COMMIT_MESSAGE: &str = "Initial commit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapSettings {
    pub push_enabled: bool,
    pub remote: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Present,
    Missing,
    /// Listing remotes failed.
    Unknown,
    /// Push is disabled, so the remote was not looked at.
    NotChecked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapReport {
    /// True when this run created the repository.
    pub initialized: bool,
    pub remote: RemoteStatus,
}

/// One-time startup check: make sure a repository exists and, when pushing, that
/// the remote is configured.
///
/// A missing remote is a warning, never an error; pushes will fail and be
/// reported per cycle instead. Failing to initialise a repository is an error.
pub async fn bootstrap(
    vcs: &dyn VersionControl,
    settings: &BootstrapSettings,
) -> anyhow::Result<BootstrapReport> {
    let initialized = ensure_repository(vcs).await?;
    let remote = if settings.push_enabled {
        check_remote(vcs, &settings.remote).await
    } else {
        RemoteStatus::NotChecked
    };
    Ok(BootstrapReport { initialized, remote })
}

async fn ensure_repository(vcs: &dyn VersionControl) -> anyhow::Result<bool> {
    match vcs.status().await {
        Ok(_) => {
            tracing::info!(outcome = "success", "git repository found");
            return Ok(false);
        }
        Err(err) => {
            tracing::warn!(error = %err, "git repository not found; initializing");
        }
    }

    vcs.init().await.context("git init failed")?;
    vcs.stage_all().await.context("staging initial contents failed")?;
    let status = vcs.status().await.context("status after init failed")?;
    if status.is_empty() {
        tracing::warn!("repository is empty; skipping initial commit");
    } else {
        vcs.commit(INITIAL_COMMIT_MESSAGE)
            .await
            .context("initial commit failed")?;
    }
    tracing::info!(outcome = "success", "git repository initialized");
    Ok(true)
}

async fn check_remote(vcs: &dyn VersionControl, remote: &str) -> RemoteStatus {
    match vcs.list_remotes().await {
        Ok(remotes) if remotes.iter().any(|r| r == remote) => {
            tracing::info!(outcome = "success", remote, "git remote found");
            RemoteStatus::Present
        }
        Ok(_) => {
            tracing::warn!(remote, "no git remote configured; pushes will fail until one is added");
            tracing::info!("{}", remote_add_hint(remote));
            RemoteStatus::Missing
        }
        Err(err) => {
            tracing::error!(error = %err, "error checking git remote");
            RemoteStatus::Unknown
        }
    }
}

/// The command an operator should run to add the missing remote.
pub fn remote_add_hint(remote: &str) -> String {
    format!("git remote add {remote} https://github.com/yourusername/yourrepo.git")
}
