//! The git command surface used by the pipeline and bootstrap.
//!
//! [`GitCli`] shells out to the `git` binary; tests drive the scripted fake.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::GitError;

pub type GitResult<T> = Result<T, GitError>;

/// The external version-control surface the watcher drives.
///
/// Implementations are black boxes: each call either succeeds (optionally with
/// output) or fails with error text. Nothing here is retried.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Porcelain status lines, one per changed or untracked path. Empty means clean.
    async fn status(&self) -> GitResult<Vec<String>>;
    /// Stage every change in the working tree.
    async fn stage_all(&self) -> GitResult<()>;
    async fn commit(&self, message: &str) -> GitResult<()>;
    async fn push(&self, remote: &str, branch: &str) -> GitResult<()>;
    async fn init(&self) -> GitResult<()>;
    /// Names of the configured remotes.
    async fn list_remotes(&self) -> GitResult<Vec<String>>;
}

/// `VersionControl` backed by the `git` binary, run inside `repo`.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo: PathBuf,
}

impl GitCli {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    /// Run `git <args>` and return stdout, or a `GitError` carrying stderr.
    async fn run(&self, args: &[&str]) -> GitResult<String> {
        let command = args.join(" ");
        tracing::debug!(command = %command, repo = %self.repo.display(), "running git");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo)
            .output()
            .await
            .map_err(|source| GitError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            let mut stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.is_empty() {
                // `git commit` reports "nothing to commit" on stdout.
                stderr = String::from_utf8_lossy(&output.stdout).trim().to_string();
            }
            return Err(GitError::Failed {
                command,
                code: output.status.code(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn status(&self) -> GitResult<Vec<String>> {
        let stdout = self.run(&["status", "--porcelain"]).await?;
        Ok(non_empty_lines(&stdout))
    }

    async fn stage_all(&self) -> GitResult<()> {
        self.run(&["add", "."]).await.map(drop)
    }

    async fn commit(&self, message: &str) -> GitResult<()> {
        self.run(&["commit", "-m", message]).await.map(drop)
    }

    async fn push(&self, remote: &str, branch: &str) -> GitResult<()> {
        self.run(&["push", remote, branch]).await.map(drop)
    }

    async fn init(&self) -> GitResult<()> {
        self.run(&["init"]).await.map(drop)
    }

    async fn list_remotes(&self) -> GitResult<Vec<String>> {
        let stdout = self.run(&["remote"]).await?;
        Ok(non_empty_lines(&stdout)
            .into_iter()
            .map(|line| line.trim().to_string())
            .collect())
    }
}

fn non_empty_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}
