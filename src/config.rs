use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::aggregator::ControllerSettings;
use crate::message::MessageStyle;
use crate::pipeline::PushTarget;
use crate::watcher::WatchTarget;

/// File name looked up in the repository directory.
pub const CONFIG_FILE: &str = "commit-watch.toml";

/// Configuration loaded from `commit-watch.toml`, with CLI overrides applied on top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitWatchConfig {
    /// Directories to watch, relative to the repository directory.
    pub watch_directories: Vec<PathBuf>,
    /// Substrings or single-`*` patterns for paths that never trigger a commit.
    pub ignore_patterns: Vec<String>,
    /// Also skip paths matched by each watch root's `.gitignore`.
    pub respect_gitignore: bool,
    /// Quiet window before a burst of changes is committed.
    pub debounce_ms: u64,
    /// Accepted but not enforced: a larger changeset is still one commit.
    pub max_files_per_commit: usize,
    pub use_timestamp: bool,
    pub message_prefix: String,
    pub push: bool,
    pub remote: String,
    pub branch: String,
}

impl Default for CommitWatchConfig {
    fn default() -> Self {
        Self {
            watch_directories: vec![
                PathBuf::from("vuln_scanner_api"),
                PathBuf::from("vuln-scanner-frontend"),
            ],
            ignore_patterns: [
                "node_modules",
                ".git",
                "dist",
                "build",
                "__pycache__",
                "*.pyc",
                "*.log",
                ".env",
                ".DS_Store",
                "package-lock.json",
                "yarn.lock",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            respect_gitignore: false,
            debounce_ms: 3000,
            max_files_per_commit: 50,
            use_timestamp: true,
            message_prefix: "Auto-commit".to_string(),
            push: true,
            remote: "origin".to_string(),
            branch: "main".to_string(),
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub watch_directories: Vec<PathBuf>,
    pub debounce_ms: Option<u64>,
    pub no_push: bool,
    pub remote: Option<String>,
    pub branch: Option<String>,
}

impl CommitWatchConfig {
    /// Load configuration from `commit-watch.toml` in the given root directory.
    ///
    /// Returns the default configuration if the file does not exist or cannot be parsed.
    pub fn load(root: &Path) -> Self {
        Self::load_from(&root.join(CONFIG_FILE))
    }

    /// Load from an explicit file path, with the same fallbacks as [`Self::load`].
    pub fn load_from(config_path: &Path) -> Self {
        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "no config file; using defaults");
            return Self::default();
        }

        match std::fs::read_to_string(config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(
                        path = %config_path.display(),
                        error = %err,
                        "failed to parse config; using defaults"
                    );
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!(
                    path = %config_path.display(),
                    error = %err,
                    "failed to read config; using defaults"
                );
                Self::default()
            }
        }
    }

    pub fn apply(mut self, overrides: &Overrides) -> Self {
        if !overrides.watch_directories.is_empty() {
            self.watch_directories = overrides.watch_directories.clone();
        }
        if let Some(ms) = overrides.debounce_ms {
            self.debounce_ms = ms;
        }
        if overrides.no_push {
            self.push = false;
        }
        if let Some(remote) = &overrides.remote {
            self.remote = remote.clone();
        }
        if let Some(branch) = &overrides.branch {
            self.branch = branch.clone();
        }
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn message_style(&self) -> MessageStyle {
        MessageStyle {
            prefix: self.message_prefix.clone(),
            use_timestamp: self.use_timestamp,
        }
    }

    pub fn push_target(&self) -> PushTarget {
        PushTarget {
            enabled: self.push,
            remote: self.remote.clone(),
            branch: self.branch.clone(),
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            debounce: self.debounce(),
            max_files_per_commit: self.max_files_per_commit,
        }
    }

    /// Resolve every configured directory against `repo`, probing existence once.
    pub fn watch_targets(&self, repo: &Path) -> Vec<WatchTarget> {
        self.watch_directories
            .iter()
            .map(|dir| WatchTarget::resolve(repo, dir))
            .collect()
    }
}
