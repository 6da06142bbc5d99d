use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Overrides;
use crate::logging::LogFormat;

/// Watches working-tree directories and commits bursts of edits automatically.
///
/// Changes are coalesced over a quiet window, then staged, committed with a
/// generated message and optionally pushed. Only one commit cycle runs at a time.
#[derive(Parser, Debug)]
#[command(
    name = "commit-watch",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,
}

/// Options shared by every subcommand that reads configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Read configuration from this file instead of `<PATH>/commit-watch.toml`.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory to watch, relative to the repository (repeatable; replaces the configured list).
    #[arg(long = "watch", value_name = "DIR")]
    pub watch: Vec<PathBuf>,

    /// Quiet window in milliseconds before changes are committed.
    #[arg(long)]
    pub debounce_ms: Option<u64>,

    /// Commit locally but never push.
    #[arg(long)]
    pub no_push: bool,

    /// Remote to push to.
    #[arg(long)]
    pub remote: Option<String>,

    /// Branch to push.
    #[arg(long)]
    pub branch: Option<String>,
}

impl ConfigArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            watch_directories: self.watch.clone(),
            debounce_ms: self.debounce_ms,
            no_push: self.no_push,
            remote: self.remote.clone(),
            branch: self.branch.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bootstrap the repository, then watch and auto-commit until interrupted.
    Watch {
        /// Repository directory.
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Bootstrap the repository and run a single commit cycle immediately.
    Commit {
        /// Repository directory.
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Ensure a repository exists and check the push remote, then exit.
    Bootstrap {
        /// Repository directory.
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Print the effective configuration.
    Config {
        /// Repository directory.
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,

        /// Output as JSON instead of TOML.
        #[arg(long)]
        json: bool,
    },
}
