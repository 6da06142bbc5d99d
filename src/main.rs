use std::path::Path;

use anyhow::{Result, bail};
use clap::Parser;

use commit_watch::cli::{Cli, Commands, ConfigArgs};
use commit_watch::config::CommitWatchConfig;
use commit_watch::logging::init_logging;
use commit_watch::pipeline::{CycleOutcome, PushOutcome};

fn load_config(path: &Path, args: &ConfigArgs) -> CommitWatchConfig {
    let base = match &args.config {
        Some(file) => CommitWatchConfig::load_from(file),
        None => CommitWatchConfig::load(path),
    };
    base.apply(&args.overrides())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format)?;

    match cli.command {
        Commands::Watch { path, config } => {
            let config = load_config(&path, &config);
            commit_watch::run_watch(&path, &config).await?;
        }
        Commands::Commit { path, config } => {
            let config = load_config(&path, &config);
            match commit_watch::run_once(&path, &config).await? {
                CycleOutcome::Committed { record, push } => {
                    println!("{}", record.message);
                    if let PushOutcome::Failed(err) = push {
                        bail!("committed but push failed: {err}");
                    }
                }
                CycleOutcome::NoChanges => println!("No changes to commit"),
                CycleOutcome::Failed { step, error } => {
                    bail!("commit cycle failed at {step}: {error}");
                }
                CycleOutcome::Busy => bail!("another commit cycle is already running"),
            }
        }
        Commands::Bootstrap { path, config } => {
            let config = load_config(&path, &config);
            let report = commit_watch::run_bootstrap(&path, &config).await?;
            if report.initialized {
                println!("Initialized repository at {}", path.display());
            } else {
                println!("Repository found at {}", path.display());
            }
        }
        Commands::Config { path, config, json } => {
            let config = load_config(&path, &config);
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}
