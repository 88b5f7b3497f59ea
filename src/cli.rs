use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, CommandReport};
use crate::debsnap::config::ConfigOverrides;

#[derive(Debug, Parser)]
#[command(
    name = "debsnap",
    version,
    about = "Replay snapshot.debian.org package indices into a git history"
)]
struct Cli {
    /// TOML config file (default: $DEBSNAP_CONFIG_PATH or <config dir>/debsnap/debsnap.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print the command report as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args, Default)]
struct ArchiveArgs {
    #[arg(long)]
    archive_url: Option<String>,
    #[arg(long)]
    distribution: Option<String>,
    #[arg(long)]
    component: Option<String>,
    #[arg(long)]
    architecture: Option<String>,
    /// Git repository that receives one commit per snapshot
    #[arg(long)]
    repo: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Walk from `now - lookback` to now, committing every snapshot found
    Run {
        #[command(flatten)]
        archive: ArchiveArgs,
        /// Seconds to advance between probes
        #[arg(long)]
        step_secs: Option<u64>,
        #[arg(long)]
        lookback_days: Option<u64>,
    },
    /// Print the snapshot the archive resolves an instant to
    Resolve {
        /// YYYYMMDDThhmmssZ or RFC 3339; defaults to now
        #[arg(long)]
        at: Option<String>,
        #[arg(long)]
        archive_url: Option<String>,
    },
    /// Show effective configuration and the archive repository head
    Status {
        #[command(flatten)]
        archive: ArchiveArgs,
    },
}

fn overrides(config: Option<PathBuf>, archive: ArchiveArgs) -> ConfigOverrides {
    ConfigOverrides {
        config_path: config,
        archive_url: archive.archive_url,
        distribution: archive.distribution,
        component: archive.component,
        architecture: archive.architecture,
        repo_path: archive.repo,
        ..ConfigOverrides::default()
    }
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    let status = if report.ok { "ok" } else { "failed" };
    println!("{}: {status}", report.command);
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        println!("  issue: {issue}");
    }
    Ok(())
}

/// Returns whether the command succeeded.
pub fn run() -> Result<bool> {
    let cli = Cli::parse();
    let report = match cli.command {
        Command::Run {
            archive,
            step_secs,
            lookback_days,
        } => {
            let mut overrides = overrides(cli.config, archive);
            overrides.step_secs = step_secs;
            overrides.lookback_days = lookback_days;
            commands::run::run(&commands::run::RunOptions { overrides })?
        }
        Command::Resolve { at, archive_url } => {
            let overrides = overrides(
                cli.config,
                ArchiveArgs {
                    archive_url,
                    ..ArchiveArgs::default()
                },
            );
            commands::resolve::run(&commands::resolve::ResolveOptions { at, overrides })?
        }
        Command::Status { archive } => {
            let overrides = overrides(cli.config, archive);
            commands::status::run(&commands::status::StatusOptions { overrides })?
        }
    };
    print_report(&report, cli.json)?;
    Ok(report.ok)
}
