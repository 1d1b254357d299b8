// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! vellum - inspect and maintain vellum document files

mod commands;
mod error;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{compact, history, info, migrate, replay, verify, Context};
use error::CliError;
use output::OutputFormat;
use std::path::PathBuf;
use std::process::ExitCode;
use vellum_core::EngineConfig;

#[derive(Parser)]
#[command(
    name = "vellum",
    version,
    about = "Inspect and maintain vellum document files"
)]
struct Cli {
    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show metadata, sequence range and snapshots
    Info(info::InfoArgs),
    /// Check integrity, schema and format version without modifying the file
    Verify(verify::VerifyArgs),
    /// List recorded events
    History(history::HistoryArgs),
    /// Reconstruct the document at a sequence
    Replay(replay::ReplayArgs),
    /// Upgrade a file to the current format
    Migrate(migrate::MigrateArgs),
    /// Prune old snapshots and drop events they cover
    Compact(compact::CompactArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprint!("{}", CliError::from_anyhow(e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let ctx = Context {
        config,
        format: cli.output,
    };

    match cli.command {
        Commands::Info(args) => info::handle(args, &ctx).await,
        Commands::Verify(args) => verify::handle(args, &ctx).await,
        Commands::History(args) => history::handle(args, &ctx).await,
        Commands::Replay(args) => replay::handle(args, &ctx).await,
        Commands::Migrate(args) => migrate::handle(args, &ctx).await,
        Commands::Compact(args) => compact::handle(args, &ctx).await,
    }
}

/// Logs go to stderr so command output stays parseable
fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}
