// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Joint Ledger Node
//!
//! Entry point for the `joint-node` binary. Parses CLI arguments, initializes
//! logging and metrics, and dispatches to a subcommand:
//!
//! - `run`         : apply a script of operations to a ledger
//! - `replay`      : rebuild a ledger from an event journal
//! - `inspect`     : print accounts from a snapshot
//! - `init-config` : write the default ledger configuration
//! - `version`     : print build version information

mod cli;
mod logging;
mod metrics;
mod report;
mod script;

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;

use joint_ledger::{replay, LedgerConfig, LedgerHandle};

use cli::{Commands, JointNodeCli};
use logging::LogFormat;
use metrics::LedgerMetrics;
use report::LedgerReport;

fn main() -> Result<()> {
    let cli = JointNodeCli::parse();

    if !matches!(cli.command, Commands::Version) {
        logging::init_logging(&cli.log_level, LogFormat::from_str_lossy(&cli.log_format));
    }

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Replay(args) => replay_journal(args),
        Commands::Inspect(args) => inspect(args),
        Commands::InitConfig(args) => init_config(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Applies a script to a new or existing ledger.
fn run(args: cli::RunArgs) -> Result<()> {
    let ledger = script::open_ledger(args.state.as_deref(), args.config.as_deref())?;
    let operations = script::load_script(&args.script)?;
    tracing::info!(
        script = %args.script.display(),
        operations = operations.len(),
        "running script"
    );

    let handle = LedgerHandle::new(ledger);
    let metrics = LedgerMetrics::new().context("failed to register metrics")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = script::run_script(&handle, &operations, &metrics, args.fail_fast, &mut out);
    out.flush()?;

    // Whatever committed before a fail-fast stop is still saved.
    let snapshot = handle.snapshot();
    if let Some(path) = &args.state {
        script::write_json(path, &snapshot)?;
        tracing::info!(state = %path.display(), "snapshot saved");
    }
    if let Some(path) = &args.journal_out {
        script::write_json(path, snapshot.journal().records())?;
        tracing::info!(journal = %path.display(), "journal written");
    }
    if args.metrics {
        eprint!("{}", metrics.encode().context("failed to encode metrics")?);
    }

    result.map(|_| ())
}

/// Rebuilds a ledger from a journal file and prints its state.
fn replay_journal(args: cli::ReplayArgs) -> Result<()> {
    let config = script::load_config(args.config.as_deref())?;
    let records = script::load_journal(&args.journal)?;
    let ledger = replay::replay(&records, config)
        .with_context(|| format!("journal {} does not replay", args.journal.display()))?;
    tracing::info!(events = records.len(), accounts = ledger.account_count(), "journal replayed");

    let report = LedgerReport::build(&ledger, None)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn inspect(args: cli::InspectArgs) -> Result<()> {
    let ledger = script::load_snapshot(&args.state)?;
    let report = LedgerReport::build(&ledger, args.account)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn init_config(args: cli::InitConfigArgs) -> Result<()> {
    let json = LedgerConfig::default().to_json_pretty()?;
    std::fs::write(&args.out, json)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    tracing::info!(out = %args.out.display(), "default config written");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("joint-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc      {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
