//! # CLI Interface
//!
//! Defines the command-line argument structure for `joint-node` using
//! `clap` derive. Supports five subcommands: `run`, `replay`, `inspect`,
//! `init-config`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Joint-account ledger runner.
///
/// Applies scripted operations to a ledger snapshot, rebuilds ledgers from
/// event journals, and prints account and motion state.
#[derive(Parser, Debug)]
#[command(
    name = "joint-node",
    about = "Joint-account ledger runner",
    version,
    propagate_version = true
)]
pub struct JointNodeCli {
    /// Log output format: `pretty` or `json`. Logs always go to stderr.
    #[arg(long, global = true, env = "JOINT_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "joint_node=info,joint_ledger=info")]
    pub log_level: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the joint-node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply a script of operations to a ledger.
    Run(RunArgs),
    /// Rebuild a ledger from an event journal and print its state.
    Replay(ReplayArgs),
    /// Print the accounts stored in a snapshot.
    Inspect(InspectArgs),
    /// Write the default ledger configuration to a file.
    InitConfig(InitConfigArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// JSON array of operations to apply in order.
    #[arg(long, short = 's')]
    pub script: PathBuf,

    /// Ledger snapshot to load before and save after the run.
    ///
    /// Created on first run if it does not exist.
    #[arg(long, env = "JOINT_STATE")]
    pub state: Option<PathBuf>,

    /// Ledger configuration (JSON). Only used when starting a new ledger.
    #[arg(long, short = 'c', env = "JOINT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write the full event journal here after the run.
    #[arg(long)]
    pub journal_out: Option<PathBuf>,

    /// Print Prometheus metrics to stderr after the run.
    #[arg(long)]
    pub metrics: bool,

    /// Stop at the first rejected operation instead of skipping it.
    #[arg(long)]
    pub fail_fast: bool,
}

/// Arguments for the `replay` subcommand.
#[derive(Parser, Debug)]
pub struct ReplayArgs {
    /// JSON array of event records, as written by `run --journal-out`.
    #[arg(long, short = 'j')]
    pub journal: PathBuf,

    /// Ledger configuration (JSON) to replay under.
    #[arg(long, short = 'c', env = "JOINT_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Arguments for the `inspect` subcommand.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Ledger snapshot to read.
    #[arg(long, env = "JOINT_STATE")]
    pub state: PathBuf,

    /// Only print this account.
    #[arg(long, short = 'a')]
    pub account: Option<u64>,
}

/// Arguments for the `init-config` subcommand.
#[derive(Parser, Debug)]
pub struct InitConfigArgs {
    /// Where to write the configuration.
    #[arg(long, short = 'o', default_value = "joint-config.json")]
    pub out: PathBuf,
}
