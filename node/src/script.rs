//! # Script Runner
//!
//! File I/O for the node and the loop that feeds a script of operations
//! through a [`LedgerHandle`].
//!
//! Committed events are read off the handle's broadcast channel after each
//! operation and written to `out` as JSON lines, so stdout carries exactly
//! the journal suffix produced by the run.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use joint_ledger::{EventRecord, JointLedger, LedgerConfig, LedgerHandle, Operation};
use serde::Serialize;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{info, warn};

use crate::metrics::LedgerMetrics;

/// Loads a ledger configuration, or the default when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<LedgerConfig> {
    let Some(path) = path else {
        return Ok(LedgerConfig::default());
    };
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    LedgerConfig::from_json(&json)
        .with_context(|| format!("invalid ledger config in {}", path.display()))
}

/// Loads a snapshot and checks it against its own journal.
pub fn load_snapshot(path: &Path) -> Result<JointLedger> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let ledger = JointLedger::from_snapshot_json(&json)
        .with_context(|| format!("invalid snapshot in {}", path.display()))?;
    ledger
        .verify_journal()
        .with_context(|| format!("snapshot {} does not match its journal", path.display()))?;
    Ok(ledger)
}

/// Opens the ledger at `state`, or starts a new one when there is no
/// snapshot yet.
pub fn open_ledger(state: Option<&Path>, config: Option<&Path>) -> Result<JointLedger> {
    match state {
        Some(path) if path.exists() => {
            if config.is_some() {
                warn!(
                    state = %path.display(),
                    "existing snapshot carries its own config; --config ignored"
                );
            }
            let ledger = load_snapshot(path)?;
            info!(
                state = %path.display(),
                accounts = ledger.account_count(),
                events = ledger.journal().len(),
                "snapshot loaded"
            );
            Ok(ledger)
        }
        _ => Ok(JointLedger::new(load_config(config)?)),
    }
}

pub fn load_script(path: &Path) -> Result<Vec<Operation>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("invalid script in {}", path.display()))
}

pub fn load_journal(path: &Path) -> Result<Vec<EventRecord>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read journal {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("invalid journal in {}", path.display()))
}

/// Writes `value` as pretty JSON.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

/// Counts of what a run did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub applied: usize,
    pub rejected: usize,
}

/// Applies `operations` in order.
///
/// Rejections are logged and counted; with `fail_fast` the first one ends
/// the run with an error instead.
pub fn run_script(
    handle: &LedgerHandle,
    operations: &[Operation],
    metrics: &LedgerMetrics,
    fail_fast: bool,
    out: &mut impl Write,
) -> Result<RunSummary> {
    let mut events = handle.subscribe();
    let mut summary = RunSummary::default();

    for (index, operation) in operations.iter().enumerate() {
        let result = handle.submit(operation);
        metrics.observe(operation.name(), &result);

        match result {
            Ok(_) => summary.applied += 1,
            Err(err) => {
                summary.rejected += 1;
                warn!(
                    index,
                    operation = operation.name(),
                    actor = %operation.actor(),
                    kind = err.kind(),
                    error = %err,
                    "operation rejected"
                );
                if fail_fast {
                    bail!("operation {index} ({}) rejected: {err}", operation.name());
                }
            }
        }

        loop {
            match events.try_recv() {
                Ok(record) => writeln!(out, "{}", serde_json::to_string(&record)?)?,
                Err(TryRecvError::Empty) => break,
                Err(err) => bail!("event stream broken: {err}"),
            }
        }
    }

    metrics
        .accounts
        .set(handle.read(|ledger| ledger.account_count()) as i64);
    info!(
        applied = summary.applied,
        rejected = summary.rejected,
        "script finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SCRIPT: &str = r#"[
        { "op": "create_account", "actor": "alice", "members": ["alice", "bob"], "approval_threshold": 2 },
        { "op": "deposit", "actor": "carol", "account_id": 0, "token_id": "TEST", "amount": 1000 },
        { "op": "create_transfer_motion", "actor": "alice", "account_id": 0, "token_id": "TEST",
          "amount": 50, "recipient": "carol", "destination_account": 0 },
        { "op": "create_transfer_motion", "actor": "alice", "account_id": 0, "token_id": "TEST",
          "amount": 50, "recipient": "carol" },
        { "op": "vote_motion", "actor": "bob", "account_id": 0, "motion_id": 0 }
    ]"#;

    fn script() -> Vec<Operation> {
        serde_json::from_str(SCRIPT).unwrap()
    }

    #[test]
    fn run_prints_one_line_per_committed_event() {
        let handle = LedgerHandle::new(JointLedger::default());
        let metrics = LedgerMetrics::new().unwrap();
        let mut out = Vec::new();

        let summary = run_script(&handle, &script(), &metrics, false, &mut out).unwrap();
        assert_eq!(summary, RunSummary { applied: 4, rejected: 1 });

        let lines: Vec<EventRecord> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines, handle.events_since(0));
        assert_eq!(lines.len(), 6);
        assert_eq!(metrics.transfers_executed_total.get(), 1);
        assert_eq!(metrics.accounts.get(), 1);
    }

    #[test]
    fn fail_fast_stops_at_first_rejection() {
        let handle = LedgerHandle::new(JointLedger::default());
        let metrics = LedgerMetrics::new().unwrap();
        let mut out = Vec::new();

        let err = run_script(&handle, &script(), &metrics, true, &mut out).unwrap_err();
        assert!(err.to_string().contains("create_transfer_motion"), "{err}");
        assert_eq!(handle.read(|l| l.motion_count(0)), 0);
    }

    #[test]
    fn snapshot_survives_a_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join("state.json");

        let ledger = open_ledger(Some(&state), None).unwrap();
        let handle = LedgerHandle::new(ledger);
        let metrics = LedgerMetrics::new().unwrap();
        run_script(&handle, &script(), &metrics, false, &mut Vec::new()).unwrap();
        write_json(&state, &handle.snapshot()).unwrap();

        let reopened = open_ledger(Some(&state), None).unwrap();
        assert_eq!(reopened, handle.snapshot());
        assert_eq!(reopened.balance_of(0, &"TEST".into()), 950);
    }

    #[test]
    fn tampered_snapshot_is_refused() {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join("state.json");

        let mut ledger = JointLedger::default();
        ledger
            .create_account(&"alice".into(), vec!["alice".into()], 1, true, false)
            .unwrap();
        ledger.deposit(0, &"TEST".into(), 10, &"alice".into()).unwrap();
        let json = ledger
            .to_snapshot_json()
            .unwrap()
            .replacen("\"TEST\": 10", "\"TEST\": 11", 1);
        fs::write(&state, json).unwrap();

        let err = load_snapshot(&state).unwrap_err();
        assert!(format!("{err:#}").contains("does not match its journal"), "{err:#}");
    }

    #[test]
    fn journal_file_replays() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");

        let handle = LedgerHandle::new(JointLedger::default());
        let metrics = LedgerMetrics::new().unwrap();
        run_script(&handle, &script(), &metrics, false, &mut Vec::new()).unwrap();
        write_json(&path, handle.snapshot().journal().records()).unwrap();

        let records = load_journal(&path).unwrap();
        let rebuilt = joint_ledger::replay::replay(&records, LedgerConfig::default()).unwrap();
        assert_eq!(rebuilt, handle.snapshot());
    }

    #[test]
    fn missing_config_defaults_and_bad_config_fails() {
        assert_eq!(load_config(None).unwrap(), LedgerConfig::default());

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ \"max_members\": \"many\" }").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
