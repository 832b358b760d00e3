//! # Prometheus Metrics
//!
//! Counts what a run did to the ledger. Rendered in the Prometheus text
//! exposition format at the end of `joint-node run --metrics`.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use joint_ledger::{LedgerError, OperationOutcome};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Holds all Prometheus metric handles for a run.
#[derive(Clone)]
pub struct LedgerMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Operations that committed, by operation name.
    pub operations_applied_total: IntCounterVec,
    /// Operations that were rejected, by error kind.
    pub operations_rejected_total: IntCounterVec,
    /// Motions that reached quorum and moved funds.
    pub transfers_executed_total: IntCounter,
    /// Number of accounts in the ledger.
    pub accounts: IntGauge,
}

impl LedgerMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("joint".into()), None)?;

        let operations_applied_total = IntCounterVec::new(
            Opts::new(
                "operations_applied_total",
                "Operations committed to the ledger",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(operations_applied_total.clone()))?;

        let operations_rejected_total = IntCounterVec::new(
            Opts::new(
                "operations_rejected_total",
                "Operations rejected by the ledger",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(operations_rejected_total.clone()))?;

        let transfers_executed_total = IntCounter::new(
            "transfers_executed_total",
            "Transfer motions that reached quorum and executed",
        )?;
        registry.register(Box::new(transfers_executed_total.clone()))?;

        let accounts = IntGauge::new("accounts", "Number of joint accounts")?;
        registry.register(Box::new(accounts.clone()))?;

        Ok(Self {
            registry,
            operations_applied_total,
            operations_rejected_total,
            transfers_executed_total,
            accounts,
        })
    }

    /// Records the result of one applied operation.
    pub fn observe(&self, operation: &str, result: &Result<OperationOutcome, LedgerError>) {
        match result {
            Ok(outcome) => {
                self.operations_applied_total
                    .with_label_values(&[operation])
                    .inc();
                if outcome.executed_transfer() {
                    self.transfers_executed_total.inc();
                }
            }
            Err(err) => {
                self.operations_rejected_total
                    .with_label_values(&[err.kind()])
                    .inc();
            }
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
