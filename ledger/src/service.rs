//! # Shared Ledger Handle
//!
//! Serializes access to a [`JointLedger`] shared between threads or tasks.
//!
//! - Mutations take the write lock, so operations never interleave.
//! - Reads take the read lock and only ever observe committed state.
//! - After every successful mutation the newly journaled records are
//!   published, still under the write lock, on a `tokio` broadcast channel.
//!   Subscribers therefore see records in commit order. A subscriber that
//!   falls more than [`EVENT_CHANNEL_CAPACITY`] records behind gets a
//!   `Lagged` error and can catch up from [`LedgerHandle::events_since`].

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::config::EVENT_CHANNEL_CAPACITY;
use crate::error::LedgerError;
use crate::event::EventRecord;
use crate::ledger::JointLedger;
use crate::ops::{Operation, OperationOutcome};

/// Cheap to clone; all clones share the same ledger and event channel.
#[derive(Clone)]
pub struct LedgerHandle {
    ledger: Arc<RwLock<JointLedger>>,
    events: broadcast::Sender<EventRecord>,
}

impl LedgerHandle {
    pub fn new(ledger: JointLedger) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
            events,
        }
    }

    /// Receives every record committed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.events.subscribe()
    }

    /// Applies one operation atomically and publishes its events.
    pub fn submit(&self, operation: &Operation) -> Result<OperationOutcome, LedgerError> {
        let mut ledger = self.ledger.write();
        let first = ledger.journal().next_sequence();

        let outcome = ledger.apply(operation)?;

        for record in ledger.events_since(first) {
            // No subscribers is not an error.
            let _ = self.events.send(record.clone());
        }

        Ok(outcome)
    }

    /// Runs `f` against the committed state under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&JointLedger) -> R) -> R {
        let ledger = self.ledger.read();
        f(&*ledger)
    }

    /// Committed records with `sequence >= from`.
    pub fn events_since(&self, from: u64) -> Vec<EventRecord> {
        self.read(|ledger| ledger.events_since(from).to_vec())
    }

    /// A point-in-time copy of the whole ledger.
    pub fn snapshot(&self) -> JointLedger {
        self.read(JointLedger::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LedgerEvent;
    use std::thread;

    fn create_account(actor: &str) -> Operation {
        Operation::CreateAccount {
            actor: actor.into(),
            members: vec![actor.into()],
            approval_threshold: 1,
            is_static: true,
            is_member_only_deposit: false,
        }
    }

    #[tokio::test]
    async fn subscribers_receive_committed_events_in_order() {
        let handle = LedgerHandle::new(JointLedger::default());
        let mut rx = handle.subscribe();

        handle.submit(&create_account("alice")).unwrap();
        handle
            .submit(&Operation::Deposit {
                actor: "alice".into(),
                account_id: 0,
                token_id: "TEST".into(),
                amount: 10,
            })
            .unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.sequence, 0);
        assert!(matches!(first.event, LedgerEvent::AccountCreated { .. }));
        assert_eq!(second.sequence, 1);
        assert!(matches!(second.event, LedgerEvent::Deposited { amount: 10, .. }));
    }

    #[tokio::test]
    async fn rejected_operations_publish_nothing() {
        let handle = LedgerHandle::new(JointLedger::default());
        let mut rx = handle.subscribe();

        let result = handle.submit(&Operation::Deposit {
            actor: "alice".into(),
            account_id: 3,
            token_id: "TEST".into(),
            amount: 10,
        });
        assert_eq!(result, Err(LedgerError::AccountNotFound(3)));
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
        assert!(handle.events_since(0).is_empty());
    }

    #[test]
    fn concurrent_writers_get_distinct_ids() {
        let handle = LedgerHandle::new(JointLedger::default());
        let workers: Vec<_> = (0..8)
            .map(|i| {
                let handle = handle.clone();
                thread::spawn(move || {
                    let mut created = 0;
                    for _ in 0..25 {
                        handle.submit(&create_account(&format!("member-{i}"))).unwrap();
                        created += 1;
                    }
                    created
                })
            })
            .collect();
        for worker in workers {
            assert_eq!(worker.join().unwrap(), 25);
        }

        let ledger = handle.snapshot();
        assert_eq!(ledger.account_count(), 200);
        let sequences: Vec<u64> = ledger.journal().records().iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, (0..200).collect::<Vec<u64>>());
        assert!(ledger.verify_journal().is_ok());
    }
}
