//! # Ledger Events & Journal
//!
//! Every committed state transition produces exactly one [`LedgerEvent`].
//! Events are staged while an operation runs and appended to the
//! [`EventJournal`] only once the whole operation has succeeded, so the
//! journal never contains a trace of a rejected operation.
//!
//! The journal is append-only and gap-free: record `n` has sequence `n`.
//! Replaying it from genesis (see [`crate::replay`]) rebuilds the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AccountId, Address, Amount, MotionId, MotionType, TokenId, TransferDestination};

// ---------------------------------------------------------------------------
// LedgerEvent
// ---------------------------------------------------------------------------

/// A single committed state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A new account was registered. Carries the full configuration so the
    /// account can be rebuilt from the event alone.
    AccountCreated {
        account_id: AccountId,
        creator: Address,
        members: Vec<Address>,
        approval_threshold: usize,
        is_static: bool,
        is_member_only_deposit: bool,
    },
    /// Tokens entered an account from outside the ledger.
    Deposited {
        account_id: AccountId,
        token_id: TokenId,
        from: Address,
        amount: Amount,
    },
    /// A member proposed a motion.
    MotionCreated {
        account_id: AccountId,
        motion_id: MotionId,
        motion_type: MotionType,
        token_id: TokenId,
        amount: Amount,
        destination: TransferDestination,
        proposer: Address,
    },
    /// A member voted on a motion. Only yes votes exist.
    Voted {
        account_id: AccountId,
        motion_id: MotionId,
        voter: Address,
        vote: bool,
    },
    /// A motion reached quorum and its transfer was carried out.
    TransferExecuted {
        account_id: AccountId,
        motion_id: MotionId,
        token_id: TokenId,
        destination: TransferDestination,
        amount: Amount,
    },
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::AccountCreated { .. } => "AccountCreated",
            LedgerEvent::Deposited { .. } => "Deposited",
            LedgerEvent::MotionCreated { .. } => "MotionCreated",
            LedgerEvent::Voted { .. } => "Voted",
            LedgerEvent::TransferExecuted { .. } => "TransferExecuted",
        }
    }

    /// The account whose state this event changed.
    pub fn account_id(&self) -> AccountId {
        match self {
            LedgerEvent::AccountCreated { account_id, .. }
            | LedgerEvent::Deposited { account_id, .. }
            | LedgerEvent::MotionCreated { account_id, .. }
            | LedgerEvent::Voted { account_id, .. }
            | LedgerEvent::TransferExecuted { account_id, .. } => *account_id,
        }
    }
}

/// A journaled event with its position and commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the journal, starting at 0.
    pub sequence: u64,
    /// Wall-clock time the owning operation committed.
    pub recorded_at: DateTime<Utc>,
    pub event: LedgerEvent,
}

// ---------------------------------------------------------------------------
// EventJournal
// ---------------------------------------------------------------------------

/// Append-only, gap-free log of committed events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventJournal {
    records: Vec<EventRecord>,
}

impl EventJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sequence number the next committed event will receive.
    pub fn next_sequence(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Records with `sequence >= from`. Empty when `from` is past the end.
    pub fn since(&self, from: u64) -> &[EventRecord] {
        let start = usize::try_from(from).unwrap_or(usize::MAX).min(self.records.len());
        &self.records[start..]
    }

    /// Appends the events of one committed operation, stamped with a single
    /// commit time. Returns the newly written records.
    pub(crate) fn commit(&mut self, staged: Vec<LedgerEvent>) -> &[EventRecord] {
        let start = self.records.len();
        let recorded_at = Utc::now();
        for event in staged {
            let sequence = self.next_sequence();
            self.records.push(EventRecord {
                sequence,
                recorded_at,
                event,
            });
        }
        &self.records[start..]
    }

    /// Appends an existing record verbatim. The caller has already checked
    /// that `record.sequence == self.next_sequence()`.
    pub(crate) fn restore(&mut self, record: EventRecord) {
        self.records.push(record);
    }
}
