// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Joint Ledger Core Library
//!
//! Shared-custody accounts: a fixed group of members jointly holds token
//! balances, and nothing leaves an account until enough members have
//! approved it.
//!
//! ## Architecture
//!
//! - **store**: account registry and per-token balances.
//! - **motion**: transfer proposals, voting, quorum, execution.
//! - **ledger**: [`JointLedger`], the one type callers mutate and query.
//! - **event**: committed state transitions and the append-only journal.
//! - **replay**: rebuild a ledger from its journal.
//! - **ops**: operations as data, for scripts and queues.
//! - **service**: [`LedgerHandle`], a lock-serialized shared ledger with
//!   event fan-out.
//! - **config**: sentinels, limits, and policy.
//!
//! ## Ground Rules
//!
//! 1. Every operation is all-or-nothing. A returned error means no balance,
//!    motion, vote, or event changed.
//! 2. Balances are `u64` and only move through checked arithmetic.
//! 3. Callers are authenticated before they get here; the ledger only
//!    checks membership.

pub mod config;
pub mod error;
pub mod event;
pub mod ledger;
pub mod motion;
pub mod ops;
pub mod replay;
pub mod service;
pub mod store;
pub mod types;

pub use config::{LedgerConfig, MemberOnlyScope};
pub use error::LedgerError;
pub use event::{EventJournal, EventRecord, LedgerEvent};
pub use ledger::JointLedger;
pub use motion::{Motion, VoteOutcome};
pub use ops::{Operation, OperationOutcome};
pub use service::LedgerHandle;
pub use store::Account;
pub use types::{AccountId, Address, Amount, MotionId, MotionType, TokenId, TransferDestination};
