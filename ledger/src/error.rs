//! # Ledger Errors
//!
//! One error type for every operation in the crate. A returned error always
//! means the operation was rejected as a whole: no balance, motion, vote,
//! or journal entry was touched.

use thiserror::Error;

use crate::types::{AccountId, Address, Amount, MotionId, TokenId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// No account with this id has been created.
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// The account exists but has no motion with this id.
    #[error("motion not found: account {account_id}, motion {motion_id}")]
    MotionNotFound {
        account_id: AccountId,
        motion_id: MotionId,
    },

    /// Account creation parameters are out of range (empty or duplicated
    /// membership, threshold outside `1..=members`, too many members).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A transfer names both or neither of its destination fields, or an
    /// internal destination that cannot receive funds.
    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    /// The actor is not a member of the account it tried to act on.
    #[error("unauthorized: {actor} is not a member of account {account_id}")]
    Unauthorized {
        actor: Address,
        account_id: AccountId,
    },

    /// The member has already voted on this motion.
    #[error("{voter} already voted on motion {motion_id} of account {account_id}")]
    AlreadyVoted {
        account_id: AccountId,
        motion_id: MotionId,
        voter: Address,
    },

    /// The motion was already executed and accepts no further votes.
    #[error("motion {motion_id} of account {account_id} is not active")]
    MotionNotActive {
        account_id: AccountId,
        motion_id: MotionId,
    },

    /// The account balance cannot cover the requested amount.
    #[error(
        "insufficient funds: account {account_id} holds {available} of {token_id}, requested {requested}"
    )]
    InsufficientFunds {
        account_id: AccountId,
        token_id: TokenId,
        available: Amount,
        requested: Amount,
    },

    /// Deposits and transfers must move a non-zero amount.
    #[error("invalid amount: amount must be greater than zero")]
    InvalidAmount,

    /// Crediting the balance would exceed `u64::MAX`.
    #[error("balance overflow: account {account_id} holds {current} of {token_id}, credit {credit}")]
    Overflow {
        account_id: AccountId,
        token_id: TokenId,
        current: Amount,
        credit: Amount,
    },

    /// An event journal could not be replayed onto a fresh ledger.
    #[error("replay mismatch at sequence {sequence}: {reason}")]
    ReplayMismatch { sequence: u64, reason: String },
}

impl LedgerError {
    /// Short, stable name of the variant. Used as a metrics label and in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::AccountNotFound(_) => "account_not_found",
            LedgerError::MotionNotFound { .. } => "motion_not_found",
            LedgerError::InvalidConfiguration(_) => "invalid_configuration",
            LedgerError::InvalidDestination(_) => "invalid_destination",
            LedgerError::Unauthorized { .. } => "unauthorized",
            LedgerError::AlreadyVoted { .. } => "already_voted",
            LedgerError::MotionNotActive { .. } => "motion_not_active",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::InvalidAmount => "invalid_amount",
            LedgerError::Overflow { .. } => "overflow",
            LedgerError::ReplayMismatch { .. } => "replay_mismatch",
        }
    }
}
