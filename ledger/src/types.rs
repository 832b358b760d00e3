//! # Ledger Identifiers & Transfer Destinations
//!
//! Plain identifier types shared by the store and the motion engine.
//! Account and motion ids are sequential integers handed out by monotonic
//! counters; identities and tokens are opaque strings. The caller is
//! responsible for authenticating an [`Address`] before it reaches the
//! ledger.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{NULL_ACCOUNT_ID, NULL_ADDRESS};
use crate::error::LedgerError;

/// Sequential account identifier. Never reused.
pub type AccountId = u64;

/// Sequential motion identifier, scoped to its owning account.
pub type MotionId = u64;

/// Token quantity in the smallest denomination.
pub type Amount = u64;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// An actor identity: a member, a depositor, or an external recipient.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The reserved "unset" address.
    pub fn null() -> Self {
        Self(NULL_ADDRESS.to_string())
    }

    /// Returns `true` for the reserved sentinel and for the empty string.
    pub fn is_null(&self) -> bool {
        self.0.is_empty() || self.0 == NULL_ADDRESS
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// TokenId
// ---------------------------------------------------------------------------

/// Identifier of a fungible token held in account balances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TokenId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TokenId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// MotionType
// ---------------------------------------------------------------------------

/// The kind of action a motion performs once it reaches quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionType {
    /// Move tokens out of the account, to an external identity or to
    /// another account in the same ledger.
    Transfer,
}

impl fmt::Display for MotionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionType::Transfer => write!(f, "Transfer"),
        }
    }
}

// ---------------------------------------------------------------------------
// TransferDestination
// ---------------------------------------------------------------------------

/// Where the funds of a transfer motion go.
///
/// At the API boundary a transfer names two optional fields, an external
/// recipient and an internal destination account, of which exactly one
/// must be set. [`TransferDestination::from_parts`] performs that check
/// once, so the rest of the crate only ever sees a valid destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDestination {
    /// An identity outside the ledger. Settlement happens off-ledger.
    External(Address),
    /// Another account of this ledger, credited on execution.
    Account(AccountId),
}

impl TransferDestination {
    /// Builds a destination from the two raw fields.
    ///
    /// `None`, the null address, and [`NULL_ACCOUNT_ID`] all count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidDestination`] when both or neither
    /// field is set.
    pub fn from_parts(
        recipient: Option<Address>,
        destination_account: Option<AccountId>,
    ) -> Result<Self, LedgerError> {
        let recipient = recipient.filter(|r| !r.is_null());
        let destination_account = destination_account.filter(|id| *id != NULL_ACCOUNT_ID);

        match (recipient, destination_account) {
            (Some(recipient), None) => Ok(TransferDestination::External(recipient)),
            (None, Some(account_id)) => Ok(TransferDestination::Account(account_id)),
            (Some(_), Some(_)) => Err(LedgerError::InvalidDestination(
                "both an external recipient and a destination account were given".into(),
            )),
            (None, None) => Err(LedgerError::InvalidDestination(
                "neither an external recipient nor a destination account was given".into(),
            )),
        }
    }

    pub fn recipient(&self) -> Option<&Address> {
        match self {
            TransferDestination::External(recipient) => Some(recipient),
            TransferDestination::Account(_) => None,
        }
    }

    pub fn destination_account(&self) -> Option<AccountId> {
        match self {
            TransferDestination::External(_) => None,
            TransferDestination::Account(id) => Some(*id),
        }
    }
}

impl fmt::Display for TransferDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferDestination::External(recipient) => write!(f, "external:{recipient}"),
            TransferDestination::Account(id) => write!(f, "account:{id}"),
        }
    }
}
