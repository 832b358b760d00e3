//! # Ledger Configuration & Constants
//!
//! Sentinel values, limits, and the runtime policy knobs of a ledger.
//! Constants that callers may need to put on the wire (the "unset"
//! sentinels) live here so every crate agrees on them.

use serde::{Deserialize, Serialize};

use crate::types::AccountId;

// ---------------------------------------------------------------------------
// Sentinels
// ---------------------------------------------------------------------------

/// The "unset" external recipient. A transfer whose recipient equals this
/// value has no external recipient.
pub const NULL_ADDRESS: &str = "0000000000000000000000000000000000000000";

/// The "unset" internal destination account.
pub const NULL_ACCOUNT_ID: AccountId = AccountId::MAX;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Default upper bound on the membership of a single account. Keeps vote
/// bookkeeping and membership checks bounded.
pub const DEFAULT_MAX_MEMBERS: usize = 256;

/// Capacity of the broadcast channel that fans committed events out to
/// subscribers of a [`LedgerHandle`](crate::service::LedgerHandle).
/// Subscribers that fall further behind than this miss records.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// How far the `is_member_only_deposit` flag of an account reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberOnlyScope {
    /// Only direct deposits are restricted to members.
    #[default]
    DepositOnly,
    /// Internal transfers into the account are restricted too: the
    /// proposer of the transfer must also be a member of the destination.
    DepositAndInternalTransfers,
}

/// Runtime configuration of a [`JointLedger`](crate::JointLedger).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Maximum number of members an account may be created with.
    pub max_members: usize,
    /// Enforcement scope of member-only deposit accounts.
    pub member_only_scope: MemberOnlyScope,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_members: DEFAULT_MAX_MEMBERS,
            member_only_scope: MemberOnlyScope::DepositOnly,
        }
    }
}

impl LedgerConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
