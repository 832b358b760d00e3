//! # Joint Ledger
//!
//! The single entry point for both mutating operations and read
//! accessors. Each mutating method is one atomic unit of work: events are
//! staged in a local buffer while the store and motion engine validate and
//! apply, and reach the journal only if the whole operation succeeded.
//!
//! `JointLedger` itself is not synchronized; wrap it in a
//! [`LedgerHandle`](crate::service::LedgerHandle) to share it between
//! threads.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::event::{EventJournal, EventRecord, LedgerEvent};
use crate::motion::{Motion, MotionEngine, VoteOutcome};
use crate::replay;
use crate::store::{Account, LedgerStore};
use crate::types::{AccountId, Address, Amount, MotionId, MotionType, TokenId};

/// Accounts, motions, and the journal of everything that happened to them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointLedger {
    config: LedgerConfig,
    store: LedgerStore,
    motions: MotionEngine,
    journal: EventJournal,
}

impl JointLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Mutating operations
    // -----------------------------------------------------------------------

    /// Creates an account owned jointly by `members`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidConfiguration`] for an empty or
    /// duplicated membership or a threshold outside `1..=members.len()`.
    pub fn create_account(
        &mut self,
        creator: &Address,
        members: Vec<Address>,
        approval_threshold: usize,
        is_static: bool,
        is_member_only_deposit: bool,
    ) -> Result<AccountId, LedgerError> {
        let mut staged = Vec::new();
        let result = self.store.create_account(
            creator,
            members,
            approval_threshold,
            is_static,
            is_member_only_deposit,
            self.config.max_members,
            &mut staged,
        );

        let account_id = self.finish("create_account", result, staged)?;
        info!(account_id, creator = %creator, approval_threshold, "account created");
        Ok(account_id)
    }

    /// Deposits `amount` of `token_id` into an account. Returns the new
    /// balance.
    pub fn deposit(
        &mut self,
        account_id: AccountId,
        token_id: &TokenId,
        amount: Amount,
        from: &Address,
    ) -> Result<Amount, LedgerError> {
        let mut staged = Vec::new();
        let result = self
            .store
            .deposit(account_id, token_id, amount, from, &mut staged);

        let balance = self.finish("deposit", result, staged)?;
        info!(account_id, token_id = %token_id, from = %from, amount, balance, "deposit");
        Ok(balance)
    }

    /// Proposes a transfer of `amount` of `token_id` out of `account_id`.
    ///
    /// Exactly one of `recipient` (external identity) and
    /// `destination_account` (account of this ledger) must be set. See
    /// [`MotionEngine`] for the full validation order. If the proposer's
    /// vote alone meets the approval threshold, the transfer executes
    /// before this returns.
    pub fn create_transfer_motion(
        &mut self,
        account_id: AccountId,
        token_id: &TokenId,
        amount: Amount,
        recipient: Option<Address>,
        destination_account: Option<AccountId>,
        proposer: &Address,
    ) -> Result<MotionId, LedgerError> {
        let mut staged = Vec::new();
        let result = self.motions.create_transfer(
            &mut self.store,
            &self.config,
            account_id,
            token_id,
            amount,
            recipient,
            destination_account,
            proposer,
            &mut staged,
        );

        self.finish("create_transfer_motion", result, staged)
    }

    /// Votes yes on a motion, executing it if quorum is reached.
    pub fn vote_motion(
        &mut self,
        account_id: AccountId,
        motion_id: MotionId,
        voter: &Address,
    ) -> Result<VoteOutcome, LedgerError> {
        let mut staged = Vec::new();
        let result = self
            .motions
            .vote(&mut self.store, account_id, motion_id, voter, &mut staged);

        let outcome = self.finish("vote_motion", result, staged)?;
        info!(
            account_id,
            motion_id,
            voter = %voter,
            vote_count = outcome.vote_count,
            executed = outcome.executed,
            "vote recorded"
        );
        Ok(outcome)
    }

    /// Journals the staged events of a successful operation, or drops them
    /// if it failed.
    fn finish<T>(
        &mut self,
        operation: &'static str,
        result: Result<T, LedgerError>,
        staged: Vec<LedgerEvent>,
    ) -> Result<T, LedgerError> {
        match result {
            Ok(value) => {
                self.journal.commit(staged);
                Ok(value)
            }
            Err(err) => {
                debug!(operation, kind = err.kind(), error = %err, "operation rejected");
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Accounts
    // -----------------------------------------------------------------------

    pub fn account(&self, account_id: AccountId) -> Result<&Account, LedgerError> {
        self.store.account(account_id)
    }

    /// Accounts in id order.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.store.accounts()
    }

    pub fn account_exists(&self, account_id: AccountId) -> bool {
        self.store.contains(account_id)
    }

    pub fn account_count(&self) -> usize {
        self.store.len()
    }

    pub fn is_static(&self, account_id: AccountId) -> Result<bool, LedgerError> {
        Ok(self.store.account(account_id)?.is_static())
    }

    pub fn is_member_only_deposit(&self, account_id: AccountId) -> Result<bool, LedgerError> {
        Ok(self.store.account(account_id)?.is_member_only_deposit())
    }

    pub fn members(&self, account_id: AccountId) -> Result<&[Address], LedgerError> {
        Ok(self.store.account(account_id)?.members())
    }

    pub fn approval_threshold(&self, account_id: AccountId) -> Result<usize, LedgerError> {
        Ok(self.store.account(account_id)?.approval_threshold())
    }

    /// Balance of a token; zero for unknown accounts and tokens.
    pub fn balance_of(&self, account_id: AccountId, token_id: &TokenId) -> Amount {
        self.store.balance_of(account_id, token_id)
    }

    /// Number of accounts `actor` is a member of.
    pub fn num_user_accounts(&self, actor: &Address) -> usize {
        self.store.user_accounts(actor).len()
    }

    /// Accounts `actor` is a member of, in creation order.
    pub fn user_accounts(&self, actor: &Address) -> &[AccountId] {
        self.store.user_accounts(actor)
    }

    // -----------------------------------------------------------------------
    // Motions
    // -----------------------------------------------------------------------

    pub fn motion(
        &self,
        account_id: AccountId,
        motion_id: MotionId,
    ) -> Result<&Motion, LedgerError> {
        self.motions.motion(account_id, motion_id)
    }

    /// Motions of an account in id order.
    pub fn motions(&self, account_id: AccountId) -> impl Iterator<Item = &Motion> {
        self.motions.motions(account_id)
    }

    pub fn motion_exists(&self, account_id: AccountId, motion_id: MotionId) -> bool {
        self.motions.motion_exists(account_id, motion_id)
    }

    /// Number of motions ever created for an account.
    pub fn motion_count(&self, account_id: AccountId) -> MotionId {
        self.motions.motion_count(account_id)
    }

    pub fn motion_type(
        &self,
        account_id: AccountId,
        motion_id: MotionId,
    ) -> Result<MotionType, LedgerError> {
        Ok(self.motion(account_id, motion_id)?.motion_type)
    }

    pub fn vote_count(
        &self,
        account_id: AccountId,
        motion_id: MotionId,
    ) -> Result<usize, LedgerError> {
        Ok(self.motion(account_id, motion_id)?.vote_count())
    }

    pub fn is_motion_active(
        &self,
        account_id: AccountId,
        motion_id: MotionId,
    ) -> Result<bool, LedgerError> {
        Ok(self.motion(account_id, motion_id)?.is_active())
    }

    /// Whether `member` has voted on the motion.
    pub fn voted(
        &self,
        account_id: AccountId,
        motion_id: MotionId,
        member: &Address,
    ) -> Result<bool, LedgerError> {
        Ok(self.motion(account_id, motion_id)?.has_voted(member))
    }

    // -----------------------------------------------------------------------
    // Journal & snapshots
    // -----------------------------------------------------------------------

    pub fn journal(&self) -> &EventJournal {
        &self.journal
    }

    /// Committed records with `sequence >= from`.
    pub fn events_since(&self, from: u64) -> &[EventRecord] {
        self.journal.since(from)
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut LedgerStore, &mut MotionEngine, &mut EventJournal) {
        (&mut self.store, &mut self.motions, &mut self.journal)
    }

    /// Serializes the full ledger, journal included.
    pub fn to_snapshot_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Restores a ledger written by [`to_snapshot_json`](Self::to_snapshot_json).
    ///
    /// The snapshot is trusted as-is; call
    /// [`verify_journal`](Self::verify_journal) to check it against its own
    /// journal.
    pub fn from_snapshot_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Replays the journal onto a fresh ledger and checks that the result
    /// matches this ledger's state.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ReplayMismatch`] if the journal cannot be
    /// replayed or leads to a different state.
    pub fn verify_journal(&self) -> Result<(), LedgerError> {
        let rebuilt = replay::replay(self.journal.records(), self.config.clone())?;
        if rebuilt != *self {
            return Err(LedgerError::ReplayMismatch {
                sequence: self.journal.next_sequence(),
                reason: "replayed state differs from the snapshot".into(),
            });
        }
        Ok(())
    }
}
