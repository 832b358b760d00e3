//! # Motion Engine
//!
//! Proposals ("motions"), vote bookkeeping, quorum detection, and
//! execution of approved transfers against the [`LedgerStore`].
//!
//! ## Lifecycle
//!
//! 1. **Create**: a member proposes a transfer. The proposer's vote is
//!    recorded immediately.
//! 2. **Vote**: other members add yes votes, one each.
//! 3. **Execute**: the vote that brings the count to the approval
//!    threshold (or the creation itself, for a threshold of 1) debits the
//!    account and credits an internal destination. The motion becomes
//!    inactive and stays around as an inert record.
//!
//! The balance check at creation is advisory: nothing is reserved, so two
//! motions may both be created for the full balance. Only the first to
//! reach quorum can execute; the quorum vote on the second is rejected with
//! [`LedgerError::InsufficientFunds`] and leaves the motion active with its
//! vote count unchanged.
//!
//! Every check that execution depends on runs before the first mutation,
//! so a rejected create or vote never leaves a partial trace.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{LedgerConfig, MemberOnlyScope};
use crate::error::LedgerError;
use crate::event::LedgerEvent;
use crate::store::LedgerStore;
use crate::types::{
    AccountId, Address, Amount, MotionId, MotionType, TokenId, TransferDestination,
};

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

/// A proposal owned by a single account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Motion {
    /// Id within the owning account, starting at 0.
    pub id: MotionId,
    pub account_id: AccountId,
    pub motion_type: MotionType,
    pub token_id: TokenId,
    pub amount: Amount,
    pub destination: TransferDestination,
    pub proposer: Address,
    votes: BTreeSet<Address>,
    vote_count: usize,
    active: bool,
}

impl Motion {
    /// A fresh, active motion with no votes yet.
    pub(crate) fn new(
        id: MotionId,
        account_id: AccountId,
        token_id: TokenId,
        amount: Amount,
        destination: TransferDestination,
        proposer: Address,
    ) -> Self {
        Self {
            id,
            account_id,
            motion_type: MotionType::Transfer,
            token_id,
            amount,
            destination,
            proposer,
            votes: BTreeSet::new(),
            vote_count: 0,
            active: true,
        }
    }

    pub fn votes(&self) -> &BTreeSet<Address> {
        &self.votes
    }

    pub fn vote_count(&self) -> usize {
        self.vote_count
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn has_voted(&self, member: &Address) -> bool {
        self.votes.contains(member)
    }

    pub fn recipient(&self) -> Option<&Address> {
        self.destination.recipient()
    }

    pub fn destination_account(&self) -> Option<AccountId> {
        self.destination.destination_account()
    }

    /// Adds a vote and returns the new count. The caller has checked that
    /// `voter` has not voted yet.
    pub(crate) fn record_vote(&mut self, voter: Address) -> usize {
        if self.votes.insert(voter) {
            self.vote_count += 1;
        }
        self.vote_count
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = false;
    }
}

/// Result of a successful vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub vote_count: usize,
    /// `true` if this vote reached quorum and the transfer executed.
    pub executed: bool,
}

// ---------------------------------------------------------------------------
// MotionEngine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct MotionBook {
    next_motion_id: MotionId,
    motions: BTreeMap<MotionId, Motion>,
}

/// Per-account motion tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionEngine {
    books: BTreeMap<AccountId, MotionBook>,
}

impl MotionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Proposes a transfer out of `account_id`.
    ///
    /// Validation runs in this order: the account exists, the proposer is a
    /// member, the amount is non-zero, exactly one destination is set, an
    /// internal destination exists and may receive the transfer, and the
    /// current balance covers the amount. When the proposer's vote alone
    /// reaches the threshold the transfer executes before this returns.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AccountNotFound`], [`LedgerError::Unauthorized`],
    /// [`LedgerError::InvalidAmount`], [`LedgerError::InvalidDestination`],
    /// [`LedgerError::InsufficientFunds`], or [`LedgerError::Overflow`] if an
    /// immediate execution could not credit the destination. No motion id is
    /// consumed on failure.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create_transfer(
        &mut self,
        store: &mut LedgerStore,
        config: &LedgerConfig,
        account_id: AccountId,
        token_id: &TokenId,
        amount: Amount,
        recipient: Option<Address>,
        destination_account: Option<AccountId>,
        proposer: &Address,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<MotionId, LedgerError> {
        let destination = Self::validate_transfer(
            store,
            config,
            account_id,
            amount,
            recipient,
            destination_account,
            proposer,
        )?;

        // Advisory only: nothing is reserved.
        store.check_debit(account_id, token_id, amount)?;

        let executes_now = store.account(account_id)?.approval_threshold() <= 1;
        if executes_now {
            Self::check_execution(store, account_id, token_id, amount, &destination)?;
        }

        let book = self.books.entry(account_id).or_default();
        let motion_id = book.next_motion_id;
        book.next_motion_id += 1;

        let mut motion = Motion::new(
            motion_id,
            account_id,
            token_id.clone(),
            amount,
            destination.clone(),
            proposer.clone(),
        );
        events.push(LedgerEvent::MotionCreated {
            account_id,
            motion_id,
            motion_type: motion.motion_type,
            token_id: token_id.clone(),
            amount,
            destination,
            proposer: proposer.clone(),
        });

        motion.record_vote(proposer.clone());
        events.push(LedgerEvent::Voted {
            account_id,
            motion_id,
            voter: proposer.clone(),
            vote: true,
        });
        book.motions.insert(motion_id, motion);

        info!(account_id, motion_id, proposer = %proposer, amount, "motion created");

        if executes_now {
            self.execute(store, account_id, motion_id, events)?;
        }

        Ok(motion_id)
    }

    /// The checks a transfer proposal must pass regardless of the current
    /// balance. Shared by live creation and journal replay.
    ///
    /// Returns the validated destination.
    pub(crate) fn validate_transfer(
        store: &LedgerStore,
        config: &LedgerConfig,
        account_id: AccountId,
        amount: Amount,
        recipient: Option<Address>,
        destination_account: Option<AccountId>,
        proposer: &Address,
    ) -> Result<TransferDestination, LedgerError> {
        let account = store.account(account_id)?;

        if !account.is_member(proposer) {
            return Err(LedgerError::Unauthorized {
                actor: proposer.clone(),
                account_id,
            });
        }

        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let destination = TransferDestination::from_parts(recipient, destination_account)?;

        if let TransferDestination::Account(dest_id) = destination {
            if dest_id == account_id {
                return Err(LedgerError::InvalidDestination(format!(
                    "account {account_id} cannot transfer to itself"
                )));
            }
            let dest = store.account(dest_id).map_err(|_| {
                LedgerError::InvalidDestination(format!(
                    "destination account {dest_id} does not exist"
                ))
            })?;
            if config.member_only_scope == MemberOnlyScope::DepositAndInternalTransfers
                && dest.is_member_only_deposit()
                && !dest.is_member(proposer)
            {
                return Err(LedgerError::Unauthorized {
                    actor: proposer.clone(),
                    account_id: dest_id,
                });
            }
        }

        Ok(destination)
    }

    /// Records a yes vote from `voter`, executing the motion if the vote
    /// reaches the approval threshold.
    ///
    /// # Errors
    ///
    /// In check order: [`LedgerError::AccountNotFound`],
    /// [`LedgerError::MotionNotFound`], [`LedgerError::MotionNotActive`],
    /// [`LedgerError::Unauthorized`], [`LedgerError::AlreadyVoted`]. A vote
    /// that would reach quorum on a motion the account can no longer fund
    /// fails with [`LedgerError::InsufficientFunds`] and is not recorded.
    pub(crate) fn vote(
        &mut self,
        store: &mut LedgerStore,
        account_id: AccountId,
        motion_id: MotionId,
        voter: &Address,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<VoteOutcome, LedgerError> {
        let account = store.account(account_id)?;
        let motion = self.motion(account_id, motion_id)?;

        if !motion.is_active() {
            return Err(LedgerError::MotionNotActive {
                account_id,
                motion_id,
            });
        }

        if !account.is_member(voter) {
            return Err(LedgerError::Unauthorized {
                actor: voter.clone(),
                account_id,
            });
        }

        if motion.has_voted(voter) {
            return Err(LedgerError::AlreadyVoted {
                account_id,
                motion_id,
                voter: voter.clone(),
            });
        }

        let reaches_quorum = motion.vote_count() + 1 >= account.approval_threshold();
        if reaches_quorum {
            if let Err(err) = Self::check_execution(
                store,
                account_id,
                &motion.token_id,
                motion.amount,
                &motion.destination,
            ) {
                warn!(
                    account_id,
                    motion_id,
                    voter = %voter,
                    error = %err,
                    "quorum vote cannot be funded"
                );
                return Err(err);
            }
        }

        let motion = self.motion_mut(account_id, motion_id)?;
        let vote_count = motion.record_vote(voter.clone());
        events.push(LedgerEvent::Voted {
            account_id,
            motion_id,
            voter: voter.clone(),
            vote: true,
        });

        if reaches_quorum {
            self.execute(store, account_id, motion_id, events)?;
        }

        Ok(VoteOutcome {
            vote_count,
            executed: reaches_quorum,
        })
    }

    /// Fails exactly when [`execute`](Self::execute) would.
    fn check_execution(
        store: &LedgerStore,
        account_id: AccountId,
        token_id: &TokenId,
        amount: Amount,
        destination: &TransferDestination,
    ) -> Result<(), LedgerError> {
        store.check_debit(account_id, token_id, amount)?;
        if let TransferDestination::Account(dest_id) = destination {
            store.check_credit(*dest_id, token_id, amount)?;
        }
        Ok(())
    }

    /// Carries out an approved transfer. Callers run
    /// [`check_execution`](Self::check_execution) first.
    fn execute(
        &mut self,
        store: &mut LedgerStore,
        account_id: AccountId,
        motion_id: MotionId,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<(), LedgerError> {
        let motion = self.motion_mut(account_id, motion_id)?;

        store.debit(account_id, &motion.token_id, motion.amount)?;
        if let TransferDestination::Account(dest_id) = motion.destination {
            store.credit(dest_id, &motion.token_id, motion.amount)?;
        }
        motion.deactivate();

        info!(
            account_id,
            motion_id,
            destination = %motion.destination,
            amount = motion.amount,
            "transfer executed"
        );

        events.push(LedgerEvent::TransferExecuted {
            account_id,
            motion_id,
            token_id: motion.token_id.clone(),
            destination: motion.destination.clone(),
            amount: motion.amount,
        });

        Ok(())
    }

    pub fn motion(
        &self,
        account_id: AccountId,
        motion_id: MotionId,
    ) -> Result<&Motion, LedgerError> {
        self.books
            .get(&account_id)
            .and_then(|book| book.motions.get(&motion_id))
            .ok_or(LedgerError::MotionNotFound {
                account_id,
                motion_id,
            })
    }

    pub(crate) fn motion_mut(
        &mut self,
        account_id: AccountId,
        motion_id: MotionId,
    ) -> Result<&mut Motion, LedgerError> {
        self.books
            .get_mut(&account_id)
            .and_then(|book| book.motions.get_mut(&motion_id))
            .ok_or(LedgerError::MotionNotFound {
                account_id,
                motion_id,
            })
    }

    pub fn motion_exists(&self, account_id: AccountId, motion_id: MotionId) -> bool {
        self.motion(account_id, motion_id).is_ok()
    }

    /// Number of motions ever created for the account, which is also the id
    /// the next one will receive.
    pub fn motion_count(&self, account_id: AccountId) -> MotionId {
        self.books
            .get(&account_id)
            .map(|book| book.next_motion_id)
            .unwrap_or(0)
    }

    /// Motions of an account in id order.
    pub fn motions(&self, account_id: AccountId) -> impl Iterator<Item = &Motion> {
        self.books
            .get(&account_id)
            .into_iter()
            .flat_map(|book| book.motions.values())
    }

    /// Stores a motion under the next id of its account. Used by replay,
    /// which has already matched `motion.id` against
    /// [`motion_count`](Self::motion_count).
    pub(crate) fn restore_motion(&mut self, motion: Motion) {
        let book = self.books.entry(motion.account_id).or_default();
        book.next_motion_id = motion.id + 1;
        book.motions.insert(motion.id, motion);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "TEST";

    struct Fixture {
        store: LedgerStore,
        engine: MotionEngine,
        config: LedgerConfig,
        events: Vec<LedgerEvent>,
    }

    impl Fixture {
        /// Account 0 with members alice and bob, funded with `balance`.
        fn new(threshold: usize, balance: Amount) -> Self {
            let mut store = LedgerStore::new();
            let mut events = Vec::new();
            let id = store
                .create_account(
                    &"alice".into(),
                    vec!["alice".into(), "bob".into()],
                    threshold,
                    true,
                    false,
                    16,
                    &mut events,
                )
                .unwrap();
            if balance > 0 {
                store
                    .deposit(id, &TOKEN.into(), balance, &"alice".into(), &mut events)
                    .unwrap();
            }
            events.clear();
            Self {
                store,
                engine: MotionEngine::new(),
                config: LedgerConfig::default(),
                events,
            }
        }

        fn propose(&mut self, amount: Amount, recipient: &str) -> Result<MotionId, LedgerError> {
            self.engine.create_transfer(
                &mut self.store,
                &self.config,
                0,
                &TOKEN.into(),
                amount,
                Some(recipient.into()),
                None,
                &"alice".into(),
                &mut self.events,
            )
        }

        fn vote(&mut self, motion_id: MotionId, voter: &str) -> Result<VoteOutcome, LedgerError> {
            self.engine
                .vote(&mut self.store, 0, motion_id, &voter.into(), &mut self.events)
        }
    }

    #[test]
    fn proposer_vote_is_counted() {
        let mut f = Fixture::new(2, 1_000);
        let id = f.propose(50, "charlie").unwrap();
        let motion = f.engine.motion(0, id).unwrap();
        assert_eq!(motion.vote_count(), 1);
        assert!(motion.has_voted(&"alice".into()));
        assert!(motion.is_active());
        assert_eq!(f.events.len(), 2);
    }

    #[test]
    fn quorum_vote_executes() {
        let mut f = Fixture::new(2, 1_000);
        let id = f.propose(50, "charlie").unwrap();
        let outcome = f.vote(id, "bob").unwrap();
        assert_eq!(outcome, VoteOutcome { vote_count: 2, executed: true });
        assert!(!f.engine.motion(0, id).unwrap().is_active());
        assert_eq!(f.store.balance_of(0, &TOKEN.into()), 950);
        assert_eq!(f.events.last().unwrap().name(), "TransferExecuted");
    }

    #[test]
    fn threshold_one_executes_on_creation() {
        let mut f = Fixture::new(1, 1_000);
        let id = f.propose(50, "charlie").unwrap();
        assert!(!f.engine.motion(0, id).unwrap().is_active());
        let names: Vec<_> = f.events.iter().map(LedgerEvent::name).collect();
        assert_eq!(names, vec!["MotionCreated", "Voted", "TransferExecuted"]);
    }

    #[test]
    fn over_balance_creation_consumes_no_id() {
        let mut f = Fixture::new(2, 100);
        assert!(matches!(
            f.propose(101, "charlie"),
            Err(LedgerError::InsufficientFunds { .. })
        ));
        assert_eq!(f.engine.motion_count(0), 0);
        assert_eq!(f.propose(100, "charlie").unwrap(), 0);
    }

    #[test]
    fn non_member_cannot_propose_or_vote() {
        let mut f = Fixture::new(2, 100);
        let result = f.engine.create_transfer(
            &mut f.store,
            &f.config,
            0,
            &TOKEN.into(),
            10,
            Some("charlie".into()),
            None,
            &"mallory".into(),
            &mut f.events,
        );
        assert!(matches!(result, Err(LedgerError::Unauthorized { .. })));

        let id = f.propose(10, "charlie").unwrap();
        assert!(matches!(
            f.vote(id, "mallory"),
            Err(LedgerError::Unauthorized { .. })
        ));
    }

    #[test]
    fn revote_rejected() {
        let mut f = Fixture::new(2, 100);
        let id = f.propose(10, "charlie").unwrap();
        assert!(matches!(
            f.vote(id, "alice"),
            Err(LedgerError::AlreadyVoted { .. })
        ));
        assert_eq!(f.engine.motion(0, id).unwrap().vote_count(), 1);
    }

    #[test]
    fn executed_motion_rejects_votes() {
        let mut f = Fixture::new(1, 100);
        let id = f.propose(10, "charlie").unwrap();
        assert_eq!(
            f.vote(id, "bob"),
            Err(LedgerError::MotionNotActive { account_id: 0, motion_id: id })
        );
    }

    #[test]
    fn unfunded_quorum_vote_is_not_recorded() {
        let mut f = Fixture::new(2, 1_000);
        let first = f.propose(1_000, "charlie").unwrap();
        let second = f.propose(1_000, "dave").unwrap();
        f.vote(first, "bob").unwrap();
        let before = f.events.len();

        assert!(matches!(
            f.vote(second, "bob"),
            Err(LedgerError::InsufficientFunds { available: 0, .. })
        ));
        let motion = f.engine.motion(0, second).unwrap();
        assert!(motion.is_active());
        assert_eq!(motion.vote_count(), 1);
        assert!(!motion.has_voted(&"bob".into()));
        assert_eq!(f.events.len(), before);
    }

    #[test]
    fn missing_motion_reported() {
        let mut f = Fixture::new(2, 100);
        assert_eq!(
            f.vote(7, "bob"),
            Err(LedgerError::MotionNotFound { account_id: 0, motion_id: 7 })
        );
    }
}
