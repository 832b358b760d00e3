//! # Ledger Store
//!
//! The authoritative registry of joint accounts and their per-token
//! balances. The store knows nothing about motions; the motion engine
//! drives [`LedgerStore::debit`] and [`LedgerStore::credit`] when an
//! approved transfer executes.
//!
//! ## Invariants
//!
//! 1. Account ids come from a monotonic counter and are never reused.
//! 2. `1 <= approval_threshold <= members.len()` for every account.
//! 3. Balances are only written by `deposit`, `credit`, and `debit`, all of
//!    which use checked arithmetic and leave the balance untouched on error.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LedgerError;
use crate::event::LedgerEvent;
use crate::types::{AccountId, Address, Amount, TokenId};

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// A jointly controlled account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    members: Vec<Address>,
    approval_threshold: usize,
    is_static: bool,
    is_member_only_deposit: bool,
    balances: BTreeMap<TokenId, Amount>,
}

impl Account {
    pub fn id(&self) -> AccountId {
        self.id
    }

    /// Members in the order they were given at creation.
    pub fn members(&self) -> &[Address] {
        &self.members
    }

    pub fn approval_threshold(&self) -> usize {
        self.approval_threshold
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn is_member_only_deposit(&self) -> bool {
        self.is_member_only_deposit
    }

    pub fn is_member(&self, actor: &Address) -> bool {
        self.members.contains(actor)
    }

    /// Balance of `token_id`, zero if the account never held it.
    pub fn balance_of(&self, token_id: &TokenId) -> Amount {
        self.balances.get(token_id).copied().unwrap_or(0)
    }

    pub fn balances(&self) -> &BTreeMap<TokenId, Amount> {
        &self.balances
    }
}

// ---------------------------------------------------------------------------
// LedgerStore
// ---------------------------------------------------------------------------

/// Account registry and balance ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStore {
    accounts: BTreeMap<AccountId, Account>,
    next_account_id: AccountId,
    /// Reverse index: identity -> accounts it is a member of, in creation order.
    user_accounts: BTreeMap<Address, Vec<AccountId>>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks the membership and threshold of a prospective account.
    ///
    /// `max_members` is skipped when `None` (used by replay, which must
    /// accept whatever limit was in force when the journal was written).
    pub(crate) fn validate_account_config(
        members: &[Address],
        approval_threshold: usize,
        max_members: Option<usize>,
    ) -> Result<(), LedgerError> {
        if members.is_empty() {
            return Err(LedgerError::InvalidConfiguration(
                "an account needs at least one member".into(),
            ));
        }

        if let Some(max) = max_members {
            if members.len() > max {
                return Err(LedgerError::InvalidConfiguration(format!(
                    "{} members exceeds the limit of {max}",
                    members.len()
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for member in members {
            if member.is_null() {
                return Err(LedgerError::InvalidConfiguration(
                    "the null address cannot be a member".into(),
                ));
            }
            if !seen.insert(member) {
                return Err(LedgerError::InvalidConfiguration(format!(
                    "duplicate member {member}"
                )));
            }
        }

        if approval_threshold == 0 || approval_threshold > members.len() {
            return Err(LedgerError::InvalidConfiguration(format!(
                "approval threshold {approval_threshold} is outside 1..={}",
                members.len()
            )));
        }

        Ok(())
    }

    /// Registers a new account with all balances at zero.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidConfiguration`] if the membership is
    /// empty, duplicated, or larger than `max_members`, or if the threshold
    /// is outside `1..=members.len()`. No id is consumed on failure.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create_account(
        &mut self,
        creator: &Address,
        members: Vec<Address>,
        approval_threshold: usize,
        is_static: bool,
        is_member_only_deposit: bool,
        max_members: usize,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<AccountId, LedgerError> {
        Self::validate_account_config(&members, approval_threshold, Some(max_members))?;

        let account_id = self.insert_account(
            members.clone(),
            approval_threshold,
            is_static,
            is_member_only_deposit,
        );

        events.push(LedgerEvent::AccountCreated {
            account_id,
            creator: creator.clone(),
            members,
            approval_threshold,
            is_static,
            is_member_only_deposit,
        });

        Ok(account_id)
    }

    /// Allocates the next id and stores an already validated account.
    pub(crate) fn insert_account(
        &mut self,
        members: Vec<Address>,
        approval_threshold: usize,
        is_static: bool,
        is_member_only_deposit: bool,
    ) -> AccountId {
        let account_id = self.next_account_id;
        self.next_account_id += 1;

        for member in &members {
            self.user_accounts
                .entry(member.clone())
                .or_default()
                .push(account_id);
        }

        self.accounts.insert(
            account_id,
            Account {
                id: account_id,
                members,
                approval_threshold,
                is_static,
                is_member_only_deposit,
                balances: BTreeMap::new(),
            },
        );

        account_id
    }

    /// Adds `amount` of `token_id` to an account from an outside identity.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AccountNotFound`] if the account does not exist.
    /// - [`LedgerError::InvalidAmount`] if `amount` is zero.
    /// - [`LedgerError::Unauthorized`] if the account only accepts member
    ///   deposits and `from` is not a member.
    /// - [`LedgerError::Overflow`] if the balance would exceed `u64::MAX`.
    pub(crate) fn deposit(
        &mut self,
        account_id: AccountId,
        token_id: &TokenId,
        amount: Amount,
        from: &Address,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<Amount, LedgerError> {
        let account = self.account(account_id)?;

        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        if account.is_member_only_deposit && !account.is_member(from) {
            debug!(account_id, from = %from, "non-member deposit refused");
            return Err(LedgerError::Unauthorized {
                actor: from.clone(),
                account_id,
            });
        }

        let balance = self.credit(account_id, token_id, amount)?;

        events.push(LedgerEvent::Deposited {
            account_id,
            token_id: token_id.clone(),
            from: from.clone(),
            amount,
        });

        Ok(balance)
    }

    /// Fails exactly when [`debit`](Self::debit) with the same arguments would.
    pub(crate) fn check_debit(
        &self,
        account_id: AccountId,
        token_id: &TokenId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let available = self.account(account_id)?.balance_of(token_id);
        if amount > available {
            return Err(LedgerError::InsufficientFunds {
                account_id,
                token_id: token_id.clone(),
                available,
                requested: amount,
            });
        }
        Ok(())
    }

    /// Fails exactly when [`credit`](Self::credit) with the same arguments would.
    pub(crate) fn check_credit(
        &self,
        account_id: AccountId,
        token_id: &TokenId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let current = self.account(account_id)?.balance_of(token_id);
        current.checked_add(amount).ok_or(LedgerError::Overflow {
            account_id,
            token_id: token_id.clone(),
            current,
            credit: amount,
        })?;
        Ok(())
    }

    /// Adds to a balance. Returns the new balance. The balance is untouched
    /// on error.
    pub(crate) fn credit(
        &mut self,
        account_id: AccountId,
        token_id: &TokenId,
        amount: Amount,
    ) -> Result<Amount, LedgerError> {
        let account = self
            .accounts
            .get_mut(&account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?;

        let current = account.balance_of(token_id);
        let updated = current.checked_add(amount).ok_or(LedgerError::Overflow {
            account_id,
            token_id: token_id.clone(),
            current,
            credit: amount,
        })?;

        account.balances.insert(token_id.clone(), updated);
        Ok(updated)
    }

    /// Subtracts from a balance. Returns the new balance. The balance is
    /// untouched on error.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientFunds`] if `amount` exceeds the
    /// current balance.
    pub(crate) fn debit(
        &mut self,
        account_id: AccountId,
        token_id: &TokenId,
        amount: Amount,
    ) -> Result<Amount, LedgerError> {
        let account = self
            .accounts
            .get_mut(&account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?;

        let available = account.balance_of(token_id);
        let updated = available
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientFunds {
                account_id,
                token_id: token_id.clone(),
                available,
                requested: amount,
            })?;

        account.balances.insert(token_id.clone(), updated);
        Ok(updated)
    }

    pub fn account(&self, account_id: AccountId) -> Result<&Account, LedgerError> {
        self.accounts
            .get(&account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    pub fn contains(&self, account_id: AccountId) -> bool {
        self.accounts.contains_key(&account_id)
    }

    /// Balance of `token_id` in an account; zero for unknown accounts.
    pub fn balance_of(&self, account_id: AccountId, token_id: &TokenId) -> Amount {
        self.accounts
            .get(&account_id)
            .map(|a| a.balance_of(token_id))
            .unwrap_or(0)
    }

    /// Accounts in id order.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Id the next created account will receive.
    pub fn next_account_id(&self) -> AccountId {
        self.next_account_id
    }

    /// Accounts `actor` is a member of, in creation order.
    pub fn user_accounts(&self, actor: &Address) -> &[AccountId] {
        self.user_accounts
            .get(actor)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
