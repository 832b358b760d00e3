//! # Ledger Reports
//!
//! Flat, printable views of ledger state for `inspect` and `replay`.

use std::collections::BTreeMap;

use joint_ledger::{
    Account, AccountId, Address, Amount, JointLedger, LedgerError, Motion, MotionId, MotionType,
    TokenId, TransferDestination,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct LedgerReport {
    pub account_count: usize,
    pub event_count: usize,
    pub accounts: Vec<AccountReport>,
}

#[derive(Debug, Serialize)]
pub struct AccountReport {
    pub id: AccountId,
    pub members: Vec<Address>,
    pub approval_threshold: usize,
    pub is_static: bool,
    pub is_member_only_deposit: bool,
    pub balances: BTreeMap<TokenId, Amount>,
    pub motions: Vec<MotionReport>,
}

#[derive(Debug, Serialize)]
pub struct MotionReport {
    pub id: MotionId,
    pub motion_type: MotionType,
    pub token_id: TokenId,
    pub amount: Amount,
    pub destination: TransferDestination,
    pub proposer: Address,
    pub voters: Vec<Address>,
    pub vote_count: usize,
    pub active: bool,
}

impl LedgerReport {
    /// Reports every account, or only `account` when given.
    pub fn build(ledger: &JointLedger, account: Option<AccountId>) -> Result<Self, LedgerError> {
        let accounts = match account {
            Some(id) => vec![AccountReport::new(ledger, ledger.account(id)?)],
            None => ledger
                .accounts()
                .map(|a| AccountReport::new(ledger, a))
                .collect(),
        };

        Ok(Self {
            account_count: ledger.account_count(),
            event_count: ledger.journal().len(),
            accounts,
        })
    }
}

impl AccountReport {
    fn new(ledger: &JointLedger, account: &Account) -> Self {
        Self {
            id: account.id(),
            members: account.members().to_vec(),
            approval_threshold: account.approval_threshold(),
            is_static: account.is_static(),
            is_member_only_deposit: account.is_member_only_deposit(),
            balances: account.balances().clone(),
            motions: ledger.motions(account.id()).map(MotionReport::from).collect(),
        }
    }
}

impl From<&Motion> for MotionReport {
    fn from(motion: &Motion) -> Self {
        Self {
            id: motion.id,
            motion_type: motion.motion_type,
            token_id: motion.token_id.clone(),
            amount: motion.amount,
            destination: motion.destination.clone(),
            proposer: motion.proposer.clone(),
            voters: motion.votes().iter().cloned().collect(),
            vote_count: motion.vote_count(),
            active: motion.is_active(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> JointLedger {
        let alice = Address::from("alice");
        let bob = Address::from("bob");
        let token = TokenId::from("TEST");

        let mut ledger = JointLedger::default();
        ledger
            .create_account(&alice, vec![alice.clone(), bob.clone()], 2, true, false)
            .unwrap();
        ledger
            .create_account(&bob, vec![bob.clone()], 1, true, false)
            .unwrap();
        ledger.deposit(0, &token, 100, &alice).unwrap();
        ledger
            .create_transfer_motion(0, &token, 40, None, Some(1), &alice)
            .unwrap();
        ledger
    }

    #[test]
    fn full_report_lists_accounts_and_motions() {
        let report = LedgerReport::build(&ledger(), None).unwrap();
        assert_eq!(report.account_count, 2);
        assert_eq!(report.accounts.len(), 2);

        let shared = &report.accounts[0];
        assert_eq!(shared.balances.get(&TokenId::from("TEST")), Some(&100));
        assert_eq!(shared.motions.len(), 1);
        assert!(shared.motions[0].active);
        assert_eq!(shared.motions[0].voters, vec![Address::from("alice")]);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["accounts"][0]["motions"][0]["destination"]["account"], 1);
    }

    #[test]
    fn single_account_report() {
        let report = LedgerReport::build(&ledger(), Some(1)).unwrap();
        assert_eq!(report.accounts.len(), 1);
        assert_eq!(report.accounts[0].id, 1);

        let missing = LedgerReport::build(&ledger(), Some(7));
        assert!(matches!(missing, Err(LedgerError::AccountNotFound(7))));
    }
}
