//! # Operations
//!
//! A serializable form of the four mutating calls, so that batches of
//! operations can be read from a file or handed to a
//! [`LedgerHandle`](crate::service::LedgerHandle) as plain data.
//!
//! ```json
//! [
//!   { "op": "create_account", "actor": "alice", "members": ["alice", "bob"], "approval_threshold": 2 },
//!   { "op": "deposit", "actor": "alice", "account_id": 0, "token_id": "TEST", "amount": 1000 },
//!   { "op": "create_transfer_motion", "actor": "alice", "account_id": 0, "token_id": "TEST",
//!     "amount": 50, "recipient": "charlie" },
//!   { "op": "vote_motion", "actor": "bob", "account_id": 0, "motion_id": 0 }
//! ]
//! ```

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::ledger::JointLedger;
use crate::types::{AccountId, Address, Amount, MotionId, TokenId};

fn default_static() -> bool {
    true
}

/// One mutating call together with the actor invoking it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    CreateAccount {
        actor: Address,
        members: Vec<Address>,
        approval_threshold: usize,
        #[serde(default = "default_static")]
        is_static: bool,
        #[serde(default)]
        is_member_only_deposit: bool,
    },
    Deposit {
        actor: Address,
        account_id: AccountId,
        token_id: TokenId,
        amount: Amount,
    },
    CreateTransferMotion {
        actor: Address,
        account_id: AccountId,
        token_id: TokenId,
        amount: Amount,
        #[serde(default)]
        recipient: Option<Address>,
        #[serde(default)]
        destination_account: Option<AccountId>,
    },
    VoteMotion {
        actor: Address,
        account_id: AccountId,
        motion_id: MotionId,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateAccount { .. } => "create_account",
            Operation::Deposit { .. } => "deposit",
            Operation::CreateTransferMotion { .. } => "create_transfer_motion",
            Operation::VoteMotion { .. } => "vote_motion",
        }
    }

    pub fn actor(&self) -> &Address {
        match self {
            Operation::CreateAccount { actor, .. }
            | Operation::Deposit { actor, .. }
            | Operation::CreateTransferMotion { actor, .. }
            | Operation::VoteMotion { actor, .. } => actor,
        }
    }
}

/// What a successfully applied [`Operation`] produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OperationOutcome {
    AccountCreated {
        account_id: AccountId,
    },
    Deposited {
        account_id: AccountId,
        balance: Amount,
    },
    MotionCreated {
        account_id: AccountId,
        motion_id: MotionId,
        executed: bool,
    },
    Voted {
        account_id: AccountId,
        motion_id: MotionId,
        vote_count: usize,
        executed: bool,
    },
}

impl OperationOutcome {
    /// `true` if the operation carried out a transfer.
    pub fn executed_transfer(&self) -> bool {
        match self {
            OperationOutcome::MotionCreated { executed, .. }
            | OperationOutcome::Voted { executed, .. } => *executed,
            _ => false,
        }
    }
}

impl JointLedger {
    /// Dispatches an [`Operation`] to the matching method.
    pub fn apply(&mut self, operation: &Operation) -> Result<OperationOutcome, LedgerError> {
        match operation {
            Operation::CreateAccount {
                actor,
                members,
                approval_threshold,
                is_static,
                is_member_only_deposit,
            } => {
                let account_id = self.create_account(
                    actor,
                    members.clone(),
                    *approval_threshold,
                    *is_static,
                    *is_member_only_deposit,
                )?;
                Ok(OperationOutcome::AccountCreated { account_id })
            }

            Operation::Deposit {
                actor,
                account_id,
                token_id,
                amount,
            } => {
                let balance = self.deposit(*account_id, token_id, *amount, actor)?;
                Ok(OperationOutcome::Deposited {
                    account_id: *account_id,
                    balance,
                })
            }

            Operation::CreateTransferMotion {
                actor,
                account_id,
                token_id,
                amount,
                recipient,
                destination_account,
            } => {
                let motion_id = self.create_transfer_motion(
                    *account_id,
                    token_id,
                    *amount,
                    recipient.clone(),
                    *destination_account,
                    actor,
                )?;
                let executed = !self.is_motion_active(*account_id, motion_id)?;
                Ok(OperationOutcome::MotionCreated {
                    account_id: *account_id,
                    motion_id,
                    executed,
                })
            }

            Operation::VoteMotion {
                actor,
                account_id,
                motion_id,
            } => {
                let outcome = self.vote_motion(*account_id, *motion_id, actor)?;
                Ok(OperationOutcome::Voted {
                    account_id: *account_id,
                    motion_id: *motion_id,
                    vote_count: outcome.vote_count,
                    executed: outcome.executed,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"[
        { "op": "create_account", "actor": "alice", "members": ["alice", "bob"], "approval_threshold": 2 },
        { "op": "deposit", "actor": "alice", "account_id": 0, "token_id": "TEST", "amount": 1000 },
        { "op": "create_transfer_motion", "actor": "alice", "account_id": 0, "token_id": "TEST",
          "amount": 50, "recipient": "charlie" },
        { "op": "vote_motion", "actor": "bob", "account_id": 0, "motion_id": 0 }
    ]"#;

    #[test]
    fn script_parses_with_defaults() {
        let ops: Vec<Operation> = serde_json::from_str(SCRIPT).unwrap();
        assert_eq!(ops.len(), 4);
        match &ops[0] {
            Operation::CreateAccount {
                is_static,
                is_member_only_deposit,
                ..
            } => {
                assert!(*is_static);
                assert!(!*is_member_only_deposit);
            }
            other => panic!("unexpected operation {other:?}"),
        }
        assert_eq!(ops[3].actor().as_str(), "bob");
        assert_eq!(ops[3].name(), "vote_motion");
    }

    #[test]
    fn applying_a_script_runs_the_two_member_scenario() {
        let ops: Vec<Operation> = serde_json::from_str(SCRIPT).unwrap();
        let mut ledger = JointLedger::default();
        let outcomes: Vec<_> = ops.iter().map(|op| ledger.apply(op).unwrap()).collect();

        assert_eq!(outcomes[0], OperationOutcome::AccountCreated { account_id: 0 });
        assert_eq!(
            outcomes[2],
            OperationOutcome::MotionCreated {
                account_id: 0,
                motion_id: 0,
                executed: false
            }
        );
        assert!(outcomes[3].executed_transfer());
        assert_eq!(ledger.balance_of(0, &"TEST".into()), 950);
    }

    #[test]
    fn sentinel_fields_parse_as_unset() {
        let json = r#"{ "op": "create_transfer_motion", "actor": "alice", "account_id": 0,
            "token_id": "TEST", "amount": 5,
            "recipient": "0000000000000000000000000000000000000000",
            "destination_account": 1 }"#;
        let op: Operation = serde_json::from_str(json).unwrap();

        let mut ledger = JointLedger::default();
        ledger
            .create_account(&"alice".into(), vec!["alice".into()], 1, true, false)
            .unwrap();
        ledger
            .create_account(&"bob".into(), vec!["bob".into()], 1, true, false)
            .unwrap();
        ledger.deposit(0, &"TEST".into(), 5, &"alice".into()).unwrap();

        let outcome = ledger.apply(&op).unwrap();
        assert!(outcome.executed_transfer());
        assert_eq!(ledger.balance_of(1, &"TEST".into()), 5);
    }
}
