//! # Journal Replay
//!
//! Rebuilds a [`JointLedger`] from its event journal. Events are applied
//! directly, without re-running the operations that produced them, but
//! every event is still checked against the state built so far: an event
//! that could not have been committed by a live ledger (wrong sequence,
//! unknown account, vote by a non-member, execution before quorum, a
//! balance going negative) aborts the replay.

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::event::{EventRecord, LedgerEvent};
use crate::ledger::JointLedger;
use crate::motion::{Motion, MotionEngine};
use crate::store::LedgerStore;
use crate::types::TransferDestination;

/// Replays `records` from genesis onto an empty ledger.
///
/// # Errors
///
/// Returns [`LedgerError::ReplayMismatch`] naming the first record that
/// does not apply cleanly.
pub fn replay(records: &[EventRecord], config: LedgerConfig) -> Result<JointLedger, LedgerError> {
    let mut ledger = JointLedger::new(config.clone());

    for record in records {
        let (store, motions, journal) = ledger.parts_mut();
        let sequence = record.sequence;

        if sequence != journal.next_sequence() {
            return Err(mismatch(
                sequence,
                format!("expected sequence {}", journal.next_sequence()),
            ));
        }

        apply(store, motions, &config, sequence, &record.event).map_err(|err| match err {
            LedgerError::ReplayMismatch { .. } => err,
            other => mismatch(sequence, format!("{} rejected: {other}", record.event.name())),
        })?;

        journal.restore(record.clone());
    }

    Ok(ledger)
}

fn mismatch(sequence: u64, reason: impl Into<String>) -> LedgerError {
    LedgerError::ReplayMismatch {
        sequence,
        reason: reason.into(),
    }
}

fn apply(
    store: &mut LedgerStore,
    motions: &mut MotionEngine,
    config: &LedgerConfig,
    sequence: u64,
    event: &LedgerEvent,
) -> Result<(), LedgerError> {
    match event {
        LedgerEvent::AccountCreated {
            account_id,
            members,
            approval_threshold,
            is_static,
            is_member_only_deposit,
            ..
        } => {
            if *account_id != store.next_account_id() {
                return Err(mismatch(
                    sequence,
                    format!("expected account id {}", store.next_account_id()),
                ));
            }
            LedgerStore::validate_account_config(
                members,
                *approval_threshold,
                Some(config.max_members),
            )?;
            store.insert_account(
                members.clone(),
                *approval_threshold,
                *is_static,
                *is_member_only_deposit,
            );
        }

        LedgerEvent::Deposited {
            account_id,
            token_id,
            from,
            amount,
        } => {
            store.deposit(*account_id, token_id, *amount, from, &mut Vec::new())?;
        }

        LedgerEvent::MotionCreated {
            account_id,
            motion_id,
            token_id,
            amount,
            destination,
            proposer,
            ..
        } => {
            MotionEngine::validate_transfer(
                store,
                config,
                *account_id,
                *amount,
                destination.recipient().cloned(),
                destination.destination_account(),
                proposer,
            )?;
            if *motion_id != motions.motion_count(*account_id) {
                return Err(mismatch(
                    sequence,
                    format!("expected motion id {}", motions.motion_count(*account_id)),
                ));
            }
            motions.restore_motion(Motion::new(
                *motion_id,
                *account_id,
                token_id.clone(),
                *amount,
                destination.clone(),
                proposer.clone(),
            ));
        }

        LedgerEvent::Voted {
            account_id,
            motion_id,
            voter,
            vote,
        } => {
            if !vote {
                return Err(mismatch(sequence, "only yes votes are recorded"));
            }
            let account = store.account(*account_id)?;
            let motion = motions.motion_mut(*account_id, *motion_id)?;
            if !motion.is_active() {
                return Err(LedgerError::MotionNotActive {
                    account_id: *account_id,
                    motion_id: *motion_id,
                });
            }
            if !account.is_member(voter) {
                return Err(LedgerError::Unauthorized {
                    actor: voter.clone(),
                    account_id: *account_id,
                });
            }
            if motion.has_voted(voter) {
                return Err(LedgerError::AlreadyVoted {
                    account_id: *account_id,
                    motion_id: *motion_id,
                    voter: voter.clone(),
                });
            }
            motion.record_vote(voter.clone());
        }

        LedgerEvent::TransferExecuted {
            account_id,
            motion_id,
            token_id,
            destination,
            amount,
        } => {
            let threshold = store.account(*account_id)?.approval_threshold();
            let motion = motions.motion_mut(*account_id, *motion_id)?;
            if !motion.is_active() {
                return Err(LedgerError::MotionNotActive {
                    account_id: *account_id,
                    motion_id: *motion_id,
                });
            }
            if motion.token_id != *token_id
                || motion.amount != *amount
                || motion.destination != *destination
            {
                return Err(mismatch(sequence, "execution does not match its motion"));
            }
            if motion.vote_count() < threshold {
                return Err(mismatch(
                    sequence,
                    format!(
                        "executed with {} of {threshold} votes",
                        motion.vote_count()
                    ),
                ));
            }

            store.debit(*account_id, token_id, *amount)?;
            if let TransferDestination::Account(dest_id) = destination {
                store.credit(*dest_id, token_id, *amount)?;
            }
            motion.deactivate();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemberOnlyScope;
    use crate::types::{Address, Amount, TokenId};

    fn sample_ledger() -> JointLedger {
        let token = TokenId::from("TEST");
        let alice = Address::from("alice");
        let bob = Address::from("bob");

        let mut ledger = JointLedger::default();
        let shared = ledger
            .create_account(&alice, vec![alice.clone(), bob.clone()], 2, true, false)
            .unwrap();
        let solo = ledger
            .create_account(&bob, vec![bob.clone()], 1, true, true)
            .unwrap();
        ledger.deposit(shared, &token, 1_000, &alice).unwrap();

        let to_solo = ledger
            .create_transfer_motion(shared, &token, 400, None, Some(solo), &alice)
            .unwrap();
        ledger
            .create_transfer_motion(shared, &token, 100, Some("carol".into()), None, &bob)
            .unwrap();
        ledger.vote_motion(shared, to_solo, &bob).unwrap();
        ledger
            .create_transfer_motion(solo, &token, 50, Some("dave".into()), None, &bob)
            .unwrap();
        ledger
    }

    #[test]
    fn replay_rebuilds_identical_state() {
        let ledger = sample_ledger();
        let rebuilt = replay(ledger.journal().records(), LedgerConfig::default()).unwrap();
        assert_eq!(rebuilt, ledger);
        assert_eq!(rebuilt.balance_of(1, &"TEST".into()), 350);
        assert!(ledger.verify_journal().is_ok());
    }

    #[test]
    fn empty_journal_replays_to_empty_ledger() {
        let rebuilt = replay(&[], LedgerConfig::default()).unwrap();
        assert_eq!(rebuilt, JointLedger::default());
    }

    #[test]
    fn sequence_gap_rejected() {
        let ledger = sample_ledger();
        let mut records = ledger.journal().records().to_vec();
        records.remove(1);
        let err = replay(&records, LedgerConfig::default()).unwrap_err();
        assert!(matches!(err, LedgerError::ReplayMismatch { sequence: 2, .. }));
    }

    #[test]
    fn forged_overdraft_rejected() {
        let ledger = sample_ledger();
        let mut records = ledger.journal().records().to_vec();
        // Shrink the deposit so the later execution overdraws.
        for record in &mut records {
            if let LedgerEvent::Deposited { amount, .. } = &mut record.event {
                *amount = 10;
            }
        }
        let err = replay(&records, LedgerConfig::default()).unwrap_err();
        match err {
            LedgerError::ReplayMismatch { reason, .. } => {
                assert!(reason.contains("insufficient funds"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn forged_motion_rejected() {
        let ledger = sample_ledger();
        let forgeries: [fn(&mut Amount, &mut TransferDestination, &mut Address); 4] = [
            |_, destination, _| *destination = TransferDestination::Account(99),
            |amount, _, _| *amount = 0,
            |_, destination, _| *destination = TransferDestination::Account(0),
            |_, _, proposer| *proposer = "mallory".into(),
        ];

        for forge in forgeries {
            let mut records = ledger.journal().records().to_vec();
            let created = records
                .iter_mut()
                .find_map(|r| match &mut r.event {
                    LedgerEvent::MotionCreated {
                        account_id: 0,
                        amount,
                        destination,
                        proposer,
                        ..
                    } => Some((amount, destination, proposer)),
                    _ => None,
                })
                .unwrap();
            forge(created.0, created.1, created.2);

            let err = replay(&records, LedgerConfig::default()).unwrap_err();
            match err {
                LedgerError::ReplayMismatch { reason, .. } => {
                    assert!(reason.starts_with("MotionCreated rejected"), "{reason}");
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn member_only_scope_applies_on_replay() {
        let alice = Address::from("alice");
        let bob = Address::from("bob");
        let token = TokenId::from("TEST");

        let mut ledger = JointLedger::default();
        ledger
            .create_account(&alice, vec![alice.clone()], 1, true, false)
            .unwrap();
        ledger
            .create_account(&bob, vec![bob.clone()], 1, true, true)
            .unwrap();
        ledger.deposit(0, &token, 10, &alice).unwrap();
        ledger
            .create_transfer_motion(0, &token, 10, None, Some(1), &alice)
            .unwrap();

        let strict = LedgerConfig {
            member_only_scope: MemberOnlyScope::DepositAndInternalTransfers,
            ..LedgerConfig::default()
        };
        assert!(replay(ledger.journal().records(), LedgerConfig::default()).is_ok());
        assert!(matches!(
            replay(ledger.journal().records(), strict),
            Err(LedgerError::ReplayMismatch { sequence: 3, .. })
        ));
    }

    #[test]
    fn execution_before_quorum_rejected() {
        let ledger = sample_ledger();
        let mut records = ledger.journal().records().to_vec();
        // Drop bob's quorum vote on motion 0 and renumber.
        let bob_vote = records
            .iter()
            .position(|r| {
                matches!(
                    &r.event,
                    LedgerEvent::Voted { account_id: 0, motion_id: 0, voter, .. } if voter.as_str() == "bob"
                )
            })
            .unwrap();
        records.remove(bob_vote);
        for (i, record) in records.iter_mut().enumerate() {
            record.sequence = i as u64;
        }
        let err = replay(&records, LedgerConfig::default()).unwrap_err();
        match err {
            LedgerError::ReplayMismatch { reason, .. } => {
                assert!(reason.contains("votes"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn tampered_snapshot_fails_verification() {
        let ledger = sample_ledger();
        let json = ledger.to_snapshot_json().unwrap();
        let tampered = json.replacen("\"TEST\": 350", "\"TEST\": 9999", 1);
        assert_ne!(json, tampered);
        let restored = JointLedger::from_snapshot_json(&tampered).unwrap();
        assert!(matches!(
            restored.verify_journal(),
            Err(LedgerError::ReplayMismatch { .. })
        ));
    }
}
