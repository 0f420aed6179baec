//! End-to-end pool scenarios against the simulated ledger

use farm_engine::helpers::audit;
use farm_engine::{Amount, Command, Envelope, FarmError, FarmEvent, Receipt, UserState};
use farm_integration_tests::{addr, Harness, LEDGER, OWNER};

const E18: Amount = 1_000_000_000_000_000_000;

fn assert_sound(h: &Harness) {
    let violations = audit(&h.pool);
    assert!(violations.is_empty(), "violated: {:?}", violations);
    assert!(h.payouts_conserved());
}

#[test]
fn test_single_staker_earns_rate_times_elapsed() {
    let alice = addr(1);
    let mut h = Harness::new(&[1], 0, 0);
    h.fund(0, 1_000).unwrap();
    h.deposit(alice, 100).unwrap();

    let out = h.advance(10).claim(alice).unwrap();
    assert_eq!(out.reward.as_slice(), &[10]);
    assert_eq!(h.reward_of(&alice, 0), 10);
    assert_sound(&h);
}

#[test]
fn test_vesting_withdraw_then_drain_bucket() {
    let alice = addr(1);
    let mut h = Harness::new(&[1_000], 5, 500);
    h.fund(0, 10_000).unwrap();
    h.deposit(alice, 100).unwrap();

    // 1000 accrued: 500 clear, 500 vesting of which floor(500 / 6) is due
    let out = h.advance(1).withdraw(alice, 100).unwrap();
    assert_eq!(out.reward.as_slice(), &[583]);
    assert_eq!(h.stake_returned(&alice), 100);

    let details = h.pool.get_user_details(&alice);
    assert_eq!(details.entitled.as_slice(), &[417]);
    assert_eq!(details.vesting_time.as_slice(), &[6]);
    assert_eq!(details.state, UserState::Idle);

    let out = h.advance(5).claim(alice).unwrap();
    assert_eq!(out.reward.as_slice(), &[417]);
    assert_eq!(h.reward_of(&alice, 0), 1_000);
    assert_eq!(h.pool.user_state(&alice), UserState::Nonexistent);
    assert_sound(&h);
}

#[test]
fn test_two_stakers_split_by_share() {
    let (alice, bob) = (addr(1), addr(2));
    let mut h = Harness::new(&[100], 0, 0);
    h.fund(0, 100_000).unwrap();
    h.deposit(alice, 100).unwrap();
    h.at(10).deposit(bob, 300).unwrap();

    h.at(20);
    assert_eq!(h.claim(alice).unwrap().reward.as_slice(), &[1_250]);
    assert_eq!(h.claim(bob).unwrap().reward.as_slice(), &[750]);
    assert_sound(&h);
}

#[test]
fn test_underfunded_claim_records_debt_until_funded() {
    let alice = addr(1);
    let mut h = Harness::new(&[10], 0, 0);
    h.deposit(alice, 5).unwrap();

    let out = h.at(4).claim(alice).unwrap();
    assert_eq!(out.reward.as_slice(), &[0]);
    assert_eq!(out.debt.as_slice(), &[40]);
    assert_eq!(h.total_debt(0), 40);
    assert!(h.events.iter().any(|e| matches!(
        e,
        FarmEvent::RewardDebt { amount: 40, token: 0, .. }
    )));

    // funding lands after this operation's settlement pass
    h.at(5).fund(0, 100).unwrap();
    assert_eq!(h.total_debt(0), 40);

    let out = h.claim(alice).unwrap();
    assert_eq!(out.reward.as_slice(), &[50]);
    assert_eq!(out.debt.as_slice(), &[0]);
    assert_eq!(h.reward_of(&alice, 0), 50);
    assert_eq!(h.total_debt(0), 0);
    assert!(h.events.iter().any(|e| matches!(
        e,
        FarmEvent::DebtRepaid { amount: 40, .. }
    )));
    assert_sound(&h);
}

#[test]
fn test_debts_settle_oldest_first_on_any_operation() {
    let (alice, bob, carol) = (addr(1), addr(2), addr(3));
    let mut h = Harness::new(&[10], 0, 0);
    h.deposit(alice, 1).unwrap();
    h.deposit(bob, 1).unwrap();
    h.at(4).claim(alice).unwrap(); // owes 20
    h.claim(bob).unwrap(); // owes 20
    h.fund(0, 30).unwrap();

    // an unrelated participant's operation triggers settlement
    h.deposit(carol, 1).unwrap();
    assert_eq!(h.reward_of(&alice, 0), 20);
    assert_eq!(h.reward_of(&bob, 0), 10);
    assert_eq!(h.pool.get_user_details(&bob).pool_debt.as_slice(), &[10]);
    assert_eq!(h.pool.debt_queue(0).unwrap().front(), Some(&bob));
    assert_sound(&h);
}

#[test]
fn test_emission_without_stakers_goes_to_owner() {
    let alice = addr(1);
    let mut h = Harness::new(&[10], 0, 0);
    h.fund(0, 1_000).unwrap();
    h.at(10).deposit(alice, 1).unwrap();
    assert_eq!(h.pool.get_details().unclaimed_reward.as_slice(), &[100]);

    let err = h.pool.withdraw_unclaimed(alice, 10).unwrap_err();
    assert_eq!(err, FarmError::Unauthorized);

    let paid = h.withdraw_unclaimed().unwrap();
    assert_eq!(paid.as_slice(), &[100]);
    assert_eq!(h.reward_of(&OWNER, 0), 100);
    assert_eq!(h.pool.get_details().unclaimed_reward.as_slice(), &[0]);
    assert_sound(&h);
}

#[test]
fn test_added_round_changes_rate_from_its_start() {
    let alice = addr(1);
    let mut h = Harness::new(&[10], 0, 0);
    h.fund(0, 10_000).unwrap();
    h.deposit(alice, 7).unwrap();
    h.at(5).add_round(10, &[30]).unwrap();

    let out = h.at(20).claim(alice).unwrap();
    assert_eq!(out.reward.as_slice(), &[10 * 10 + 10 * 30]);
    assert_sound(&h);
}

#[test]
fn test_schedule_changes_are_not_retroactive() {
    let alice = addr(1);
    let mut h = Harness::new(&[10], 0, 0);
    h.fund(0, 10_000).unwrap();
    h.deposit(alice, 3).unwrap();

    h.at(10);
    assert!(matches!(h.add_round(5, &[99]), Err(FarmError::InvalidSchedule(_))));
    h.add_round(10, &[50]).unwrap();
    assert_eq!(h.claim(alice).unwrap().reward.as_slice(), &[100]);

    h.advance(2);
    assert_eq!(h.claim(alice).unwrap().reward.as_slice(), &[100]);
    assert_sound(&h);
}

#[test]
fn test_farm_end_stops_emission() {
    let alice = addr(1);
    let mut h = Harness::new(&[10], 0, 0);
    h.fund(0, 10_000).unwrap();
    h.set_end_time(15).unwrap();
    h.deposit(alice, 2).unwrap();

    assert_eq!(h.at(100).claim(alice).unwrap().reward.as_slice(), &[150]);
    assert!(matches!(h.set_end_time(50), Err(FarmError::InvalidSchedule(_))));
    assert!(matches!(h.add_round(200, &[1]), Err(FarmError::InvalidSchedule(_))));
    assert_sound(&h);
}

#[test]
fn test_safe_withdraw_returns_stake_and_forfeits_reward() {
    let alice = addr(1);
    let mut h = Harness::new(&[10], 0, 0);
    h.fund(0, 1_000).unwrap();
    h.deposit(alice, 50).unwrap();

    let out = h.at(10).safe_withdraw(alice).unwrap();
    assert_eq!(out.reward.as_slice(), &[0]);
    assert_eq!(h.stake_returned(&alice), 50);
    assert_eq!(h.reward_of(&alice, 0), 0);
    assert!(h.events.iter().any(|e| matches!(
        e,
        FarmEvent::SafeWithdraw { amount: 50, discarded, .. } if discarded.as_slice() == [100]
    )));
    assert_eq!(h.pool.user_state(&alice), UserState::Nonexistent);

    assert_eq!(h.withdraw_unclaimed().unwrap().as_slice(), &[100]);
    assert_eq!(h.safe_withdraw(alice).unwrap_err(), FarmError::InvalidAmount);
    assert_sound(&h);
}

#[test]
fn test_safe_withdraw_keeps_own_debt() {
    let alice = addr(1);
    let mut h = Harness::new(&[10], 0, 0);
    h.deposit(alice, 5).unwrap();
    h.at(4).claim(alice).unwrap();
    h.at(5).fund(0, 100).unwrap();

    let out = h.at(6).safe_withdraw(alice).unwrap();
    assert_eq!(out.debt.as_slice(), &[40]);
    assert_eq!(h.reward_of(&alice, 0), 0);
    assert_eq!(h.stake_returned(&alice), 5);
    assert_eq!(h.pool.user_state(&alice), UserState::Idle);

    let out = h.at(7).claim(alice).unwrap();
    assert_eq!(out.reward.as_slice(), &[40]);
    assert_eq!(h.pool.user_state(&alice), UserState::Nonexistent);
    assert_sound(&h);
}

#[test]
fn test_transfers_stay_outstanding_until_acknowledged() {
    let alice = addr(1);
    let mut h = Harness::new(&[10], 0, 0);
    h.fund(0, 1_000).unwrap();
    h.deposit(alice, 5).unwrap();

    h.pool.withdraw(alice, 5, 3).unwrap();
    let requested = h.pool.take_transfers();
    assert_eq!(requested.len(), 2);
    assert!(requested.windows(2).all(|w| w[0].nonce < w[1].nonce));
    assert_eq!(h.pool.unacknowledged().count(), 2);

    let nonce = requested[0].nonce;
    assert_eq!(h.pool.acknowledge_transfer(nonce).unwrap(), requested[0]);
    assert_eq!(
        h.pool.acknowledge_transfer(nonce).unwrap_err(),
        FarmError::UnknownTransfer(nonce)
    );
    assert_eq!(h.pool.unacknowledged().count(), 1);
}

#[test]
fn test_withdraw_unclaimed_all_keeps_vesting_reserved() {
    let alice = addr(1);
    let mut h = Harness::new(&[10], 100, 1_000);
    h.fund(0, 10_000).unwrap();
    h.deposit(alice, 10).unwrap();
    h.set_end_time(50).unwrap();

    // 500 vesting over 50s: floor(500 * 50 / 150) due now
    assert_eq!(h.at(50).claim(alice).unwrap().reward.as_slice(), &[166]);

    assert_eq!(
        h.at(100).withdraw_unclaimed_all().unwrap_err(),
        FarmError::WithdrawAllLocked {
            unlock_at: Some(150)
        }
    );

    let paid = h.at(150).withdraw_unclaimed_all().unwrap();
    assert_eq!(paid.as_slice(), &[9_500]);
    assert_eq!(h.pool.get_details().reserved_entitled.as_slice(), &[334]);

    assert_eq!(h.claim(alice).unwrap().reward.as_slice(), &[334]);
    assert_eq!(h.reward_of(&alice, 0), 500);
    assert_sound(&h);
}

#[test]
fn test_withdraw_unclaimed_all_locked_without_end() {
    let mut h = Harness::new(&[10], 0, 0);
    assert_eq!(
        h.at(1_000).withdraw_unclaimed_all().unwrap_err(),
        FarmError::WithdrawAllLocked { unlock_at: None }
    );
}

#[test]
fn test_multi_token_rewards_accrue_independently() {
    let alice = addr(1);
    let mut h = Harness::new(&[10, 1], 0, 0);
    h.fund_all(1_000).unwrap();
    h.deposit(alice, 10).unwrap();

    let out = h.at(10).claim(alice).unwrap();
    assert_eq!(out.reward.as_slice(), &[100, 10]);
    assert_eq!(h.reward_of(&alice, 1), 10);
    assert!(matches!(
        h.add_round(20, &[1]),
        Err(FarmError::TokenCountMismatch { expected: 2, got: 1 })
    ));
    assert_eq!(h.fund(2, 5).unwrap_err(), FarmError::UnknownToken(2));
    assert_sound(&h);
}

#[test]
fn test_replayed_notification_is_rejected() {
    let alice = addr(1);
    let mut h = Harness::new(&[10], 0, 0);
    let deposit = Envelope {
        sender: LEDGER,
        nonce: Some(1),
        command: Command::Deposit {
            depositor: alice,
            amount: 10,
            beneficiary: None,
        },
    };
    h.pool.apply(deposit.clone(), 0).unwrap();
    assert_eq!(
        h.pool.apply(deposit, 1).unwrap_err(),
        FarmError::DuplicateNonce(1)
    );
    assert_eq!(h.pool.get_user_details(&alice).amount, 10);
}

#[test]
fn test_ownership_transfer_moves_admin_rights() {
    let new_owner = addr(9);
    let mut h = Harness::new(&[10], 0, 0);
    h.pool.transfer_ownership(OWNER, new_owner, 0).unwrap();
    assert_eq!(*h.pool.owner(), new_owner);
    assert_eq!(h.add_round(10, &[1]).unwrap_err(), FarmError::Unauthorized);
    h.pool.add_reward_round(new_owner, 10, &[1], 0).unwrap();
}

#[test]
fn test_pending_reward_previews_without_mutating() {
    let alice = addr(1);
    let mut h = Harness::new(&[10], 10, 500);
    h.fund(0, 10_000).unwrap();
    h.deposit(alice, 4).unwrap();

    let before = h.pool.get_details();
    let preview = h.pool.pending_reward(&alice, 8).unwrap();
    assert_eq!(h.pool.get_details(), before);
    assert!(h.pool.take_transfers().is_empty());

    let out = h.at(8).claim(alice).unwrap();
    assert_eq!(out.reward, preview.payable);
    assert_eq!(h.pool.get_user_details(&alice).entitled, preview.entitled);
}

#[test]
fn test_json_command_line_applies() {
    let alice = addr(1);
    let mut h = Harness::new(&[10], 0, 0);
    let line = format!(
        r#"{{"sender":"{}","nonce":1,"command":{{"deposit":{{"depositor":"{}","amount":25}}}}}}"#,
        LEDGER, alice
    );
    let envelope: Envelope = serde_json::from_str(&line).unwrap();
    assert!(envelope.command.is_notification());
    h.pool.apply(envelope, 0).unwrap();
    assert_eq!(h.pool.get_user_details(&alice).amount, 25);

    let claim: Envelope =
        serde_json::from_str(&format!(r#"{{"sender":"{}","command":"claim"}}"#, alice)).unwrap();
    h.pool.apply(claim, 3).unwrap();
    let events = h.pool.take_events();
    let event = serde_json::to_value(events.last().unwrap()).unwrap();
    assert_eq!(event["event"], "Claim");
    assert_eq!(event["debt"][0], 30);
}

#[test]
fn test_unfunded_vesting_keeps_its_schedule() {
    let alice = addr(1);
    let mut h = Harness::new(&[10], 1_000, 1_000);
    h.deposit(alice, 1).unwrap();

    // 100 accrued, 100 * 10 / 1010 rounds to nothing due yet
    let out = h.at(10).claim(alice).unwrap();
    assert_eq!(out.reward.as_slice(), &[0]);
    let details = h.pool.get_user_details(&alice);
    assert_eq!(details.entitled.as_slice(), &[100]);
    assert_eq!(details.unreserved.as_slice(), &[100]);
    assert_eq!(details.vesting_time.as_slice(), &[1_010]);
    assert_eq!(details.pool_debt.as_slice(), &[0]);
    assert_sound(&h);

    h.at(11).fund(0, 10_000).unwrap();
    let out = h.at(12).claim(alice).unwrap();
    assert_eq!(out.reward.as_slice(), &[0]);
    assert_eq!(h.reward_of(&alice, 0), 0);
    let details = h.pool.get_user_details(&alice);
    assert_eq!(details.entitled.as_slice(), &[120]);
    assert_eq!(details.unreserved.as_slice(), &[0]);
    assert_eq!(h.pool.get_details().reserved_entitled.as_slice(), &[120]);
    assert_sound(&h);

    // whole bucket due at 1010, plus floor(9980 * 998 / 1998) of the new part
    let out = h.at(1_010).claim(alice).unwrap();
    assert_eq!(out.reward.as_slice(), &[120 + 4_985]);
    assert_eq!(out.debt.as_slice(), &[0]);
    assert_eq!(h.pool.get_user_details(&alice).unreserved.as_slice(), &[100]);
    assert_sound(&h);
}

#[test]
fn test_unfunded_release_becomes_debt_when_due() {
    let alice = addr(1);
    let mut h = Harness::new(&[10], 1_000, 1_000);
    h.deposit(alice, 1).unwrap();
    h.at(10).claim(alice).unwrap();

    // bucket of 100 falls due with nothing funded, half of the new 10_000 vests
    let out = h.at(1_010).claim(alice).unwrap();
    assert_eq!(out.reward.as_slice(), &[0]);
    assert_eq!(out.debt.as_slice(), &[5_100]);
    let details = h.pool.get_user_details(&alice);
    assert_eq!(details.entitled.as_slice(), &[5_000]);
    assert_eq!(details.unreserved.as_slice(), &[5_000]);
    assert_eq!(details.vesting_time.as_slice(), &[2_010]);
    assert_sound(&h);
}

#[test]
fn test_eighteen_decimal_rate_over_long_idle() {
    let (alice, bob) = (addr(1), addr(2));
    let mut h = Harness::new(&[E18], 0, 0);
    h.fund(0, 1_000 * E18).unwrap();
    h.deposit(alice, 1_000_000_000).unwrap();
    h.deposit(bob, 1_000_000_000).unwrap();

    let out = h.at(400).claim(alice).unwrap();
    assert_eq!(out.reward.as_slice(), &[200 * E18]);

    let out = h.at(401).safe_withdraw(bob).unwrap();
    assert_eq!(out.reward.as_slice(), &[0]);
    assert_eq!(h.stake_returned(&bob), 1_000_000_000);

    let out = h.at(402).withdraw_all(alice).unwrap();
    assert_eq!(out.reward.as_slice(), &[E18 + E18 / 2]);
    assert_eq!(h.stake_returned(&alice), 1_000_000_000);
    assert_sound(&h);
}

#[test]
fn test_ledger_commands_only_from_ledger_account() {
    let (alice, mallory) = (addr(1), addr(7));
    let mut h = Harness::new(&[10], 0, 0);
    h.fund(0, 1_000).unwrap();
    h.deposit(alice, 5).unwrap();
    h.pool.withdraw(alice, 5, 3).unwrap();
    let requested = h.pool.take_transfers();
    let before = h.pool.get_details();

    let from = |sender, command| Envelope {
        sender,
        nonce: None,
        command,
    };
    let ack = Command::AcknowledgeTransfer {
        nonce: requested[0].nonce,
    };
    assert_eq!(
        h.pool.apply(from(mallory, ack.clone()), 3).unwrap_err(),
        FarmError::Unauthorized
    );
    assert_eq!(
        h.pool
            .apply(from(mallory, Command::DepositReward { token: 0, amount: 1_000_000 }), 3)
            .unwrap_err(),
        FarmError::Unauthorized
    );
    assert_eq!(h.pool.unacknowledged().count(), 2);
    assert_eq!(h.pool.get_details(), before);

    assert_eq!(h.pool.apply(from(LEDGER, ack), 3).unwrap(), Receipt::Done);
    assert_eq!(h.pool.unacknowledged().count(), 1);
}
