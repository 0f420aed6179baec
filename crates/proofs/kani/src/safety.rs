//! Kani proofs for the reward engine invariants

use kani::{any, assume};
use farm_engine::helpers::*;
use farm_engine::{split_increment, vesting_deadline, FarmError, RewardRound, RewardSchedule, TokenVec};
use crate::{adversary::*, generators::*, sanitizer::*};

/// Vesting never releases more than the increment plus the prior bucket
#[kani::proof]
fn vesting_never_over_releases() {
    let params = any_vesting();
    let increment = bounded_amount(any());
    let entitled = bounded_amount(any());
    let prev: u8 = any();
    let dt: u8 = any();
    let vt: u8 = any();
    let prev = prev as u64;
    let now = prev + dt as u64;
    // a prior deadline is never more than one period past its checkpoint
    assume(vt as u64 <= prev + params.vesting_period);

    let split = split_increment(&params, increment, entitled, vt as u64, prev, now).unwrap();

    kani::assert(split.released_from_prior <= entitled, "release bounded by bucket");
    kani::assert(
        split.payable_now().unwrap() + split.entitled().unwrap() == increment + entitled,
        "split must account for every unit",
    );
    kani::assert(
        split.vesting_time <= now + params.vesting_period,
        "deadline capped at one period",
    );
}

/// A fresh bucket with nothing left over keeps the prior deadline
#[kani::proof]
fn deadline_only_old_bucket_unchanged() {
    let params = any_vesting();
    let remaining = bounded_amount(any());
    assume(remaining > 0);
    let vt: u8 = any();
    let now: u8 = any();

    let d = vesting_deadline(&params, remaining, 0, vt as u64, now as u64).unwrap();
    kani::assert(d == vt as u64, "only-old bucket keeps its deadline");
}

/// Integration over [a, c) equals [a, b) + [b, c)
#[kani::proof]
fn integrate_is_additive() {
    let r0: u8 = any();
    let r1: u8 = any();
    let split: u8 = any();
    let mut rates0 = TokenVec::new();
    rates0.push(r0 as u128);
    let mut rates1 = TokenVec::new();
    rates1.push(r1 as u128);
    let mut s = RewardSchedule::new(vec![RewardRound::new(10, rates0)], 1).unwrap();
    let _ = s.add_round(RewardRound::new(10 + split as u64 % 50 + 1, rates1), 0);

    let a: u8 = any();
    let b: u8 = any();
    let c: u8 = any();
    assume(a <= b && b <= c);
    let whole = s.integrate(a as u64, c as u64).unwrap();
    let left = s.integrate(a as u64, b as u64).unwrap();
    let right = s.integrate(b as u64, c as u64).unwrap();
    kani::assert(whole[0] == left[0] + right[0], "integration must split additively");
}

/// Funds identity and debt bookkeeping hold across short adversary sequences
#[kani::proof]
#[kani::unwind(6)]
fn funds_conserved_across_adversary_sequences() {
    let mut pool = any_pool();
    let mut now = 0u64;

    let mut steps: u8 = any();
    steps = (steps % MAX_STEPS) + 1;

    for _ in 0..steps {
        let before = pool.ledger().clone();
        adversary_step(&mut pool, &mut now);
        kani::assert(funds_conserved(&pool), "funds identity must hold");
        kani::assert(debt_matches_users(&pool), "debt total must match participants");
        kani::assert(accumulator_monotonic(&before, pool.ledger()), "accumulator must not decrease");
    }
}

/// A rejected withdraw leaves the pool untouched
#[kani::proof]
fn rejected_withdraw_is_atomic() {
    let mut pool = any_pool();
    let who = any_user();
    let staked = bounded_amount(any());
    let _ = pool.deposit(who, staked, None, 0);

    let before = pool.get_details();
    let t: u8 = any();
    let r = pool.withdraw(who, staked + 1, t as u64);
    kani::assert(
        matches!(r, Err(FarmError::InsufficientStake { .. })),
        "over-withdraw must be rejected",
    );
    kani::assert(pool.get_details() == before, "rejected op must not mutate");
}

/// Syncing twice at the same time changes nothing the second time
#[kani::proof]
fn sync_is_idempotent() {
    let pool = any_pool();
    let mut ledger = pool.ledger().clone();
    let now: u8 = any();
    let _ = ledger.sync(pool.schedule(), now as u64);
    let once = ledger.clone();
    let advanced = ledger.sync(pool.schedule(), now as u64).unwrap();
    kani::assert(!advanced, "second sync must be a no-op");
    kani::assert(ledger == once, "second sync must not mutate");
}
