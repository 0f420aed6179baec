//! Minimal Kani proofs using concrete values
//! Start with specific scenarios, then generalize in `safety`

use farm_engine::helpers::*;
use farm_engine::{Pool, UserState};
use crate::generators::*;

// === Level 1: Concrete single-user scenarios ===

/// One staker, rate 1/sec, no vesting: a claim after 10s pays exactly 10
#[kani::proof]
fn claim_pays_rate_times_elapsed() {
    let mut pool = Pool::new(single_token_config(1, 0, 0), 0).unwrap();
    pool.deposit_reward(0, 1_000, 0).unwrap();
    pool.deposit(user(0), 100, None, 0).unwrap();

    let out = pool.claim(user(0), 10).unwrap();

    assert_eq!(out.reward[0], 10, "claim must pay rate * elapsed");
    assert!(funds_conserved(&pool));
}

/// Half of every reward vests over 5s; after a full period the bucket drains
#[kani::proof]
fn vesting_bucket_drains_after_period() {
    let mut pool = Pool::new(single_token_config(10, 5, 500), 0).unwrap();
    pool.deposit_reward(0, 1_000, 0).unwrap();
    pool.deposit(user(0), 1, None, 0).unwrap();

    let out = pool.withdraw(user(0), 1, 1).unwrap();
    assert_eq!(out.reward[0], 5, "clear part paid immediately");
    assert_eq!(pool.get_user_details(&user(0)).entitled[0], 5);

    let out = pool.claim(user(0), 6).unwrap();
    assert_eq!(out.reward[0], 5, "bucket released after full period");
    assert_eq!(pool.user_state(&user(0)), UserState::Nonexistent);
    assert!(reserved_matches_entitled(&pool));
}

/// Nothing staked: the interval's emission goes to the operator
#[kani::proof]
fn empty_pool_emission_is_unclaimed() {
    let mut pool = Pool::new(single_token_config(3, 0, 0), 0).unwrap();
    pool.deposit(user(1), 10, None, 4).unwrap();
    let out = pool.claim(user(1), 5).unwrap();

    assert_eq!(pool.get_details().unclaimed_reward[0], 12);
    assert_eq!(out.debt[0], 3, "unfunded pool owes the staker");
    assert!(no_overmint(&pool));
}
