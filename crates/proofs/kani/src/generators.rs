//! Generators for arbitrary pools and participants (for Kani)

#[cfg(kani)]
use kani::any;
use farm_engine::{Address, PoolConfig, RewardRound, TokenVec};
#[cfg(kani)]
use farm_engine::{Pool, VestingParams};
#[cfg(kani)]
use crate::sanitizer::*;

pub const OWNER: Address = Address::new([0xAA; 32]);
pub const LEDGER: Address = Address::new([0xBB; 32]);

/// Participant by small index
pub fn user(idx: u8) -> Address {
    let mut bytes = [0u8; 32];
    bytes[0] = 1 + idx % 16;
    Address::new(bytes)
}

/// Single-token pool config starting at time zero
pub fn single_token_config(rate: u128, vesting_period: u64, vesting_ratio: u32) -> PoolConfig {
    let mut rates = TokenVec::new();
    rates.push(rate);
    PoolConfig {
        owner: OWNER,
        ledger_account: LEDGER,
        reward_rounds: vec![RewardRound::new(0, rates)],
        reward_token_count: 1,
        vesting_period,
        vesting_ratio,
        withdraw_all_lock_period: 0,
    }
}

#[cfg(kani)]
pub fn any_vesting() -> VestingParams {
    VestingParams {
        vesting_period: any(),
        vesting_ratio: any(),
    }
    .sanitize()
}

#[cfg(kani)]
pub fn any_config() -> PoolConfig {
    let rate: u16 = any();
    let v = any_vesting();
    single_token_config(rate as u128, v.vesting_period, v.vesting_ratio).sanitize()
}

/// Pool with a funded reward balance
#[cfg(kani)]
pub fn any_pool() -> Pool {
    let created = Pool::new(any_config(), 0);
    kani::assume(created.is_ok());
    let mut pool = created.unwrap();
    let funding: u16 = any();
    if funding > 0 {
        let _ = pool.deposit_reward(0, funding as u128, 0);
    }
    pool
}

#[cfg(kani)]
pub fn any_user() -> Address {
    user(any::<u8>() % N_USERS as u8)
}
