//! Input sanitizer - bounds values for Kani exploration

use farm_engine::{PoolConfig, RewardRound, VestingParams, MAX_VESTING_RATIO};

pub const N_USERS: usize = 2;
pub const MAX_STEPS: u8 = 4;

/// Bounds for tractable verification
const MAX_RATE: u128 = 1_000;
const MAX_PERIOD: u64 = 100;
const MAX_TIME: u64 = 1_000;
pub const MAX_AMOUNT: u128 = 10_000;

pub trait Sanitize {
    fn sanitize(self) -> Self;
}

impl Sanitize for VestingParams {
    fn sanitize(self) -> VestingParams {
        VestingParams {
            vesting_period: self.vesting_period % (MAX_PERIOD + 1),
            vesting_ratio: self.vesting_ratio % (MAX_VESTING_RATIO + 1),
        }
    }
}

impl Sanitize for RewardRound {
    fn sanitize(mut self) -> RewardRound {
        self.start_time %= MAX_TIME;
        for rate in self.reward_per_second.iter_mut() {
            *rate %= MAX_RATE + 1;
        }
        self
    }
}

impl Sanitize for PoolConfig {
    fn sanitize(mut self) -> PoolConfig {
        let vesting = VestingParams {
            vesting_period: self.vesting_period,
            vesting_ratio: self.vesting_ratio,
        }
        .sanitize();
        self.vesting_period = vesting.vesting_period;
        self.vesting_ratio = vesting.vesting_ratio;
        self.withdraw_all_lock_period %= MAX_PERIOD + 1;

        // a single round keeps the schedule trivially ordered
        self.reward_rounds.truncate(1);
        self.reward_rounds = self.reward_rounds.into_iter().map(Sanitize::sanitize).collect();
        self
    }
}

/// Clamp an amount into the explored range
pub fn bounded_amount(raw: u128) -> u128 {
    raw % (MAX_AMOUNT + 1)
}

/// Clamp a time step into the explored range
pub fn bounded_step(raw: u64) -> u64 {
    raw % (MAX_PERIOD + 1)
}
