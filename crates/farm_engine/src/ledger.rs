//! Pool-wide accumulator and reward fund movements
//!
//! Every transition keeps the funds identity per token:
//! `reward_token_balance + reserved_entitled + total_paid == reward_token_balance_cumulative`.
//!
//! The accumulator is 256-bit: a small stake under an 18-decimal rate
//! outgrows u128 within minutes.

use log::debug;

use crate::error::{FarmError, Result};
use crate::math::{add, add_wide, min_u128, mul_div_wide, narrow, sub, sub_wide};
use crate::schedule::RewardSchedule;
use crate::state::{Amount, PoolLedger, Timestamp, SCALING_FACTOR, U256};

impl PoolLedger {
    fn check_token(&self, token: usize) -> Result<()> {
        if token >= self.token_count() {
            return Err(FarmError::UnknownToken(token));
        }
        Ok(())
    }

    /// Advance the accumulators to `now`. Returns false when already current.
    pub fn sync(&mut self, schedule: &RewardSchedule, now: Timestamp) -> Result<bool> {
        if now <= self.last_reward_time {
            return Ok(false);
        }
        let emitted = schedule.integrate(self.last_reward_time, now)?;
        for (token, amount) in emitted.iter().enumerate() {
            self.total_emitted[token] = add(self.total_emitted[token], *amount)?;
            if self.total_staked == 0 {
                self.unclaimed_reward[token] = add(self.unclaimed_reward[token], *amount)?;
            } else {
                let per_share = mul_div_wide(
                    U256::from(*amount),
                    U256::from(SCALING_FACTOR),
                    U256::from(self.total_staked),
                )?;
                self.acc_reward_per_share[token] =
                    add_wide(self.acc_reward_per_share[token], per_share)?;
            }
        }
        debug!(
            "sync {} -> {}: emitted {:?}, staked {}",
            self.last_reward_time, now, emitted, self.total_staked
        );
        self.last_reward_time = now;
        Ok(true)
    }

    /// Reward earned by `stake` since checkpoint `reward_debt`, rounded down
    pub fn accrued_since(&self, token: usize, stake: Amount, reward_debt: U256) -> Result<Amount> {
        let delta = sub_wide(self.acc_reward_per_share[token], reward_debt)?;
        narrow(mul_div_wide(U256::from(stake), delta, U256::from(SCALING_FACTOR))?)
    }

    /// Inbound reward funding
    pub fn fund(&mut self, token: usize, amount: Amount) -> Result<()> {
        self.check_token(token)?;
        self.reward_token_balance[token] = add(self.reward_token_balance[token], amount)?;
        self.reward_token_balance_cumulative[token] =
            add(self.reward_token_balance_cumulative[token], amount)?;
        Ok(())
    }

    /// Take up to `want` out of the free balance. Returns what was available.
    fn draw(&mut self, token: usize, want: Amount) -> Result<Amount> {
        let paid = min_u128(want, self.reward_token_balance[token]);
        self.reward_token_balance[token] = sub(self.reward_token_balance[token], paid)?;
        self.total_paid[token] = add(self.total_paid[token], paid)?;
        Ok(paid)
    }

    /// Pay a staker from the free balance, capped at what is there
    pub fn pay_staker(&mut self, token: usize, want: Amount) -> Result<Amount> {
        let paid = self.draw(token, want)?;
        self.staker_paid[token] = add(self.staker_paid[token], paid)?;
        Ok(paid)
    }

    /// Pay the operator from the free balance, capped at what is there
    pub fn pay_operator(&mut self, token: usize, want: Amount) -> Result<Amount> {
        self.draw(token, want)
    }

    /// Hold up to `want` of the free balance for a vesting bucket
    pub fn reserve(&mut self, token: usize, want: Amount) -> Result<Amount> {
        let held = min_u128(want, self.reward_token_balance[token]);
        self.reward_token_balance[token] = sub(self.reward_token_balance[token], held)?;
        self.reserved_entitled[token] = add(self.reserved_entitled[token], held)?;
        Ok(held)
    }

    /// Pay a staker out of their reserved bucket
    pub fn release_reserved(&mut self, token: usize, amount: Amount) -> Result<()> {
        self.reserved_entitled[token] = sub(self.reserved_entitled[token], amount)?;
        self.total_paid[token] = add(self.total_paid[token], amount)?;
        self.staker_paid[token] = add(self.staker_paid[token], amount)?;
        Ok(())
    }

    /// Return a discarded bucket to the free balance
    pub fn unreserve(&mut self, token: usize, amount: Amount) -> Result<()> {
        self.reserved_entitled[token] = sub(self.reserved_entitled[token], amount)?;
        self.reward_token_balance[token] = add(self.reward_token_balance[token], amount)?;
        Ok(())
    }

    /// Record vesting reward that could not be backed by the free balance
    pub fn owe_unreserved(&mut self, token: usize, amount: Amount) -> Result<()> {
        self.unreserved_entitled[token] = add(self.unreserved_entitled[token], amount)?;
        Ok(())
    }

    /// Unbacked vesting reward got backed, paid or discarded
    pub fn clear_unreserved(&mut self, token: usize, amount: Amount) -> Result<()> {
        self.unreserved_entitled[token] = sub(self.unreserved_entitled[token], amount)?;
        Ok(())
    }

    pub fn add_debt(&mut self, token: usize, amount: Amount) -> Result<()> {
        self.total_pool_debt[token] = add(self.total_pool_debt[token], amount)?;
        Ok(())
    }

    pub fn reduce_debt(&mut self, token: usize, amount: Amount) -> Result<()> {
        self.total_pool_debt[token] = sub(self.total_pool_debt[token], amount)?;
        Ok(())
    }

    /// Credit reward that no staker will receive to the operator
    pub fn credit_unclaimed(&mut self, token: usize, amount: Amount) -> Result<()> {
        self.unclaimed_reward[token] = add(self.unclaimed_reward[token], amount)?;
        Ok(())
    }

    /// Mark `amount` of unclaimed reward as settled with the operator
    pub fn settle_unclaimed(&mut self, token: usize, amount: Amount) -> Result<()> {
        self.unclaimed_reward[token] = sub(self.unclaimed_reward[token], amount)?;
        self.unclaimed_withdrawn[token] = add(self.unclaimed_withdrawn[token], amount)?;
        Ok(())
    }
}
