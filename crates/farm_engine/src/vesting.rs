//! Linear vesting policy
//!
//! Pure functions splitting a reward increment into a part payable now and
//! a part that vests linearly. A prior pending bucket releases in
//! proportion to the time elapsed over its remaining life. Every division
//! floors, so a release never exceeds what the bucket holds.

use serde::{Deserialize, Serialize};

use crate::error::{FarmError, Result};
use crate::math::{add, add_time, add_wide, mul_div, mul_div_wide, sub};
use crate::state::{Amount, Timestamp, U256};

/// Denominator of `vesting_ratio`
pub const MAX_VESTING_RATIO: u32 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingParams {
    pub vesting_period: Timestamp,
    /// 0 = no vesting, `MAX_VESTING_RATIO` = everything vests
    pub vesting_ratio: u32,
}

impl VestingParams {
    pub fn new(vesting_period: Timestamp, vesting_ratio: u32) -> Result<Self> {
        if vesting_ratio > MAX_VESTING_RATIO {
            return Err(FarmError::InvalidVesting);
        }
        Ok(Self {
            vesting_period,
            vesting_ratio,
        })
    }

    pub fn none() -> Self {
        Self {
            vesting_period: 0,
            vesting_ratio: 0,
        }
    }

    pub fn is_vesting(&self) -> bool {
        self.vesting_ratio > 0 && self.vesting_period > 0
    }
}

/// Result of applying the policy to one token's increment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VestingSplit {
    pub clear_part: Amount,
    pub released_from_prior: Amount,
    pub newly_vested: Amount,
    pub remaining_entitled: Amount,
    pub unreleased_new: Amount,
    pub vesting_time: Timestamp,
}

impl VestingSplit {
    /// Payable from the free balance (the prior bucket is already reserved)
    pub fn fresh_payable(&self) -> Result<Amount> {
        add(self.clear_part, self.newly_vested)
    }

    pub fn payable_now(&self) -> Result<Amount> {
        add(self.fresh_payable()?, self.released_from_prior)
    }

    pub fn entitled(&self) -> Result<Amount> {
        add(self.remaining_entitled, self.unreleased_new)
    }
}

/// Split `increment` accrued over `[prev_time, new_time)` against a prior
/// bucket `entitled` scheduled to finish at `vesting_time`
pub fn split_increment(
    params: &VestingParams,
    increment: Amount,
    entitled: Amount,
    vesting_time: Timestamp,
    prev_time: Timestamp,
    new_time: Timestamp,
) -> Result<VestingSplit> {
    let vesting_part = mul_div(
        increment,
        u128::from(params.vesting_ratio),
        u128::from(MAX_VESTING_RATIO),
    )?;
    let clear_part = sub(increment, vesting_part)?;
    let dt = new_time.saturating_sub(prev_time);

    let released_from_prior = if entitled == 0 {
        0
    } else if vesting_time <= prev_time {
        entitled
    } else {
        let life = vesting_time - prev_time;
        let age = dt.min(life);
        mul_div(entitled, u128::from(age), u128::from(life))?
    };

    // the increment accrued continuously over dt, so part of it is already due
    let denom = u128::from(dt) + u128::from(params.vesting_period);
    let newly_vested = if denom == 0 {
        vesting_part
    } else {
        mul_div(vesting_part, u128::from(dt), denom)?
    };

    let remaining_entitled = sub(entitled, released_from_prior)?;
    let unreleased_new = sub(vesting_part, newly_vested)?;
    let vesting_time = vesting_deadline(params, remaining_entitled, unreleased_new, vesting_time, new_time)?;

    Ok(VestingSplit {
        clear_part,
        released_from_prior,
        newly_vested,
        remaining_entitled,
        unreleased_new,
        vesting_time,
    })
}

/// Full-release time of a bucket made of `remaining` (finishing at `prior_vt`)
/// and `unreleased` (a fresh full period)
pub fn vesting_deadline(
    params: &VestingParams,
    remaining: Amount,
    unreleased: Amount,
    prior_vt: Timestamp,
    new_time: Timestamp,
) -> Result<Timestamp> {
    let pending = add(remaining, unreleased)?;
    if pending == 0 {
        return Ok(new_time);
    }
    if remaining == 0 {
        return add_time(new_time, params.vesting_period);
    }
    if unreleased == 0 {
        return Ok(prior_vt);
    }
    let old_life = prior_vt.saturating_sub(new_time);
    let weight = add_wide(
        U256::from(remaining) * U256::from(old_life),
        U256::from(unreleased) * U256::from(params.vesting_period),
    )?;
    let weighted = mul_div_wide(weight, U256::one(), U256::from(pending))?;
    let capped = weighted.min(U256::from(params.vesting_period));
    // capped <= vesting_period, which is a u64
    add_time(new_time, capped.low_u64())
}
