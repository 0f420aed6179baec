//! Adversarial step generator

#[cfg(kani)]
use kani::any;
#[cfg(kani)]
use farm_engine::Pool;
#[cfg(kani)]
use crate::{generators::*, sanitizer::*};

#[derive(Clone, Copy, Debug)]
pub enum Step {
    Deposit,
    Withdraw,
    Claim,
    SafeWithdraw,
    FundReward,
    Tick,
}

#[cfg(kani)]
impl kani::Arbitrary for Step {
    fn any() -> Self {
        let choice: u8 = any();
        match choice % 6 {
            0 => Step::Deposit,
            1 => Step::Withdraw,
            2 => Step::Claim,
            3 => Step::SafeWithdraw,
            4 => Step::FundReward,
            _ => Step::Tick,
        }
    }
}

/// Apply one arbitrary operation. Errors are allowed; they must leave the pool untouched.
#[cfg(kani)]
pub fn adversary_step(pool: &mut Pool, now: &mut u64) {
    let who = any_user();
    match any::<Step>() {
        Step::Deposit => {
            let _ = pool.deposit(who, bounded_amount(any()), None, *now);
        }
        Step::Withdraw => {
            let _ = pool.withdraw(who, bounded_amount(any()), *now);
        }
        Step::Claim => {
            let _ = pool.claim(who, *now);
        }
        Step::SafeWithdraw => {
            let _ = pool.safe_withdraw(who, *now);
        }
        Step::FundReward => {
            let _ = pool.deposit_reward(0, bounded_amount(any()), *now);
        }
        Step::Tick => {
            *now += bounded_step(any());
        }
    }
}
