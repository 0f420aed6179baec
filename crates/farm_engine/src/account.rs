//! Per-participant accrual against the pool ledger

use log::debug;

use crate::error::Result;
use crate::math::{add, min_u128, sub};
use crate::schedule::RewardSchedule;
use crate::state::{zeroed, Amount, PoolLedger, Timestamp, TokenVec, UserAccount};
use crate::vesting::{split_increment, VestingParams};

/// What one accrual did, per token
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Accrual {
    /// Requested outbound to the participant
    pub paid: TokenVec<Amount>,
    /// Growth of `pool_debt` caused by this accrual
    pub debt_added: TokenVec<Amount>,
    /// Reward earned since the previous checkpoint
    pub increment: TokenVec<Amount>,
}

impl Accrual {
    fn new(n: usize) -> Self {
        Self {
            paid: zeroed(n),
            debt_added: zeroed(n),
            increment: zeroed(n),
        }
    }
}

impl UserAccount {
    /// Sync the ledger, split the new reward through the vesting policy and
    /// pay what is due. The checkpoint is reset whatever the payout.
    ///
    /// The whole vesting part always joins `entitled` on the vesting
    /// schedule. Whatever the free balance cannot back is tracked in
    /// `unreserved` and backed by a later accrual; a release that finds it
    /// still unbacked is paid from the free balance or becomes `pool_debt`.
    pub fn accrue(
        &mut self,
        ledger: &mut PoolLedger,
        schedule: &RewardSchedule,
        vesting: &VestingParams,
        now: Timestamp,
    ) -> Result<Accrual> {
        ledger.sync(schedule, now)?;
        let n = ledger.token_count();
        let mut out = Accrual::new(n);

        for t in 0..n {
            let increment = ledger.accrued_since(t, self.amount, self.reward_debt[t])?;
            let split = split_increment(
                vesting,
                increment,
                self.entitled[t],
                self.vesting_time[t],
                self.last_reward_time,
                now,
            )?;

            // releases come out of the backed part of the bucket first
            let backed = sub(self.entitled[t], self.unreserved[t])?;
            let from_reserve = min_u128(split.released_from_prior, backed);
            ledger.release_reserved(t, from_reserve)?;
            let from_unbacked = sub(split.released_from_prior, from_reserve)?;
            self.unreserved[t] = sub(self.unreserved[t], from_unbacked)?;
            ledger.clear_unreserved(t, from_unbacked)?;

            let old_debt = self.pool_debt[t];
            let owed = add(add(old_debt, split.fresh_payable()?)?, from_unbacked)?;
            let got = ledger.pay_staker(t, owed)?;
            let debt = sub(owed, got)?;

            let topped = ledger.reserve(t, self.unreserved[t])?;
            ledger.clear_unreserved(t, topped)?;
            let held = ledger.reserve(t, split.unreleased_new)?;
            let unbacked_new = sub(split.unreleased_new, held)?;
            ledger.owe_unreserved(t, unbacked_new)?;
            self.unreserved[t] = add(sub(self.unreserved[t], topped)?, unbacked_new)?;

            self.vesting_time[t] = split.vesting_time;
            self.entitled[t] = split.entitled()?;

            ledger.reduce_debt(t, old_debt)?;
            ledger.add_debt(t, debt)?;
            self.pool_debt[t] = debt;
            self.reward_debt[t] = ledger.acc_reward_per_share[t];

            out.paid[t] = add(got, from_reserve)?;
            out.debt_added[t] = debt.saturating_sub(old_debt);
            out.increment[t] = increment;
        }

        self.last_reward_time = now;
        debug!("accrue at {}: paid {:?}, debt {:?}", now, out.paid, self.pool_debt);
        Ok(out)
    }

    /// Checkpoint without paying: this call's increment and the vesting
    /// bucket are credited to the operator. Outstanding `pool_debt` is kept.
    /// Returns the discarded amount per token.
    pub fn discard(
        &mut self,
        ledger: &mut PoolLedger,
        schedule: &RewardSchedule,
        now: Timestamp,
    ) -> Result<TokenVec<Amount>> {
        ledger.sync(schedule, now)?;
        let n = ledger.token_count();
        let mut discarded = zeroed(n);

        for t in 0..n {
            let increment = ledger.accrued_since(t, self.amount, self.reward_debt[t])?;
            let bucket = self.entitled[t];
            ledger.unreserve(t, sub(bucket, self.unreserved[t])?)?;
            ledger.clear_unreserved(t, self.unreserved[t])?;
            let total = add(increment, bucket)?;
            ledger.credit_unclaimed(t, total)?;

            self.entitled[t] = 0;
            self.unreserved[t] = 0;
            self.vesting_time[t] = now;
            self.reward_debt[t] = ledger.acc_reward_per_share[t];
            discarded[t] = total;
        }

        self.last_reward_time = now;
        Ok(discarded)
    }

    /// Pay outstanding `pool_debt` from the free balance. Returns the amount paid.
    pub fn repay_debt(&mut self, ledger: &mut PoolLedger, token: usize) -> Result<Amount> {
        let got = ledger.pay_staker(token, self.pool_debt[token])?;
        self.pool_debt[token] = sub(self.pool_debt[token], got)?;
        ledger.reduce_debt(token, got)?;
        Ok(got)
    }
}
