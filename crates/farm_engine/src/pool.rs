//! Pool aggregate: one sequential state machine per farm
//!
//! Every operation runs against a staged copy of the state it touches:
//! ledger sync, debt settlement, the operation itself. Nothing is written
//! back unless all of it succeeds.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::account::Accrual;
use crate::command::{Command, Envelope, Receipt};
use crate::error::{FarmError, Result};
use crate::events::{Asset, FarmEvent, TransferRequest};
use crate::math::{add, add_time, sub};
use crate::replay::ReplayGuard;
use crate::schedule::{RewardRound, RewardSchedule};
use crate::state::{
    token_vec, zeroed, Address, Amount, PoolConfig, PoolLedger, Timestamp, TokenVec, UserAccount,
    UserState, U256,
};
use crate::vesting::VestingParams;

/// Reward paid and debt outstanding for the participant an operation touched
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub reward: TokenVec<Amount>,
    pub debt: TokenVec<Amount>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDetails {
    pub owner: Address,
    pub ledger_account: Address,
    pub total_staked: Amount,
    pub acc_reward_per_share: TokenVec<U256>,
    pub last_reward_time: Timestamp,
    pub reward_token_balance: TokenVec<Amount>,
    pub reward_token_balance_cumulative: TokenVec<Amount>,
    pub unclaimed_reward: TokenVec<Amount>,
    pub total_pool_debt: TokenVec<Amount>,
    pub reserved_entitled: TokenVec<Amount>,
    pub unreserved_entitled: TokenVec<Amount>,
    pub reward_rounds: Vec<RewardRound>,
    pub end_time: Option<Timestamp>,
    pub vesting_period: Timestamp,
    pub vesting_ratio: u32,
    pub withdraw_all_lock_period: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    pub amount: Amount,
    pub reward_debt: TokenVec<U256>,
    pub entitled: TokenVec<Amount>,
    pub unreserved: TokenVec<Amount>,
    pub vesting_time: TokenVec<Timestamp>,
    pub pool_debt: TokenVec<Amount>,
    pub last_reward_time: Timestamp,
    pub state: UserState,
}

/// What a claim at a given time would do, without doing it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReward {
    pub payable: TokenVec<Amount>,
    pub entitled: TokenVec<Amount>,
    pub vesting_time: TokenVec<Timestamp>,
    pub pool_debt: TokenVec<Amount>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pool {
    owner: Address,
    ledger_account: Address,
    vesting: VestingParams,
    withdraw_all_lock_period: Timestamp,
    schedule: RewardSchedule,
    ledger: PoolLedger,
    users: BTreeMap<Address, UserAccount>,
    /// Per token, participants with outstanding `pool_debt` in order of first shortfall
    debt_queue: Vec<VecDeque<Address>>,
    replay: ReplayGuard,
    next_nonce: u64,
    unacknowledged: BTreeMap<u64, TransferRequest>,
    #[serde(skip)]
    events: Vec<FarmEvent>,
    #[serde(skip)]
    outbox: Vec<TransferRequest>,
}

// ============================================================================
// Staged overlay
// ============================================================================

struct Staged<'p> {
    base: &'p BTreeMap<Address, UserAccount>,
    vesting: VestingParams,
    now: Timestamp,
    owner: Address,
    schedule: RewardSchedule,
    ledger: PoolLedger,
    users: BTreeMap<Address, UserAccount>,
    debt_queue: Vec<VecDeque<Address>>,
    repaid: BTreeMap<Address, TokenVec<Amount>>,
    events: Vec<FarmEvent>,
    transfers: Vec<TransferRequest>,
    next_nonce: u64,
}

/// Staged state ready to be written back
struct Changes {
    owner: Address,
    schedule: RewardSchedule,
    ledger: PoolLedger,
    users: BTreeMap<Address, UserAccount>,
    debt_queue: Vec<VecDeque<Address>>,
    events: Vec<FarmEvent>,
    transfers: Vec<TransferRequest>,
    next_nonce: u64,
}

impl<'p> Staged<'p> {
    /// Sync the ledger to `now` and settle outstanding debt, skipping `skip`
    fn begin(pool: &'p Pool, now: Timestamp, skip: Option<&Address>) -> Result<Self> {
        // time never runs backwards for a pool
        let now = now.max(pool.ledger.last_reward_time);
        let mut staged = Self {
            base: &pool.users,
            vesting: pool.vesting,
            now,
            owner: pool.owner,
            schedule: pool.schedule.clone(),
            ledger: pool.ledger.clone(),
            users: BTreeMap::new(),
            debt_queue: pool.debt_queue.clone(),
            repaid: BTreeMap::new(),
            events: Vec::new(),
            transfers: Vec::new(),
            next_nonce: pool.next_nonce,
        };
        staged.ledger.sync(&staged.schedule, now)?;
        staged.settle_debts(skip)?;
        Ok(staged)
    }

    fn finish(self) -> Changes {
        Changes {
            owner: self.owner,
            schedule: self.schedule,
            ledger: self.ledger,
            users: self.users,
            debt_queue: self.debt_queue,
            events: self.events,
            transfers: self.transfers,
            next_nonce: self.next_nonce,
        }
    }

    fn token_count(&self) -> usize {
        self.ledger.token_count()
    }

    fn require_owner(&self, sender: &Address) -> Result<()> {
        if *sender != self.owner {
            return Err(FarmError::Unauthorized);
        }
        Ok(())
    }

    fn load(&self, who: &Address) -> UserAccount {
        self.users
            .get(who)
            .or_else(|| self.base.get(who))
            .cloned()
            .unwrap_or_else(|| UserAccount::new(self.token_count(), self.now))
    }

    fn store(&mut self, who: Address, user: UserAccount) {
        self.users.insert(who, user);
    }

    fn request(&mut self, asset: Asset, recipient: Address, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let nonce = self.next_nonce;
        self.next_nonce = nonce.checked_add(1).ok_or(FarmError::ArithmeticOverflow)?;
        self.transfers.push(TransferRequest {
            nonce,
            asset,
            recipient,
            amount,
        });
        Ok(())
    }

    fn pay_rewards(&mut self, recipient: Address, amounts: &TokenVec<Amount>) -> Result<()> {
        for (token, amount) in amounts.iter().enumerate() {
            self.request(Asset::Reward(token), recipient, *amount)?;
        }
        Ok(())
    }

    /// Walk each token's debtor queue oldest first, paying from the free balance
    fn settle_debts(&mut self, skip: Option<&Address>) -> Result<()> {
        for token in 0..self.token_count() {
            let mut queue = std::mem::take(&mut self.debt_queue[token]);
            let mut kept = VecDeque::with_capacity(queue.len());
            while let Some(who) = queue.pop_front() {
                if self.ledger.reward_token_balance[token] == 0 || skip == Some(&who) {
                    kept.push_back(who);
                    continue;
                }
                let mut user = self.load(&who);
                let got = user.repay_debt(&mut self.ledger, token)?;
                let still_owed = user.pool_debt[token] > 0;
                self.store(who, user);
                if got > 0 {
                    debug!("repaid {} of token {} to {}", got, token, who);
                    self.request(Asset::Reward(token), who, got)?;
                    self.events.push(FarmEvent::DebtRepaid {
                        user: who,
                        token,
                        amount: got,
                    });
                    let n = self.token_count();
                    let entry = self.repaid.entry(who).or_insert_with(|| zeroed(n));
                    entry[token] = add(entry[token], got)?;
                }
                if still_owed {
                    kept.push_back(who);
                }
            }
            self.debt_queue[token] = kept;
        }
        Ok(())
    }

    /// Accrue `who` and request its payout. The caller stores the account back.
    fn accrue(&mut self, who: Address) -> Result<(UserAccount, Outcome)> {
        let mut user = self.load(&who);
        let Accrual {
            paid, debt_added, ..
        } = user.accrue(&mut self.ledger, &self.schedule, &self.vesting, self.now)?;

        for (token, added) in debt_added.iter().enumerate() {
            if *added == 0 {
                continue;
            }
            warn!("reward shortfall for {}: token {} owes {}", who, token, added);
            self.events.push(FarmEvent::RewardDebt {
                user: who,
                token,
                amount: *added,
            });
            if !self.debt_queue[token].contains(&who) {
                self.debt_queue[token].push_back(who);
            }
        }
        self.pay_rewards(who, &paid)?;

        let mut reward = paid;
        if let Some(repaid) = self.repaid.get(&who) {
            for (r, extra) in reward.iter_mut().zip(repaid.iter()) {
                *r = add(*r, *extra)?;
            }
        }
        let outcome = Outcome {
            reward,
            debt: user.pool_debt.clone(),
        };
        Ok((user, outcome))
    }
}

// ============================================================================
// Operations
// ============================================================================

impl Pool {
    /// Create a pool; `now` seeds `last_reward_time`
    pub fn new(config: PoolConfig, now: Timestamp) -> Result<Self> {
        let vesting = VestingParams::new(config.vesting_period, config.vesting_ratio)?;
        let schedule = RewardSchedule::new(config.reward_rounds, config.reward_token_count)?;
        let n = config.reward_token_count;
        Ok(Self {
            owner: config.owner,
            ledger_account: config.ledger_account,
            vesting,
            withdraw_all_lock_period: config.withdraw_all_lock_period,
            schedule,
            ledger: PoolLedger::new(n, now),
            users: BTreeMap::new(),
            debt_queue: vec![VecDeque::new(); n],
            replay: ReplayGuard::new(),
            next_nonce: 0,
            unacknowledged: BTreeMap::new(),
            events: Vec::new(),
            outbox: Vec::new(),
        })
    }

    fn transact<T>(
        &mut self,
        now: Timestamp,
        skip: Option<&Address>,
        op: impl FnOnce(&mut Staged<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut staged = Staged::begin(self, now, skip)?;
        let out = op(&mut staged)?;
        let changes = staged.finish();
        self.commit(changes);
        Ok(out)
    }

    fn commit(&mut self, changes: Changes) {
        self.owner = changes.owner;
        self.schedule = changes.schedule;
        self.ledger = changes.ledger;
        for (who, user) in changes.users {
            if user.is_empty() {
                self.users.remove(&who);
            } else {
                self.users.insert(who, user);
            }
        }
        self.debt_queue = changes.debt_queue;
        self.events.extend(changes.events);
        for transfer in changes.transfers {
            self.unacknowledged.insert(transfer.nonce, transfer.clone());
            self.outbox.push(transfer);
        }
        self.next_nonce = changes.next_nonce;
    }

    /// Stake `amount` received from `sender`, owned by `beneficiary` (or the sender)
    pub fn deposit(
        &mut self,
        sender: Address,
        amount: Amount,
        beneficiary: Option<Address>,
        now: Timestamp,
    ) -> Result<Outcome> {
        let who = beneficiary.unwrap_or(sender);
        self.transact(now, None, |s| {
            let (mut user, outcome) = s.accrue(who)?;
            user.amount = add(user.amount, amount)?;
            s.ledger.total_staked = add(s.ledger.total_staked, amount)?;
            s.store(who, user);
            s.events.push(FarmEvent::Deposit {
                user: who,
                amount,
                reward: outcome.reward.clone(),
                debt: outcome.debt.clone(),
            });
            Ok(outcome)
        })
    }

    pub fn withdraw(&mut self, who: Address, amount: Amount, now: Timestamp) -> Result<Outcome> {
        if amount == 0 {
            return Err(FarmError::InvalidAmount);
        }
        self.transact(now, None, |s| {
            let staked = s.load(&who).amount;
            if amount > staked {
                return Err(FarmError::InsufficientStake {
                    requested: amount,
                    staked,
                });
            }
            let (mut user, outcome) = s.accrue(who)?;
            user.amount = sub(user.amount, amount)?;
            s.ledger.total_staked = sub(s.ledger.total_staked, amount)?;
            s.store(who, user);
            s.request(Asset::Stake, who, amount)?;
            s.events.push(FarmEvent::Withdraw {
                user: who,
                amount,
                reward: outcome.reward.clone(),
                debt: outcome.debt.clone(),
            });
            Ok(outcome)
        })
    }

    pub fn withdraw_all(&mut self, who: Address, now: Timestamp) -> Result<Outcome> {
        let staked = self.users.get(&who).map(|u| u.amount).unwrap_or(0);
        self.withdraw(who, staked, now)
    }

    /// Pay out what is due without touching the stake
    pub fn claim(&mut self, who: Address, now: Timestamp) -> Result<Outcome> {
        self.transact(now, None, |s| {
            let (user, outcome) = s.accrue(who)?;
            s.store(who, user);
            s.events.push(FarmEvent::Claim {
                user: who,
                reward: outcome.reward.clone(),
                debt: outcome.debt.clone(),
            });
            Ok(outcome)
        })
    }

    /// Return the whole stake with no reward transfer. Reward accrued this
    /// call and the vesting bucket are credited to `unclaimed_reward`.
    pub fn safe_withdraw(&mut self, who: Address, now: Timestamp) -> Result<Outcome> {
        self.transact(now, Some(&who), |s| {
            let mut user = s.load(&who);
            let amount = user.amount;
            if amount == 0 {
                return Err(FarmError::InvalidAmount);
            }
            let discarded = user.discard(&mut s.ledger, &s.schedule, s.now)?;
            user.amount = 0;
            s.ledger.total_staked = sub(s.ledger.total_staked, amount)?;
            let debt = user.pool_debt.clone();
            s.store(who, user);
            s.request(Asset::Stake, who, amount)?;
            s.events.push(FarmEvent::SafeWithdraw {
                user: who,
                amount,
                discarded,
            });
            Ok(Outcome {
                reward: zeroed(s.token_count()),
                debt,
            })
        })
    }

    /// Reward funding received for `token`
    pub fn deposit_reward(&mut self, token: usize, amount: Amount, now: Timestamp) -> Result<()> {
        if amount == 0 {
            return Err(FarmError::InvalidAmount);
        }
        self.transact(now, None, |s| {
            s.ledger.fund(token, amount)?;
            s.events.push(FarmEvent::RewardDeposit { token, amount });
            Ok(())
        })
    }

    pub fn add_reward_round(
        &mut self,
        sender: Address,
        start_time: Timestamp,
        reward_per_second: &[Amount],
        now: Timestamp,
    ) -> Result<()> {
        self.transact(now, None, |s| {
            s.require_owner(&sender)?;
            let rates = token_vec(reward_per_second, s.token_count())?;
            s.schedule
                .add_round(RewardRound::new(start_time, rates.clone()), s.now)?;
            s.events.push(FarmEvent::RewardRoundAdded {
                start_time,
                reward_per_second: rates,
            });
            Ok(())
        })
    }

    pub fn set_end_time(&mut self, sender: Address, end_time: Timestamp, now: Timestamp) -> Result<()> {
        self.transact(now, None, |s| {
            s.require_owner(&sender)?;
            s.schedule.set_end_time(end_time, s.now)?;
            s.events.push(FarmEvent::FarmEndSet { end_time });
            Ok(())
        })
    }

    /// Pay the owner the reward that accrued while nothing was staked,
    /// capped at the free balance
    pub fn withdraw_unclaimed(&mut self, sender: Address, now: Timestamp) -> Result<TokenVec<Amount>> {
        self.transact(now, None, |s| {
            s.require_owner(&sender)?;
            let mut paid = zeroed(s.token_count());
            for token in 0..s.token_count() {
                let owed = s.ledger.unclaimed_reward[token];
                let got = s.ledger.pay_operator(token, owed)?;
                s.ledger.settle_unclaimed(token, got)?;
                paid[token] = got;
            }
            let owner = s.owner;
            s.pay_rewards(owner, &paid)?;
            s.events.push(FarmEvent::UnclaimedWithdrawn {
                owner,
                amount: paid.clone(),
            });
            Ok(paid)
        })
    }

    /// Drain the free reward balance to the owner once the farm has ended
    /// and the lock period has passed. Vesting buckets stay reserved.
    pub fn withdraw_unclaimed_all(&mut self, sender: Address, now: Timestamp) -> Result<TokenVec<Amount>> {
        let lock = self.withdraw_all_lock_period;
        self.transact(now, None, |s| {
            s.require_owner(&sender)?;
            let unlock_at = match s.schedule.end_time() {
                Some(end) => Some(add_time(end, lock)?),
                None => None,
            };
            if !unlock_at.is_some_and(|at| s.now >= at) {
                return Err(FarmError::WithdrawAllLocked { unlock_at });
            }
            let mut paid = zeroed(s.token_count());
            for token in 0..s.token_count() {
                let free = s.ledger.reward_token_balance[token];
                let unclaimed = s.ledger.unclaimed_reward[token];
                paid[token] = s.ledger.pay_operator(token, free)?;
                s.ledger.settle_unclaimed(token, unclaimed)?;
            }
            let owner = s.owner;
            s.pay_rewards(owner, &paid)?;
            s.events.push(FarmEvent::UnclaimedWithdrawn {
                owner,
                amount: paid.clone(),
            });
            Ok(paid)
        })
    }

    pub fn transfer_ownership(&mut self, sender: Address, new_owner: Address, now: Timestamp) -> Result<()> {
        self.transact(now, None, |s| {
            s.require_owner(&sender)?;
            let previous = s.owner;
            s.owner = new_owner;
            s.events.push(FarmEvent::OwnershipTransferred {
                previous,
                owner: new_owner,
            });
            Ok(())
        })
    }

    /// Record that the ledger executed transfer `nonce`
    pub fn acknowledge_transfer(&mut self, nonce: u64) -> Result<TransferRequest> {
        let transfer = self
            .unacknowledged
            .remove(&nonce)
            .ok_or(FarmError::UnknownTransfer(nonce))?;
        self.events.push(FarmEvent::TransferAcknowledged { nonce });
        Ok(transfer)
    }

    /// Dispatch a command, rejecting a replayed `(sender, nonce)`
    pub fn apply(&mut self, envelope: Envelope, now: Timestamp) -> Result<Receipt> {
        let Envelope {
            sender,
            nonce,
            command,
        } = envelope;
        if command.requires_ledger() && sender != self.ledger_account {
            warn!("{} from {} is not the ledger account", command.name(), sender);
            return Err(FarmError::Unauthorized);
        }
        if let Some(nonce) = nonce {
            self.replay.check(&sender, nonce)?;
        }
        debug!("apply {} from {}", command.name(), sender);

        let receipt = match command {
            Command::Deposit {
                depositor,
                amount,
                beneficiary,
            } => Receipt::Payout(self.deposit(depositor, amount, beneficiary, now)?),
            Command::DepositReward { token, amount } => {
                self.deposit_reward(token, amount, now)?;
                Receipt::Done
            }
            Command::Withdraw { amount } => Receipt::Payout(self.withdraw(sender, amount, now)?),
            Command::WithdrawAll => Receipt::Payout(self.withdraw_all(sender, now)?),
            Command::Claim => Receipt::Payout(self.claim(sender, now)?),
            Command::SafeWithdraw => Receipt::Payout(self.safe_withdraw(sender, now)?),
            Command::AddRewardRound {
                start_time,
                reward_per_second,
            } => {
                self.add_reward_round(sender, start_time, &reward_per_second, now)?;
                Receipt::Done
            }
            Command::SetEndTime { end_time } => {
                self.set_end_time(sender, end_time, now)?;
                Receipt::Done
            }
            Command::WithdrawUnclaimed => Receipt::Unclaimed {
                amount: self.withdraw_unclaimed(sender, now)?,
            },
            Command::WithdrawUnclaimedAll => Receipt::Unclaimed {
                amount: self.withdraw_unclaimed_all(sender, now)?,
            },
            Command::TransferOwnership { new_owner } => {
                self.transfer_ownership(sender, new_owner, now)?;
                Receipt::Done
            }
            Command::AcknowledgeTransfer { nonce } => {
                self.acknowledge_transfer(nonce)?;
                Receipt::Done
            }
        };

        if let Some(nonce) = nonce {
            self.replay.record(sender, nonce);
        }
        Ok(receipt)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get_details(&self) -> PoolDetails {
        PoolDetails {
            owner: self.owner,
            ledger_account: self.ledger_account,
            total_staked: self.ledger.total_staked,
            acc_reward_per_share: self.ledger.acc_reward_per_share.clone(),
            last_reward_time: self.ledger.last_reward_time,
            reward_token_balance: self.ledger.reward_token_balance.clone(),
            reward_token_balance_cumulative: self.ledger.reward_token_balance_cumulative.clone(),
            unclaimed_reward: self.ledger.unclaimed_reward.clone(),
            total_pool_debt: self.ledger.total_pool_debt.clone(),
            reserved_entitled: self.ledger.reserved_entitled.clone(),
            unreserved_entitled: self.ledger.unreserved_entitled.clone(),
            reward_rounds: self.schedule.rounds().to_vec(),
            end_time: self.schedule.end_time(),
            vesting_period: self.vesting.vesting_period,
            vesting_ratio: self.vesting.vesting_ratio,
            withdraw_all_lock_period: self.withdraw_all_lock_period,
        }
    }

    pub fn get_user_details(&self, who: &Address) -> UserDetails {
        let user = self
            .users
            .get(who)
            .cloned()
            .unwrap_or_else(|| UserAccount::new(self.ledger.token_count(), 0));
        UserDetails {
            amount: user.amount,
            state: user.state(),
            reward_debt: user.reward_debt,
            entitled: user.entitled,
            unreserved: user.unreserved,
            vesting_time: user.vesting_time,
            pool_debt: user.pool_debt,
            last_reward_time: user.last_reward_time,
        }
    }

    pub fn user_state(&self, who: &Address) -> UserState {
        self.users
            .get(who)
            .map(|u| u.state())
            .unwrap_or(UserState::Nonexistent)
    }

    /// Preview a claim at `now` on a scratch copy
    pub fn pending_reward(&self, who: &Address, now: Timestamp) -> Result<PendingReward> {
        let mut scratch = self.clone();
        let outcome = scratch.claim(*who, now)?;
        let user = scratch.get_user_details(who);
        Ok(PendingReward {
            payable: outcome.reward,
            entitled: user.entitled,
            vesting_time: user.vesting_time,
            pool_debt: user.pool_debt,
        })
    }

    pub fn take_events(&mut self) -> Vec<FarmEvent> {
        std::mem::take(&mut self.events)
    }

    /// Transfer requests produced since the last call
    pub fn take_transfers(&mut self) -> Vec<TransferRequest> {
        std::mem::take(&mut self.outbox)
    }

    /// Requested transfers not yet acknowledged, oldest first
    pub fn unacknowledged(&self) -> impl Iterator<Item = &TransferRequest> {
        self.unacknowledged.values()
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn ledger_account(&self) -> &Address {
        &self.ledger_account
    }

    pub fn ledger(&self) -> &PoolLedger {
        &self.ledger
    }

    pub fn schedule(&self) -> &RewardSchedule {
        &self.schedule
    }

    pub fn vesting(&self) -> &VestingParams {
        &self.vesting
    }

    pub fn users(&self) -> &BTreeMap<Address, UserAccount> {
        &self.users
    }

    pub fn debt_queue(&self, token: usize) -> Option<&VecDeque<Address>> {
        self.debt_queue.get(token)
    }

    pub fn token_count(&self) -> usize {
        self.ledger.token_count()
    }
}
