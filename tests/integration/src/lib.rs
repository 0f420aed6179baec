//! Farm Integration Tests
//!
//! Drives a pool through a simulated external ledger: transfers requested by
//! the engine are executed into wallets and acknowledged, and the clock only
//! moves forward when a test advances it.

use farm_engine::{
    Address, Amount, Asset, FarmEvent, Outcome, Pool, PoolConfig, Result, RewardRound, Timestamp,
    TokenVec, TransferRequest,
};
use std::collections::HashMap;

pub const OWNER: Address = Address::new([0xEE; 32]);
/// Account the simulated ledger reports inbound transfers as
pub const LEDGER: Address = Address::new([0xDD; 32]);

/// Participant by index
pub fn addr(idx: u8) -> Address {
    let mut bytes = [0u8; 32];
    bytes[0] = idx;
    bytes[31] = 0x5A;
    Address::new(bytes)
}

pub fn rates(values: &[Amount]) -> TokenVec<Amount> {
    values.iter().copied().collect()
}

/// External ledger stand-in: executes every requested transfer
#[derive(Debug, Default)]
pub struct SimulatedLedger {
    wallets: HashMap<(Address, Asset), Amount>,
    executed: Vec<TransferRequest>,
}

impl SimulatedLedger {
    /// Execute and acknowledge everything the pool requested
    pub fn settle(&mut self, pool: &mut Pool) {
        for transfer in pool.take_transfers() {
            *self
                .wallets
                .entry((transfer.recipient, transfer.asset))
                .or_default() += transfer.amount;
            if let Err(e) = pool.acknowledge_transfer(transfer.nonce) {
                log::warn!("ack of {} failed: {}", transfer.nonce, e);
            }
            self.executed.push(transfer);
        }
    }

    pub fn balance(&self, who: &Address, asset: Asset) -> Amount {
        self.wallets.get(&(*who, asset)).copied().unwrap_or(0)
    }

    /// Everything paid out of the pool in reward token `token`
    pub fn total_paid(&self, token: usize) -> Amount {
        self.wallets
            .iter()
            .filter(|((_, asset), _)| *asset == Asset::Reward(token))
            .map(|(_, amount)| *amount)
            .sum()
    }

    pub fn executed(&self) -> &[TransferRequest] {
        &self.executed
    }
}

/// Pool, ledger and clock together
pub struct Harness {
    pub pool: Pool,
    pub ledger: SimulatedLedger,
    pub now: Timestamp,
    pub events: Vec<FarmEvent>,
}

impl Harness {
    /// One round starting at time zero
    pub fn new(rate: &[Amount], vesting_period: Timestamp, vesting_ratio: u32) -> Self {
        Self::with_config(PoolConfig {
            owner: OWNER,
            ledger_account: LEDGER,
            reward_rounds: vec![RewardRound::new(0, rates(rate))],
            reward_token_count: rate.len(),
            vesting_period,
            vesting_ratio,
            withdraw_all_lock_period: 100,
        })
    }

    pub fn with_config(config: PoolConfig) -> Self {
        let pool = match Pool::new(config, 0) {
            Ok(pool) => pool,
            Err(e) => panic!("bad test pool config: {}", e),
        };
        Self {
            pool,
            ledger: SimulatedLedger::default(),
            now: 0,
            events: Vec::new(),
        }
    }

    pub fn advance(&mut self, secs: Timestamp) -> &mut Self {
        self.now += secs;
        self
    }

    pub fn at(&mut self, t: Timestamp) -> &mut Self {
        assert!(t >= self.now, "clock only moves forward");
        self.now = t;
        self
    }

    fn after<T>(&mut self, result: Result<T>) -> Result<T> {
        self.ledger.settle(&mut self.pool);
        self.events.extend(self.pool.take_events());
        result
    }

    pub fn fund(&mut self, token: usize, amount: Amount) -> Result<()> {
        let r = self.pool.deposit_reward(token, amount, self.now);
        self.after(r)
    }

    /// Fund every reward token with the same amount
    pub fn fund_all(&mut self, amount: Amount) -> Result<()> {
        for token in 0..self.pool.token_count() {
            self.fund(token, amount)?;
        }
        Ok(())
    }

    pub fn deposit(&mut self, who: Address, amount: Amount) -> Result<Outcome> {
        let r = self.pool.deposit(who, amount, None, self.now);
        self.after(r)
    }

    pub fn withdraw(&mut self, who: Address, amount: Amount) -> Result<Outcome> {
        let r = self.pool.withdraw(who, amount, self.now);
        self.after(r)
    }

    pub fn withdraw_all(&mut self, who: Address) -> Result<Outcome> {
        let r = self.pool.withdraw_all(who, self.now);
        self.after(r)
    }

    pub fn claim(&mut self, who: Address) -> Result<Outcome> {
        let r = self.pool.claim(who, self.now);
        self.after(r)
    }

    pub fn safe_withdraw(&mut self, who: Address) -> Result<Outcome> {
        let r = self.pool.safe_withdraw(who, self.now);
        self.after(r)
    }

    pub fn add_round(&mut self, start_time: Timestamp, rate: &[Amount]) -> Result<()> {
        let r = self.pool.add_reward_round(OWNER, start_time, rate, self.now);
        self.after(r)
    }

    pub fn set_end_time(&mut self, end_time: Timestamp) -> Result<()> {
        let r = self.pool.set_end_time(OWNER, end_time, self.now);
        self.after(r)
    }

    pub fn withdraw_unclaimed(&mut self) -> Result<TokenVec<Amount>> {
        let r = self.pool.withdraw_unclaimed(OWNER, self.now);
        self.after(r)
    }

    pub fn withdraw_unclaimed_all(&mut self) -> Result<TokenVec<Amount>> {
        let r = self.pool.withdraw_unclaimed_all(OWNER, self.now);
        self.after(r)
    }

    pub fn reward_of(&self, who: &Address, token: usize) -> Amount {
        self.ledger.balance(who, Asset::Reward(token))
    }

    pub fn stake_returned(&self, who: &Address) -> Amount {
        self.ledger.balance(who, Asset::Stake)
    }

    /// Received by wallets + backed vesting buckets + free balance == funded, per token
    pub fn payouts_conserved(&self) -> bool {
        let details = self.pool.get_details();
        (0..self.pool.token_count()).all(|t| {
            let backed: Amount = self
                .pool
                .users()
                .values()
                .map(|u| u.entitled[t] - u.unreserved[t])
                .sum();
            self.ledger.total_paid(t) + backed + details.reward_token_balance[t]
                == details.reward_token_balance_cumulative[t]
        })
    }

    pub fn total_debt(&self, token: usize) -> Amount {
        self.pool.ledger().total_pool_debt[token]
    }
}
