//! Pool ledger and participant state

use arrayvec::ArrayVec;
pub use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::{FarmError, Result};
use crate::schedule::RewardRound;

/// Upper bound on reward tokens per pool
pub const MAX_REWARD_TOKENS: usize = 8;

/// Fixed-point scale of `acc_reward_per_share` (1e18)
pub const SCALING_FACTOR: u128 = 1_000_000_000_000_000_000;

pub type Amount = u128;
pub type Timestamp = u64;

/// One entry per reward token
pub type TokenVec<T> = ArrayVec<T, MAX_REWARD_TOKENS>;

/// Vector of `n` default values (truncated to `MAX_REWARD_TOKENS`)
pub fn zeroed<T: Default>(n: usize) -> TokenVec<T> {
    debug_assert!(n <= MAX_REWARD_TOKENS, "{} reward tokens exceeds the cap", n);
    let mut v = TokenVec::new();
    for _ in 0..n.min(MAX_REWARD_TOKENS) {
        v.push(T::default());
    }
    v
}

/// Copy a slice into a token vector, checking its length
pub fn token_vec(values: &[Amount], expected: usize) -> Result<TokenVec<Amount>> {
    if values.len() != expected || expected > MAX_REWARD_TOKENS {
        return Err(FarmError::TokenCountMismatch {
            expected,
            got: values.len(),
        });
    }
    Ok(values.iter().copied().collect())
}

// ============================================================================
// Participant identity
// ============================================================================

/// 32-byte participant identity, base58 on the wire
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; 32]);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("invalid base58: {0}")]
    Base58(String),
    #[error("expected 32 bytes, got {0}")]
    Length(usize),
}

impl Address {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| AddressParseError::Base58(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressParseError::Length(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressParseError;

    fn try_from(s: String) -> core::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Address> for String {
    fn from(a: Address) -> String {
        a.to_string()
    }
}

// ============================================================================
// Pool construction parameters
// ============================================================================

/// Parameters a pool is created with
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub owner: Address,
    /// Only principal allowed to report inbound transfers and acknowledge outbound ones
    pub ledger_account: Address,
    pub reward_rounds: Vec<RewardRound>,
    pub reward_token_count: usize,
    /// Seconds over which the vesting part of a reward is released
    pub vesting_period: Timestamp,
    /// Share of each reward that vests, out of `MAX_VESTING_RATIO`
    pub vesting_ratio: u32,
    /// Delay after farm end before the owner may drain the reward balance
    pub withdraw_all_lock_period: Timestamp,
}

// ============================================================================
// Pool ledger
// ============================================================================

/// Global accounting state of one pool
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLedger {
    pub total_staked: Amount,
    /// Reward per staked unit since inception, scaled by `SCALING_FACTOR`
    pub acc_reward_per_share: TokenVec<U256>,
    pub last_reward_time: Timestamp,
    /// Free reward funds available for payouts
    pub reward_token_balance: TokenVec<Amount>,
    /// Everything ever deposited as reward funding
    pub reward_token_balance_cumulative: TokenVec<Amount>,
    /// Reward emitted while nothing was staked (operator-owed)
    pub unclaimed_reward: TokenVec<Amount>,
    pub total_emitted: TokenVec<Amount>,
    /// Sum of every participant's `pool_debt`
    pub total_pool_debt: TokenVec<Amount>,
    /// Funded part of every participant's `entitled`, held out of the free balance
    pub reserved_entitled: TokenVec<Amount>,
    /// Sum of every participant's `unreserved`
    pub unreserved_entitled: TokenVec<Amount>,
    /// Every reward transfer requested (stakers and operator)
    pub total_paid: TokenVec<Amount>,
    pub staker_paid: TokenVec<Amount>,
    /// Unclaimed reward settled to the operator
    pub unclaimed_withdrawn: TokenVec<Amount>,
}

impl PoolLedger {
    pub fn new(token_count: usize, start_time: Timestamp) -> Self {
        Self {
            total_staked: 0,
            acc_reward_per_share: zeroed(token_count),
            last_reward_time: start_time,
            reward_token_balance: zeroed(token_count),
            reward_token_balance_cumulative: zeroed(token_count),
            unclaimed_reward: zeroed(token_count),
            total_emitted: zeroed(token_count),
            total_pool_debt: zeroed(token_count),
            reserved_entitled: zeroed(token_count),
            unreserved_entitled: zeroed(token_count),
            total_paid: zeroed(token_count),
            staker_paid: zeroed(token_count),
            unclaimed_withdrawn: zeroed(token_count),
        }
    }

    pub fn token_count(&self) -> usize {
        self.acc_reward_per_share.len()
    }
}

// ============================================================================
// Participant account
// ============================================================================

/// Per-participant state, owned by the pool
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    /// Currently staked
    pub amount: Amount,
    /// `acc_reward_per_share` at the last checkpoint
    pub reward_debt: TokenVec<U256>,
    /// Earned but still vesting
    pub entitled: TokenVec<Amount>,
    /// Part of `entitled` not yet backed by reserved funds
    pub unreserved: TokenVec<Amount>,
    /// When `entitled` is fully released if nothing else is deposited
    pub vesting_time: TokenVec<Timestamp>,
    /// Owed but unpaid for lack of reward balance
    pub pool_debt: TokenVec<Amount>,
    /// Time of the last checkpoint
    pub last_reward_time: Timestamp,
}

impl UserAccount {
    pub fn new(token_count: usize, now: Timestamp) -> Self {
        Self {
            amount: 0,
            reward_debt: zeroed(token_count),
            entitled: zeroed(token_count),
            unreserved: zeroed(token_count),
            vesting_time: zeroed(token_count),
            pool_debt: zeroed(token_count),
            last_reward_time: now,
        }
    }

    /// A zeroed, rewardless record is logically absent
    pub fn is_empty(&self) -> bool {
        self.amount == 0
            && self.entitled.iter().all(|e| *e == 0)
            && self.pool_debt.iter().all(|d| *d == 0)
    }

    pub fn state(&self) -> UserState {
        if self.amount > 0 {
            UserState::Staking
        } else if self.is_empty() {
            UserState::Nonexistent
        } else {
            UserState::Idle
        }
    }
}

/// Participant lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserState {
    Nonexistent,
    /// amount > 0
    Staking,
    /// amount == 0 with entitled or pool_debt outstanding
    Idle,
}
