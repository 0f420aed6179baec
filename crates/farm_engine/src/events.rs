//! Observable side effects of pool operations

use serde::{Deserialize, Serialize};

use crate::state::{Address, Amount, Timestamp, TokenVec};

/// Asset moved by a transfer request
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Asset {
    /// The staked base asset
    Stake,
    /// Reward token by index
    Reward(usize),
}

/// Outbound transfer the external ledger is asked to execute
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Pool-local, strictly increasing
    pub nonce: u64,
    pub asset: Asset,
    pub recipient: Address,
    pub amount: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum FarmEvent {
    Deposit {
        user: Address,
        amount: Amount,
        reward: TokenVec<Amount>,
        debt: TokenVec<Amount>,
    },
    Withdraw {
        user: Address,
        amount: Amount,
        reward: TokenVec<Amount>,
        debt: TokenVec<Amount>,
    },
    Claim {
        user: Address,
        reward: TokenVec<Amount>,
        debt: TokenVec<Amount>,
    },
    RewardDeposit {
        token: usize,
        amount: Amount,
    },
    /// Shortfall recorded as `pool_debt`
    RewardDebt {
        user: Address,
        token: usize,
        amount: Amount,
    },
    DebtRepaid {
        user: Address,
        token: usize,
        amount: Amount,
    },
    SafeWithdraw {
        user: Address,
        amount: Amount,
        discarded: TokenVec<Amount>,
    },
    RewardRoundAdded {
        start_time: Timestamp,
        reward_per_second: TokenVec<Amount>,
    },
    FarmEndSet {
        end_time: Timestamp,
    },
    UnclaimedWithdrawn {
        owner: Address,
        amount: TokenVec<Amount>,
    },
    OwnershipTransferred {
        previous: Address,
        owner: Address,
    },
    TransferAcknowledged {
        nonce: u64,
    },
}
