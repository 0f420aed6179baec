//! Serializable pool commands, dispatched by `Pool::apply`

use serde::{Deserialize, Serialize};

use crate::pool::Outcome;
use crate::state::{Address, Amount, Timestamp, TokenVec};

/// Externally tagged on the wire: `"claim"`, `{"withdraw":{"amount":5}}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Stake received from `depositor`, credited to `beneficiary` if given
    Deposit {
        depositor: Address,
        amount: Amount,
        #[serde(default)]
        beneficiary: Option<Address>,
    },
    /// Reward funding received
    DepositReward { token: usize, amount: Amount },
    Withdraw { amount: Amount },
    WithdrawAll,
    Claim,
    SafeWithdraw,
    AddRewardRound {
        start_time: Timestamp,
        reward_per_second: Vec<Amount>,
    },
    SetEndTime { end_time: Timestamp },
    WithdrawUnclaimed,
    WithdrawUnclaimedAll,
    TransferOwnership { new_owner: Address },
    AcknowledgeTransfer { nonce: u64 },
}

impl Command {
    /// Commands reporting value received by the ledger
    pub fn is_notification(&self) -> bool {
        matches!(self, Command::Deposit { .. } | Command::DepositReward { .. })
    }

    /// Only the pool's ledger account may send these
    pub fn requires_ledger(&self) -> bool {
        self.is_notification() || matches!(self, Command::AcknowledgeTransfer { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Deposit { .. } => "deposit",
            Command::DepositReward { .. } => "deposit_reward",
            Command::Withdraw { .. } => "withdraw",
            Command::WithdrawAll => "withdraw_all",
            Command::Claim => "claim",
            Command::SafeWithdraw => "safe_withdraw",
            Command::AddRewardRound { .. } => "add_reward_round",
            Command::SetEndTime { .. } => "set_end_time",
            Command::WithdrawUnclaimed => "withdraw_unclaimed",
            Command::WithdrawUnclaimedAll => "withdraw_unclaimed_all",
            Command::TransferOwnership { .. } => "transfer_ownership",
            Command::AcknowledgeTransfer { .. } => "acknowledge_transfer",
        }
    }
}

/// A command with its origin. `nonce`, when present, is deduplicated per sender.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: Address,
    #[serde(default)]
    pub nonce: Option<u64>,
    pub command: Command,
}

/// Result of an applied command
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Receipt {
    Payout(Outcome),
    Unclaimed { amount: TokenVec<Amount> },
    Done,
}
