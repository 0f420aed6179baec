//! Engine error taxonomy
//!
//! Every variant aborts the operation that produced it without mutating the
//! pool. A reward shortfall is not an error: it becomes `pool_debt` and is
//! reported through `FarmEvent::RewardDebt`.

use crate::state::{Amount, Timestamp};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FarmError {
    /// Reward round ordering or farm end time rejected
    #[error("invalid reward schedule: {0}")]
    InvalidSchedule(&'static str),

    /// Withdraw exceeds the participant's stake
    #[error("insufficient stake: requested {requested}, staked {staked}")]
    InsufficientStake { requested: Amount, staked: Amount },

    /// Checked arithmetic failed; the operation is aborted
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    #[error("amount must be greater than zero")]
    InvalidAmount,

    /// Caller is not the pool owner
    #[error("caller is not the pool owner")]
    Unauthorized,

    #[error("reward vector has {got} entries, pool has {expected} reward tokens")]
    TokenCountMismatch { expected: usize, got: usize },

    #[error("unknown reward token index {0}")]
    UnknownToken(usize),

    /// Vesting ratio above `MAX_VESTING_RATIO`
    #[error("invalid vesting parameters")]
    InvalidVesting,

    /// Inbound notification already applied
    #[error("duplicate notification nonce {0}")]
    DuplicateNonce(u64),

    #[error("withdraw-all is locked until {unlock_at:?}")]
    WithdrawAllLocked { unlock_at: Option<Timestamp> },

    #[error("no outstanding transfer with nonce {0}")]
    UnknownTransfer(u64),
}

pub type Result<T> = core::result::Result<T, FarmError>;
