//! Reward emission schedule
//!
//! An ordered list of reward rounds, each fixing a per-second rate vector
//! from its start time until the next round starts or the farm ends.
//! Integration over an interval is exact integer arithmetic: the interval
//! is partitioned at every round start and at farm end.

use serde::{Deserialize, Serialize};

use crate::error::{FarmError, Result};
use crate::math::{add, mul};
use crate::state::{zeroed, Amount, Timestamp, TokenVec, MAX_REWARD_TOKENS};

/// One schedule entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRound {
    pub start_time: Timestamp,
    pub reward_per_second: TokenVec<Amount>,
}

impl RewardRound {
    pub fn new(start_time: Timestamp, reward_per_second: TokenVec<Amount>) -> Self {
        Self {
            start_time,
            reward_per_second,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSchedule {
    rounds: Vec<RewardRound>,
    end_time: Option<Timestamp>,
    token_count: usize,
}

impl RewardSchedule {
    /// Build a schedule, validating ordering and rate vector widths
    pub fn new(rounds: Vec<RewardRound>, token_count: usize) -> Result<Self> {
        if token_count == 0 || token_count > MAX_REWARD_TOKENS {
            return Err(FarmError::TokenCountMismatch {
                expected: MAX_REWARD_TOKENS,
                got: token_count,
            });
        }
        if rounds.is_empty() {
            return Err(FarmError::InvalidSchedule("at least one reward round is required"));
        }
        for round in &rounds {
            check_width(round, token_count)?;
        }
        if rounds.windows(2).any(|w| w[1].start_time <= w[0].start_time) {
            return Err(FarmError::InvalidSchedule("round start times must strictly increase"));
        }
        Ok(Self {
            rounds,
            end_time: None,
            token_count,
        })
    }

    pub fn rounds(&self) -> &[RewardRound] {
        &self.rounds
    }

    pub fn end_time(&self) -> Option<Timestamp> {
        self.end_time
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }

    fn last_start(&self) -> Timestamp {
        self.rounds.last().map(|r| r.start_time).unwrap_or(0)
    }

    /// Rate vector effective at `t`; zero before the first round and from farm end on
    pub fn rate_at(&self, t: Timestamp) -> TokenVec<Amount> {
        if self.end_time.is_some_and(|end| t >= end) {
            return zeroed(self.token_count);
        }
        self.rounds
            .iter()
            .rev()
            .find(|r| r.start_time <= t)
            .map(|r| r.reward_per_second.clone())
            .unwrap_or_else(|| zeroed(self.token_count))
    }

    /// Total emitted per token over `[t0, t1)`
    pub fn integrate(&self, t0: Timestamp, t1: Timestamp) -> Result<TokenVec<Amount>> {
        let mut total = zeroed(self.token_count);
        let t1 = match self.end_time {
            Some(end) => t1.min(end),
            None => t1,
        };
        if t1 <= t0 {
            return Ok(total);
        }

        for (i, round) in self.rounds.iter().enumerate() {
            let seg_end = self
                .rounds
                .get(i + 1)
                .map(|next| next.start_time)
                .unwrap_or(Timestamp::MAX);
            let from = round.start_time.max(t0);
            let to = seg_end.min(t1);
            if to <= from {
                continue;
            }
            let len = u128::from(to - from);
            for (acc, rate) in total.iter_mut().zip(round.reward_per_second.iter()) {
                *acc = add(*acc, mul(*rate, len)?)?;
            }
        }
        Ok(total)
    }

    /// Append a round; it must start strictly after the last one and not in the past
    pub fn add_round(&mut self, round: RewardRound, now: Timestamp) -> Result<()> {
        check_width(&round, self.token_count)?;
        if round.start_time <= self.last_start() {
            return Err(FarmError::InvalidSchedule("round must start after the last round"));
        }
        if round.start_time < now {
            return Err(FarmError::InvalidSchedule("round cannot start in the past"));
        }
        if self.end_time.is_some_and(|end| round.start_time > end) {
            return Err(FarmError::InvalidSchedule("round starts after farm end"));
        }
        self.rounds.push(round);
        Ok(())
    }

    /// Set the farm end; it cannot precede the last round or `now`
    pub fn set_end_time(&mut self, end_time: Timestamp, now: Timestamp) -> Result<()> {
        if end_time < self.last_start() {
            return Err(FarmError::InvalidSchedule("end time precedes last round start"));
        }
        if end_time < now {
            return Err(FarmError::InvalidSchedule("end time cannot be in the past"));
        }
        self.end_time = Some(end_time);
        Ok(())
    }
}

fn check_width(round: &RewardRound, token_count: usize) -> Result<()> {
    if round.reward_per_second.len() != token_count {
        return Err(FarmError::TokenCountMismatch {
            expected: token_count,
            got: round.reward_per_second.len(),
        });
    }
    Ok(())
}
