//! Invariant checking helpers

use crate::math::sum_u128;
use crate::pool::Pool;
use crate::state::PoolLedger;

/// Free balance + reserved buckets + everything paid == everything funded, per token
pub fn funds_conserved(p: &Pool) -> bool {
    let l = p.ledger();
    (0..l.token_count()).all(|t| {
        l.reward_token_balance[t]
            .checked_add(l.reserved_entitled[t])
            .and_then(|v| v.checked_add(l.total_paid[t]))
            == Some(l.reward_token_balance_cumulative[t])
    })
}

/// Reserved funds equal the backed part of every vesting bucket, and the
/// unbacked parts add up to the ledger's total
pub fn reserved_matches_entitled(p: &Pool) -> bool {
    let l = p.ledger();
    (0..l.token_count()).all(|t| {
        let users = p.users().values();
        let within = users.clone().all(|u| u.unreserved[t] <= u.entitled[t]);
        let backed = sum_u128(users.clone().map(|u| u.entitled[t].saturating_sub(u.unreserved[t])));
        let unbacked = sum_u128(users.map(|u| u.unreserved[t]));
        within && backed == l.reserved_entitled[t] && unbacked == l.unreserved_entitled[t]
    })
}

/// Pool debt total matches participants, and every debtor is queued for settlement
pub fn debt_matches_users(p: &Pool) -> bool {
    let l = p.ledger();
    (0..l.token_count()).all(|t| {
        let total = sum_u128(p.users().values().map(|u| u.pool_debt[t]));
        let queued = p.users().iter().filter(|(_, u)| u.pool_debt[t] > 0).all(|(who, _)| {
            p.debt_queue(t).is_some_and(|q| q.contains(who))
        });
        total == l.total_pool_debt[t] && queued
    })
}

pub fn stake_matches_users(p: &Pool) -> bool {
    sum_u128(p.users().values().map(|u| u.amount)) == p.ledger().total_staked
}

/// Nothing owed or paid to stakers and operator exceeds what the schedule emitted
pub fn no_overmint(p: &Pool) -> bool {
    let l = p.ledger();
    (0..l.token_count()).all(|t| {
        sum_u128([
            l.staker_paid[t],
            l.reserved_entitled[t],
            l.unreserved_entitled[t],
            l.total_pool_debt[t],
            l.unclaimed_reward[t],
            l.unclaimed_withdrawn[t],
        ]) <= l.total_emitted[t]
    })
}

/// Accumulators never decrease
pub fn accumulator_monotonic(before: &PoolLedger, after: &PoolLedger) -> bool {
    before.acc_reward_per_share.len() == after.acc_reward_per_share.len()
        && before
            .acc_reward_per_share
            .iter()
            .zip(after.acc_reward_per_share.iter())
            .all(|(a, b)| b >= a)
        && after.last_reward_time >= before.last_reward_time
}

/// Names of every violated invariant; empty when the pool is sound
pub fn audit(p: &Pool) -> Vec<&'static str> {
    let checks: [(&'static str, fn(&Pool) -> bool); 5] = [
        ("funds_conserved", funds_conserved),
        ("reserved_matches_entitled", reserved_matches_entitled),
        ("debt_matches_users", debt_matches_users),
        ("stake_matches_users", stake_matches_users),
        ("no_overmint", no_overmint),
    ];
    checks
        .iter()
        .filter(|(_, check)| !check(p))
        .map(|(name, _)| *name)
        .collect()
}
