//! Periodic invariant audit of hosted pools

use farm_engine::helpers::audit;
use farm_engine::Pool;

/// Outcome of auditing one pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub pool: String,
    pub violations: Vec<&'static str>,
    pub total_staked: u128,
    pub participants: usize,
    /// Outstanding pool debt per reward token
    pub debt: Vec<u128>,
    /// Vesting reward not yet backed by funds, per reward token
    pub unreserved: Vec<u128>,
}

impl AuditReport {
    pub fn is_sound(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn has_debt(&self) -> bool {
        self.debt.iter().any(|d| *d > 0)
    }

}

/// Check every ledger invariant of `pool`
pub fn audit_pool(name: &str, pool: &Pool) -> AuditReport {
    AuditReport {
        pool: name.to_string(),
        violations: audit(pool),
        total_staked: pool.ledger().total_staked,
        participants: pool.users().len(),
        debt: pool.ledger().total_pool_debt.to_vec(),
        unreserved: pool.ledger().unreserved_entitled.to_vec(),
    }
}

/// Log a report: warn on violations or outstanding debt, debug otherwise
pub fn log_report(report: &AuditReport) {
    if !report.is_sound() {
        log::warn!(
            "Pool {} failed audit: {}",
            report.pool,
            report.violations.join(", ")
        );
    }
    if report.has_debt() {
        log::warn!("Pool {} has unpaid reward debt {:?}", report.pool, report.debt);
    }
    if report.unreserved.iter().any(|u| *u > 0) {
        log::info!("Pool {} has unbacked vesting reward {:?}", report.pool, report.unreserved);
    }
    log::debug!(
        "Pool {}: {} participants, {} staked",
        report.pool,
        report.participants,
        report.total_staked
    );
}
