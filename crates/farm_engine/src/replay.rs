//! Deduplication of inbound ledger notifications

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{FarmError, Result};
use crate::state::Address;

/// Remembers every `(sender, nonce)` pair already applied.
///
/// Nonces per sender need not be contiguous; a sender's nonces below its
/// low-water mark are compacted into the mark once they are contiguous.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayGuard {
    senders: BTreeMap<Address, SenderWindow>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct SenderWindow {
    /// Every nonce below this has been seen
    floor: u64,
    /// Seen nonces at or above `floor`
    seen: Vec<u64>,
}

impl SenderWindow {
    fn contains(&self, nonce: u64) -> bool {
        nonce < self.floor || self.seen.binary_search(&nonce).is_ok()
    }

    fn insert(&mut self, nonce: u64) {
        if let Err(pos) = self.seen.binary_search(&nonce) {
            self.seen.insert(pos, nonce);
        }
        while self.seen.first() == Some(&self.floor) {
            self.seen.remove(0);
            self.floor = self.floor.saturating_add(1);
        }
    }
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_seen(&self, sender: &Address, nonce: u64) -> bool {
        self.senders.get(sender).is_some_and(|w| w.contains(nonce))
    }

    /// Fail with `DuplicateNonce` if the pair was already applied
    pub fn check(&self, sender: &Address, nonce: u64) -> Result<()> {
        if self.is_seen(sender, nonce) {
            return Err(FarmError::DuplicateNonce(nonce));
        }
        Ok(())
    }

    /// Record a pair; only call once the notification has been applied
    pub fn record(&mut self, sender: Address, nonce: u64) {
        self.senders.entry(sender).or_default().insert(nonce);
    }
}
