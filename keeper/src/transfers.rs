//! Retry queue for outbound transfers (min-heap by next submission time)

use farm_engine::TransferRequest;
use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::collections::HashMap;

/// Transfers are unique per pool and nonce
pub type TransferKey = (String, u64);

/// Transfer awaiting acknowledgement from the ledger
#[derive(Debug, Clone)]
pub struct PendingTransfer {
    pub pool: String,
    pub request: TransferRequest,
    /// Times submitted so far
    pub attempts: u32,
    /// Next submission time (unix seconds)
    pub due_at: u64,
}

impl PendingTransfer {
    pub fn key(&self) -> TransferKey {
        (self.pool.clone(), self.request.nonce)
    }
}

/// Due-time priority queue (min-heap: earliest due first)
pub struct PendingTransfers {
    /// Priority queue (using Reverse for min-heap)
    queue: PriorityQueue<TransferKey, Reverse<u64>>,
    /// Map for O(1) lookups
    map: HashMap<TransferKey, PendingTransfer>,
}

impl PendingTransfers {
    pub fn new() -> Self {
        Self {
            queue: PriorityQueue::new(),
            map: HashMap::new(),
        }
    }

    /// Track a transfer, due at `due_at`. A known transfer keeps its attempt count.
    pub fn push(&mut self, pool: &str, request: TransferRequest, due_at: u64) {
        let key = (pool.to_string(), request.nonce);
        let attempts = self.map.get(&key).map(|p| p.attempts).unwrap_or(0);
        self.map.insert(
            key.clone(),
            PendingTransfer {
                pool: pool.to_string(),
                request,
                attempts,
                due_at,
            },
        );
        self.queue.push(key, Reverse(due_at));
    }

    /// Remove up to `limit` transfers due at or before `now`, earliest first
    pub fn pop_due(&mut self, now: u64, limit: usize) -> Vec<PendingTransfer> {
        let mut due = Vec::new();
        while due.len() < limit {
            match self.queue.peek() {
                Some((_, Reverse(at))) if *at <= now => {}
                _ => break,
            }
            let Some((key, _)) = self.queue.pop() else {
                break;
            };
            if let Some(pending) = self.map.remove(&key) {
                due.push(pending);
            }
        }
        due
    }

    /// Put a submitted transfer back, due again after `retry_secs`
    pub fn reschedule(&mut self, mut pending: PendingTransfer, now: u64, retry_secs: u64) {
        pending.attempts = pending.attempts.saturating_add(1);
        pending.due_at = now.saturating_add(retry_secs);
        let key = pending.key();
        self.queue.push(key.clone(), Reverse(pending.due_at));
        self.map.insert(key, pending);
    }

    /// Transfer acknowledged by the ledger
    pub fn acknowledge(&mut self, pool: &str, nonce: u64) -> Option<PendingTransfer> {
        let key = (pool.to_string(), nonce);
        self.queue.remove(&key);
        self.map.remove(&key)
    }

    pub fn peek(&self) -> Option<&PendingTransfer> {
        let (key, _priority) = self.queue.peek()?;
        self.map.get(key)
    }

    pub fn contains(&self, pool: &str, nonce: u64) -> bool {
        self.map.contains_key(&(pool.to_string(), nonce))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for PendingTransfers {
    fn default() -> Self {
        Self::new()
    }
}
