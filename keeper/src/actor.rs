//! One task per pool: commands are applied one at a time in arrival order

use anyhow::{anyhow, Result};
use farm_engine::{Envelope, FarmError, FarmEvent, Pool, Receipt, TransferRequest};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::audit::{audit_pool, AuditReport};

const MAILBOX_DEPTH: usize = 256;

enum PoolMsg {
    Apply {
        envelope: Envelope,
        now: u64,
        reply: oneshot::Sender<Result<Receipt, FarmError>>,
    },
    Drain {
        reply: oneshot::Sender<Drained>,
    },
    Audit {
        reply: oneshot::Sender<AuditReport>,
    },
    Snapshot {
        reply: oneshot::Sender<Pool>,
    },
}

/// Output accumulated by a pool since the last drain
#[derive(Debug, Default)]
pub struct Drained {
    pub events: Vec<FarmEvent>,
    pub transfers: Vec<TransferRequest>,
}

/// Cloneable address of a running pool actor
#[derive(Clone)]
pub struct PoolHandle {
    name: String,
    tx: mpsc::Sender<PoolMsg>,
}

impl PoolHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn call<T>(&self, msg: PoolMsg, rx: oneshot::Receiver<T>) -> Result<T> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| anyhow!("pool actor {} stopped", self.name))?;
        rx.await
            .map_err(|_| anyhow!("pool actor {} dropped the reply", self.name))
    }

    /// Apply a command; the engine error, if any, is returned as-is
    pub async fn apply(&self, envelope: Envelope, now: u64) -> Result<Result<Receipt, FarmError>> {
        let (reply, rx) = oneshot::channel();
        self.call(PoolMsg::Apply { envelope, now, reply }, rx).await
    }

    pub async fn drain(&self) -> Result<Drained> {
        let (reply, rx) = oneshot::channel();
        self.call(PoolMsg::Drain { reply }, rx).await
    }

    pub async fn audit(&self) -> Result<AuditReport> {
        let (reply, rx) = oneshot::channel();
        self.call(PoolMsg::Audit { reply }, rx).await
    }

    /// Copy of the pool state, for snapshots
    pub async fn snapshot(&self) -> Result<Pool> {
        let (reply, rx) = oneshot::channel();
        self.call(PoolMsg::Snapshot { reply }, rx).await
    }
}

/// Move `pool` into its own task
pub fn spawn_pool(name: String, pool: Pool) -> (PoolHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(MAILBOX_DEPTH);
    let task = tokio::spawn(run(name.clone(), pool, rx));
    (PoolHandle { name, tx }, task)
}

async fn run(name: String, mut pool: Pool, mut rx: mpsc::Receiver<PoolMsg>) {
    log::info!("Pool {} actor started", name);
    while let Some(msg) = rx.recv().await {
        match msg {
            PoolMsg::Apply { envelope, now, reply } => {
                let op = envelope.command.name();
                let result = pool.apply(envelope, now);
                if let Err(e) = &result {
                    log::info!("Pool {}: {} rejected: {}", name, op, e);
                }
                let _ = reply.send(result);
            }
            PoolMsg::Drain { reply } => {
                let _ = reply.send(Drained {
                    events: pool.take_events(),
                    transfers: pool.take_transfers(),
                });
            }
            PoolMsg::Audit { reply } => {
                let _ = reply.send(audit_pool(&name, &pool));
            }
            PoolMsg::Snapshot { reply } => {
                let _ = reply.send(pool.clone());
            }
        }
    }
    log::info!("Pool {} actor stopped", name);
}
