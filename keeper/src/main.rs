//! Farm Keeper
//!
//! Off-chain service hosting farm pools. Ledger notifications and user
//! commands arrive as JSON lines on stdin; transfer requests and events are
//! written as JSON lines on stdout until the ledger acknowledges them.

mod actor;
mod audit;
mod config;
mod ledger;
mod snapshot;
mod transfers;

use actor::{spawn_pool, PoolHandle};
use anyhow::{Context, Result};
use config::Config;
use farm_engine::{Address, Command, Envelope, FarmEvent, Pool};
use ledger::{JsonLinesLedger, LedgerAdapter};
use serde::Deserialize;
use snapshot::{Pools, Snapshot};
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time;
use transfers::PendingTransfers;

/// One inbound line: `{"pool":"demo","sender":"..","nonce":1,"command":..}`
#[derive(Debug, Deserialize)]
struct Inbound {
    pool: String,
    sender: Address,
    #[serde(default)]
    nonce: Option<u64>,
    command: Command,
}

impl Inbound {
    fn into_envelope(self) -> (String, Envelope) {
        let envelope = Envelope {
            sender: self.sender,
            nonce: self.nonce,
            command: self.command,
        };
        (self.pool, envelope)
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args.iter().position(|a| a == "--write-default") {
        let path = args
            .get(pos + 1)
            .map(String::as_str)
            .unwrap_or("farm-keeper.toml");
        return Config::write_default(path);
    }

    log::info!("Starting Farm Keeper");

    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({:#}), using default local config", e);
        Config::default_local()
    });

    let snapshot_path = config.snapshot_path();
    let pools = restore_pools(&config, &snapshot_path)?;

    let mut pending = PendingTransfers::new();
    let now = now_secs();
    for (name, pool) in &pools {
        for transfer in pool.unacknowledged() {
            pending.push(name, transfer.clone(), now);
        }
    }
    if !pending.is_empty() {
        log::info!("Resubmitting {} unacknowledged transfers", pending.len());
    }

    let mut handles: BTreeMap<String, PoolHandle> = BTreeMap::new();
    for (name, pool) in pools {
        let (handle, _task) = spawn_pool(name.clone(), pool);
        handles.insert(name, handle);
    }
    log::info!("Hosting {} pools", handles.len());

    let mut ledger = JsonLinesLedger::new(std::io::stdout());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut interval = time::interval(Duration::from_secs(config.poll_interval_secs.max(1)));
    let mut ticks: u64 = 0;
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                ticks += 1;
                if let Err(e) = process_tick(&handles, &mut pending, &mut ledger, &config).await {
                    log::error!("Error processing tick: {:#}", e);
                }
                if config.audit_every_ticks > 0 && ticks % config.audit_every_ticks == 0 {
                    run_audit(&handles).await;
                    if let Err(e) = save_snapshot(&handles, &snapshot_path).await {
                        log::error!("Failed to save snapshot: {:#}", e);
                    }
                }
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => handle_line(&handles, &line).await,
                    Ok(None) => {
                        log::info!("Input closed");
                        stdin_open = false;
                    }
                    Err(e) => {
                        log::error!("Failed to read input: {}", e);
                        stdin_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down");
                break;
            }
        }
    }

    process_tick(&handles, &mut pending, &mut ledger, &config).await?;
    save_snapshot(&handles, &snapshot_path).await
}

/// Pools from the snapshot if there is one, otherwise fresh from config
fn restore_pools(config: &Config, snapshot_path: &str) -> Result<Pools> {
    if let Some(snapshot) = snapshot::load(snapshot_path)? {
        log::info!(
            "Restored {} pools from snapshot taken at {}",
            snapshot.pools.len(),
            snapshot.taken_at
        );
        return Ok(snapshot.pools);
    }

    let now = now_secs();
    let mut pools = Pools::new();
    for spec in &config.pools {
        let pool_config = spec.to_pool_config()?;
        let pool = Pool::new(pool_config, now)
            .context(format!("Failed to create pool {}", spec.name))?;
        log::info!("Created pool {} owned by {}", spec.name, spec.owner);
        pools.insert(spec.name.clone(), pool);
    }
    Ok(pools)
}

async fn handle_line(handles: &BTreeMap<String, PoolHandle>, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let (pool, envelope) = match serde_json::from_str::<Inbound>(line) {
        Ok(inbound) => inbound.into_envelope(),
        Err(e) => {
            log::warn!("Ignoring malformed input line: {}", e);
            return;
        }
    };
    let Some(handle) = handles.get(&pool) else {
        log::warn!("Ignoring command for unknown pool {}", pool);
        return;
    };
    match handle.apply(envelope, now_secs()).await {
        Ok(Ok(receipt)) => log::debug!("Pool {}: {:?}", handle.name(), receipt),
        Ok(Err(e)) => log::debug!("Pool {}: command failed: {}", handle.name(), e),
        Err(e) => log::error!("{:#}", e),
    }
}

/// Publish new events, submit new transfers, retry overdue ones
async fn process_tick<L: LedgerAdapter>(
    handles: &BTreeMap<String, PoolHandle>,
    pending: &mut PendingTransfers,
    ledger: &mut L,
    config: &Config,
) -> Result<()> {
    let now = now_secs();

    for (name, handle) in handles {
        let drained = handle.drain().await?;
        for event in &drained.events {
            if let FarmEvent::TransferAcknowledged { nonce } = event {
                pending.acknowledge(name, *nonce);
            }
            ledger.publish(name, event)?;
        }
        for transfer in drained.transfers {
            pending.push(name, transfer, now);
        }
    }

    let due = pending.pop_due(now, config.max_transfers_per_tick);
    if !due.is_empty() {
        log::debug!("Submitting {} transfers", due.len());
    }
    for transfer in due {
        if let Err(e) = ledger.submit(&transfer.pool, &transfer.request, transfer.attempts + 1) {
            log::error!("Failed to submit transfer {}: {:#}", transfer.request.nonce, e);
        }
        pending.reschedule(transfer, now, config.transfer_retry_secs);
    }

    if let Some(next) = pending.peek() {
        log::debug!("{} transfers awaiting acknowledgement, next due at {}", pending.len(), next.due_at);
    }
    Ok(())
}

async fn run_audit(handles: &BTreeMap<String, PoolHandle>) {
    for handle in handles.values() {
        match handle.audit().await {
            Ok(report) => audit::log_report(&report),
            Err(e) => log::error!("Audit failed: {:#}", e),
        }
    }
}

async fn save_snapshot(handles: &BTreeMap<String, PoolHandle>, path: &str) -> Result<()> {
    let mut pools = Pools::new();
    for (name, handle) in handles {
        pools.insert(name.clone(), handle.snapshot().await?);
    }
    snapshot::save(
        path,
        &Snapshot {
            taken_at: now_secs(),
            pools,
        },
    )
}
