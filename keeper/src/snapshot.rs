//! Versioned pool snapshots
//!
//! On disk: a bincode `SnapshotFile { version, payload }`. The payload layout
//! depends on the version; `migrate` brings any supported version up to the
//! current one.

use anyhow::{Context, Result};
use farm_engine::Pool;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

pub const SNAPSHOT_VERSION: u32 = 2;

/// Pools by name
pub type Pools = BTreeMap<String, Pool>;

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    payload: Vec<u8>,
}

/// Version 1 payload: pools only
#[derive(Serialize, Deserialize)]
struct SnapshotV1 {
    pools: Pools,
}

/// Current payload
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unix seconds when the snapshot was taken
    pub taken_at: u64,
    pub pools: Pools,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("corrupt snapshot payload: {0}")]
    Corrupt(#[from] bincode::Error),
}

/// Decode a payload of any supported version into the current layout
pub fn migrate(version: u32, payload: &[u8]) -> std::result::Result<Snapshot, SnapshotError> {
    match version {
        1 => {
            let old: SnapshotV1 = bincode::deserialize(payload)?;
            Ok(Snapshot {
                taken_at: 0,
                pools: old.pools,
            })
        }
        SNAPSHOT_VERSION => Ok(bincode::deserialize(payload)?),
        other => Err(SnapshotError::UnsupportedVersion(other)),
    }
}

pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let payload = bincode::serialize(snapshot).context("Failed to encode snapshot payload")?;
    bincode::serialize(&SnapshotFile {
        version: SNAPSHOT_VERSION,
        payload,
    })
    .context("Failed to encode snapshot")
}

pub fn decode(bytes: &[u8]) -> Result<Snapshot> {
    let file: SnapshotFile = bincode::deserialize(bytes).context("Failed to decode snapshot header")?;
    if file.version != SNAPSHOT_VERSION {
        log::info!("Migrating snapshot from version {}", file.version);
    }
    Ok(migrate(file.version, &file.payload)?)
}

/// Write atomically: temp file then rename
pub fn save(path: &str, snapshot: &Snapshot) -> Result<()> {
    let bytes = encode(snapshot)?;
    if let Some(dir) = Path::new(path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .context(format!("Failed to create snapshot directory {}", dir.display()))?;
        }
    }
    let tmp = format!("{}.tmp", path);
    std::fs::write(&tmp, bytes).context(format!("Failed to write snapshot to {}", tmp))?;
    std::fs::rename(&tmp, path).context(format!("Failed to move snapshot into {}", path))?;
    log::debug!("Saved snapshot of {} pools to {}", snapshot.pools.len(), path);
    Ok(())
}

/// `None` when no snapshot exists yet
pub fn load(path: &str) -> Result<Option<Snapshot>> {
    if !Path::new(path).exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path).context(format!("Failed to read snapshot {}", path))?;
    decode(&bytes).map(Some)
}
