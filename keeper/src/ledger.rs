//! Boundary to the external ledger that executes transfers

use anyhow::{Context, Result};
use farm_engine::{FarmEvent, TransferRequest};
use serde::Serialize;
use std::io::Write;

/// Executes outbound transfers and receives the audit trail.
/// Delivery is at-least-once: the same transfer nonce may be submitted again
/// until the ledger acknowledges it.
pub trait LedgerAdapter {
    fn submit(&mut self, pool: &str, transfer: &TransferRequest, attempt: u32) -> Result<()>;

    fn publish(&mut self, pool: &str, event: &FarmEvent) -> Result<()>;
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Line<'a> {
    Transfer {
        pool: &'a str,
        attempt: u32,
        #[serde(flatten)]
        transfer: &'a TransferRequest,
    },
    Event {
        pool: &'a str,
        #[serde(flatten)]
        event: &'a FarmEvent,
    },
}

/// Build one JSON line for a transfer request
pub fn transfer_line(pool: &str, transfer: &TransferRequest, attempt: u32) -> Result<String> {
    serde_json::to_string(&Line::Transfer {
        pool,
        attempt,
        transfer,
    })
    .context("Failed to encode transfer")
}

/// Build one JSON line for an event
pub fn event_line(pool: &str, event: &FarmEvent) -> Result<String> {
    serde_json::to_string(&Line::Event { pool, event }).context("Failed to encode event")
}

/// Writes transfers and events as JSON lines
pub struct JsonLinesLedger<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesLedger<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.out, "{}", line).context("Failed to write ledger line")?;
        self.out.flush().context("Failed to flush ledger output")
    }
}

impl<W: Write> LedgerAdapter for JsonLinesLedger<W> {
    fn submit(&mut self, pool: &str, transfer: &TransferRequest, attempt: u32) -> Result<()> {
        let line = transfer_line(pool, transfer, attempt)?;
        self.write_line(&line)
    }

    fn publish(&mut self, pool: &str, event: &FarmEvent) -> Result<()> {
        let line = event_line(pool, event)?;
        self.write_line(&line)
    }
}
