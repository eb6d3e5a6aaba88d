//! Append-only audit log of every pipeline event

use anyhow::Result;
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use crate::events::{BotEvent, EventBus};

pub const AUDIT_DIR: &str = "output/audit";

pub fn audit_file(dir: &Path) -> PathBuf {
    dir.join(format!("events_{}.jsonl", Utc::now().format("%Y-%m-%d")))
}

pub fn append_event(dir: &Path, event: &BotEvent) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(audit_file(dir))?;

    writeln!(file, "{}", serde_json::to_string(event)?)?;
    debug!(event = event.name(), "Audit event written");

    Ok(())
}

/// Subscribes to the bus and writes events until every sender is gone.
/// Falling behind drops events from the log but never stalls the pipeline.
pub fn spawn_audit_sink(bus: &EventBus, dir: PathBuf) -> JoinHandle<()> {
    let mut events = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(e) = append_event(&dir, &event) {
                        error!("Failed to write audit event {}: {}", event.name(), e);
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "⚠️ Audit sink lagged, events dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}
