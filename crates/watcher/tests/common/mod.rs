//! Common utilities for integration tests

use anyhow::{Context, Result};
use pollwatch::{Subscription, WatchConfig, WatchEvent};
use std::path::Path;
use std::time::Duration;

/// Upper bound on waiting for any single event
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Fast intervals so tests run in milliseconds
pub fn fast_config() -> WatchConfig {
    WatchConfig::with_intervals(
        Duration::from_millis(20),
        Duration::from_millis(10),
        Duration::from_millis(80),
    )
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Wait for the next event on a subscription
pub async fn next_event(sub: &mut Subscription) -> Result<WatchEvent> {
    tokio::time::timeout(EVENT_TIMEOUT, sub.recv())
        .await
        .context("timed out waiting for event")?
        .context("subscription closed")
}

/// Let the coarse kernel clock tick so the next change gets a new mtime
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Append with a single write call
pub fn append(path: &Path, data: &[u8]) -> Result<()> {
    use std::io::Write;

    let mut file = std::fs::OpenOptions::new().append(true).open(path)?;
    file.write_all(data)?;
    Ok(())
}
