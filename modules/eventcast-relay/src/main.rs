//! Reads one JSON object per line from stdin and tracks it:
//!
//! ```text
//! {"name": "signup", "payload": {"plan": "pro"}}
//! ```
//!
//! The retained queue is restored from `EVENTCAST_SNAPSHOT` on start and
//! written back on EOF or Ctrl-C.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;
use eventcast::{data_dir, Broadcaster, BroadcasterConfig};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct TrackRequest {
    name: String,
    #[serde(default)]
    payload: HashMap<String, String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("eventcast=info".parse()?))
        .init();

    info!("Eventcast relay starting...");

    let config = BroadcasterConfig::from_env()?;
    config.log_summary();

    let snapshot_path = std::env::var("EVENTCAST_SNAPSHOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_dir().join("eventcast").join("snapshot.json"));

    let broadcaster = Broadcaster::start(config)?;

    if snapshot_path.exists() {
        let restored = broadcaster.restore_queue(&snapshot_path)?;
        info!(path = %snapshot_path.display(), restored, "Snapshot restored");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tracked = 0usize;
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => match serde_json::from_str::<TrackRequest>(&line) {
                    Ok(req) => {
                        broadcaster.track_event(req.name, req.payload);
                        tracked += 1;
                    }
                    Err(e) => warn!(error = %e, "Skipping malformed line"),
                },
                None => {
                    info!(tracked, "stdin closed");
                    break;
                }
            },
            _ = &mut interrupted => {
                info!(tracked, "Interrupted");
                break;
            }
        }
    }

    // Includes events still in retry backoff; they are delivered again after restart.
    match broadcaster.persist_queue(&snapshot_path) {
        Ok(count) => info!(path = %snapshot_path.display(), count, "Snapshot saved"),
        Err(e) => warn!(error = %e, "Failed to save snapshot"),
    }

    Ok(())
}
