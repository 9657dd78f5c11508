//! JSON files of events: whole-queue snapshots and the failed-delivery log.
//!
//! Both use the same format, a JSON array of serialized [`Event`]s, so a
//! failure log can be restored exactly like a snapshot.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{info, warn};

use crate::error::{EventcastError, Result};
use crate::event::Event;

/// Write `events` to `path`, replacing any previous contents. Missing parent
/// directories are created.
pub fn save_events(path: &Path, events: &[Event]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| EventcastError::io(dir, e))?;
    }

    let json = serde_json::to_vec(events).map_err(|e| EventcastError::json(path, e))?;
    std::fs::write(path, json).map_err(|e| EventcastError::io(path, e))?;
    Ok(())
}

/// Read a JSON array of events from `path`.
pub fn load_events(path: &Path) -> Result<Vec<Event>> {
    let bytes = std::fs::read(path).map_err(|e| EventcastError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| EventcastError::json(path, e))
}

// ---------------------------------------------------------------------------
// FailureLog
// ---------------------------------------------------------------------------

/// Append-only record of events whose delivery was given up on.
///
/// Appends are read-whole-file, push, write-whole-file. The in-process lock
/// serializes appends through one `FailureLog`; separate processes (or two
/// logs pointed at the same path) can still lose an append.
#[derive(Debug)]
pub struct FailureLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a failed event. I/O errors are logged and otherwise swallowed.
    pub fn append(&self, event: &Event) {
        if let Err(e) = self.try_append(event) {
            warn!(
                path = %self.path.display(),
                event_id = %event.id,
                error = %e,
                "Failed to persist undelivered event"
            );
        }
    }

    pub fn try_append(&self, event: &Event) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut events = match load_events(&self.path) {
            Ok(events) => events,
            Err(EventcastError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                Vec::new()
            }
            Err(EventcastError::Json { source, .. }) => {
                warn!(
                    path = %self.path.display(),
                    error = %source,
                    "Failure log unreadable, starting a new one"
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        events.push(event.clone());
        save_events(&self.path, &events)
    }

    /// Current contents without removing them. A missing or unreadable file
    /// reads as empty.
    pub fn read(&self) -> Vec<Event> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.read_unlocked()
    }

    /// Take every logged event and delete the file.
    pub fn drain(&self) -> Vec<Event> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let events = self.read_unlocked();

        match std::fs::remove_file(&self.path) {
            Ok(()) => info!(
                path = %self.path.display(),
                count = events.len(),
                "Failure log drained"
            ),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove failure log"),
        }

        events
    }

    fn read_unlocked(&self) -> Vec<Event> {
        match load_events(&self.path) {
            Ok(events) => events,
            Err(EventcastError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Failed to read failure log");
                Vec::new()
            }
        }
    }
}
