//! Typed errors for the broadcaster's explicit operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by configuration loading and explicit snapshot operations.
///
/// Delivery failures never show up here: they are retried and then written
/// to the failure log.
#[derive(Debug, Error)]
pub enum EventcastError {
    /// Reading or writing a persistence file failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persistence file did not hold a JSON array of events
    #[error("invalid event file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Missing or malformed configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// The dispatcher worker has stopped
    #[error("dispatcher is shut down")]
    DispatcherClosed,
}

impl EventcastError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EventcastError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        EventcastError::Json {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for broadcaster operations.
pub type Result<T> = std::result::Result<T, EventcastError>;
