//! The event record handed to every subscriber.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An application event. Immutable once created; subscribers and the
/// persistence store only ever see clones.
///
/// The serde form is also the wire and file form:
/// `{"id": <uuid>, "name": ..., "payload": {..}, "timestamp": <RFC 3339>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub payload: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: HashMap<String, String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Event with an empty payload.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, HashMap::new())
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}
