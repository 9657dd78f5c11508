//! Subscriber identities and the insertion-ordered registry the dispatch
//! loop walks.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handler::EventHandler;

/// Identifies one registration. Returned by `subscribe`, consumed by
/// `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered handler. Holds no ownership over events.
#[derive(Clone)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub handler: Arc<dyn EventHandler>,
}

impl Subscriber {
    pub fn new(handler: Arc<dyn EventHandler>) -> Self {
        Self {
            id: SubscriberId::new(),
            handler,
        }
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}

/// Live subscribers in registration order.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: Vec<Subscriber>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the subscriber. Re-registering an id replaces its handler in place.
    pub fn insert(&mut self, subscriber: Subscriber) {
        match self.subscribers.iter_mut().find(|s| s.id == subscriber.id) {
            Some(existing) => existing.handler = subscriber.handler,
            None => self.subscribers.push(subscriber),
        }
    }

    pub fn remove(&mut self, id: SubscriberId) -> Option<Subscriber> {
        let pos = self.subscribers.iter().position(|s| s.id == id)?;
        Some(self.subscribers.remove(pos))
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.iter().any(|s| s.id == id)
    }

    /// Point-in-time copy for one dispatch invocation.
    pub fn snapshot(&self) -> Vec<Subscriber> {
        self.subscribers.clone()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
