//! Shared fixtures: a recording transport and a recording subscriber.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use eventcast::{Event, EventHandler, Transport};

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

/// Records every body it is asked to send. Fails the first `fail_first`
/// calls (or every call, with [`MockTransport::failing`]).
#[derive(Default)]
pub struct MockTransport {
    bodies: Mutex<Vec<serde_json::Value>>,
    fail_first: usize,
    always_fail: bool,
}

impl MockTransport {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            always_fail: true,
            ..Self::default()
        })
    }

    pub fn failing_first(n: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_first: n,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.bodies.lock().unwrap().len()
    }

    pub fn bodies(&self) -> Vec<serde_json::Value> {
        self.bodies.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.bodies()
            .iter()
            .map(|b| b["name"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, body: &serde_json::Value) -> anyhow::Result<()> {
        let call = {
            let mut bodies = self.bodies.lock().unwrap();
            bodies.push(body.clone());
            bodies.len()
        };

        if self.always_fail || call <= self.fail_first {
            anyhow::bail!("collector returned 503");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

/// Subscriber that remembers the names it was handed, optionally sleeping
/// per event.
#[derive(Default)]
pub struct Recorder {
    names: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.names.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventHandler for Recorder {
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.names.lock().unwrap().push(event.name.clone());
        Ok(())
    }
}

/// Fails every call and counts them.
#[derive(Default)]
pub struct AlwaysFails {
    pub calls: AtomicUsize,
}

#[async_trait]
impl EventHandler for AlwaysFails {
    async fn handle(&self, _event: &Event) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("downstream unavailable")
    }
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
