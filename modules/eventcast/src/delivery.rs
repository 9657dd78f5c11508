//! Remote delivery: the subscriber that forwards every event to the
//! collection endpoint.
//!
//! Each event gets up to `max_retry_count` attempts. After failed attempt
//! `n` the subscriber sleeps `n * retry_backoff` before trying again. Every
//! failure is treated the same: non-2xx, transport error, or an event that
//! will not encode. Once the attempts are spent the event goes to the
//! failure log and the subscriber moves on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::event::Event;
use crate::handler::EventHandler;
use crate::persist::FailureLog;
use crate::transport::Transport;

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    /// Every attempt failed; the event was handed to the failure log (if any).
    Exhausted { attempts: u32 },
}

pub struct RemoteDelivery {
    transport: Arc<dyn Transport>,
    max_retry_count: u32,
    retry_backoff: Duration,
    failure_log: Option<Arc<FailureLog>>,
}

impl RemoteDelivery {
    /// `max_retry_count` below 1 is treated as 1.
    pub fn new<T: Transport + 'static>(
        transport: T,
        max_retry_count: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            transport: Arc::new(transport),
            max_retry_count: max_retry_count.max(1),
            retry_backoff,
            failure_log: None,
        }
    }

    pub fn with_failure_log(mut self, log: Arc<FailureLog>) -> Self {
        self.failure_log = Some(log);
        self
    }

    pub fn max_retry_count(&self) -> u32 {
        self.max_retry_count
    }

    pub async fn deliver(&self, event: &Event) -> DeliveryOutcome {
        for attempt in 1..=self.max_retry_count {
            match self.attempt(event).await {
                Ok(()) => {
                    debug!(event_id = %event.id, attempt, "Event delivered");
                    return DeliveryOutcome::Delivered { attempts: attempt };
                }
                Err(e) => {
                    warn!(
                        event_id = %event.id,
                        name = %event.name,
                        attempt,
                        max = self.max_retry_count,
                        error = %e,
                        "Delivery attempt failed"
                    );
                    if attempt < self.max_retry_count {
                        tokio::time::sleep(backoff_after(self.retry_backoff, attempt)).await;
                    }
                }
            }
        }

        match &self.failure_log {
            Some(log) => {
                warn!(
                    event_id = %event.id,
                    path = %log.path().display(),
                    "Retries exhausted, event persisted"
                );
                log.append(event);
            }
            None => warn!(
                event_id = %event.id,
                "Retries exhausted and no failure log configured, event dropped"
            ),
        }

        DeliveryOutcome::Exhausted {
            attempts: self.max_retry_count,
        }
    }

    async fn attempt(&self, event: &Event) -> anyhow::Result<()> {
        let body = serde_json::to_value(event)?;
        self.transport.send(&body).await
    }
}

/// Wait after failed attempt `attempt`. Saturates instead of overflowing.
fn backoff_after(unit: Duration, attempt: u32) -> Duration {
    unit.saturating_mul(attempt)
}

#[async_trait]
impl EventHandler for RemoteDelivery {
    /// Always succeeds: an exhausted event has been handed to the failure log,
    /// so the cursor moves past it.
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        self.deliver(event).await;
        Ok(())
    }
}
