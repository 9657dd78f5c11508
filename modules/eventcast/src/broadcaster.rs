//! The client-facing broadcaster: one dispatcher with the remote-delivery
//! and observer subscribers already attached.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use collector_client::CollectorClient;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::BroadcasterConfig;
use crate::delivery::RemoteDelivery;
use crate::dispatcher::{Dispatcher, QueueStats};
use crate::error::{EventcastError, Result};
use crate::event::Event;
use crate::handler::EventHandler;
use crate::persist::{self, FailureLog};
use crate::registry::SubscriberId;
use crate::transport::Transport;

pub struct Broadcaster {
    dispatcher: Dispatcher,
    observers: broadcast::Sender<Event>,
    delivery_id: SubscriberId,
    failure_log: Arc<FailureLog>,
    config: BroadcasterConfig,
}

impl Broadcaster {
    /// Start a broadcaster that delivers over HTTP to `config.endpoint_url`.
    /// Must be called within a Tokio runtime.
    pub fn start(config: BroadcasterConfig) -> Result<Self> {
        config.validate()?;
        let client =
            CollectorClient::with_timeout(config.endpoint_url.as_str(), config.request_timeout)
                .map_err(|e| EventcastError::Config(format!("HTTP client: {e}")))?;
        Ok(Self::with_transport(config, client))
    }

    /// Start a broadcaster with any transport.
    ///
    /// Registers remote delivery first, then the observer passthrough, then
    /// re-enqueues whatever the failure log holds (deleting the file).
    pub fn with_transport<T: Transport + 'static>(config: BroadcasterConfig, transport: T) -> Self {
        let dispatcher = Dispatcher::spawn();
        let failure_log = Arc::new(FailureLog::new(&config.failure_log_path));

        let delivery = RemoteDelivery::new(transport, config.max_retry_count, config.retry_backoff)
            .with_failure_log(failure_log.clone());
        let delivery_id = dispatcher.subscribe(delivery);

        let (observers, _) = broadcast::channel(config.observer_capacity.max(1));
        dispatcher.subscribe(ObserverPassthrough {
            tx: observers.clone(),
        });

        let restored = failure_log.drain();
        if !restored.is_empty() {
            info!(count = restored.len(), "Re-enqueueing previously undelivered events");
        }
        for event in restored {
            dispatcher.enqueue(event);
        }

        Self {
            dispatcher,
            observers,
            delivery_id,
            failure_log,
            config,
        }
    }

    /// Record an event. Returns its id; delivery happens in the background and
    /// its outcome is never reported back.
    pub fn track_event(&self, name: impl Into<String>, payload: HashMap<String, String>) -> Uuid {
        let event = Event::new(name, payload);
        let id = event.id;
        self.track(event);
        id
    }

    pub fn track(&self, event: Event) {
        self.dispatcher.enqueue(event);
    }

    /// Add a subscriber. It first receives every event still retained, then
    /// everything tracked afterwards.
    pub fn subscribe<H: EventHandler + 'static>(&self, handler: H) -> SubscriberId {
        self.dispatcher.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.dispatcher.unsubscribe(id);
    }

    /// Id of the built-in remote-delivery subscriber.
    pub fn delivery_subscriber(&self) -> SubscriberId {
        self.delivery_id
    }

    /// Live stream of events as they pass through the dispatcher. Only events
    /// dispatched after the call are seen; an observer that falls more than
    /// `observer_capacity` events behind skips the ones it missed.
    pub fn events(&self) -> BoxStream<'static, Event> {
        BroadcastStream::new(self.observers.subscribe())
            .filter_map(|item| {
                futures::future::ready(match item {
                    Ok(event) => Some(event),
                    Err(e) => {
                        warn!(error = %e, "Event observer lagged");
                        None
                    }
                })
            })
            .boxed()
    }

    /// Write every event not yet consumed by all subscribers to `path`,
    /// including one a subscriber is still working on. Does not wait for the
    /// dispatcher, so a delivery stuck in backoff cannot hold it up.
    pub fn persist_queue(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let events = self.dispatcher.snapshot();
        persist::save_events(path, &events)?;
        info!(path = %path.display(), count = events.len(), "Queue snapshot written");
        Ok(events.len())
    }

    /// Re-enqueue every event from a snapshot file. Events that were already
    /// delivered before the snapshot was taken will be delivered again.
    pub fn restore_queue(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let events = persist::load_events(path)?;
        let count = events.len();
        for event in events {
            self.dispatcher.enqueue(event);
        }
        info!(path = %path.display(), count, "Queue snapshot restored");
        Ok(count)
    }

    /// Wait until everything tracked so far has been offered to every
    /// subscriber. Must not be awaited from inside a handler.
    pub async fn flush(&self) -> Result<()> {
        self.dispatcher.flush().await
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        self.dispatcher.stats().await
    }

    pub fn failure_log(&self) -> &FailureLog {
        &self.failure_log
    }

    pub fn config(&self) -> &BroadcasterConfig {
        &self.config
    }

    /// Stop accepting events and wait for queued dispatches to finish.
    pub async fn shutdown(self) {
        self.dispatcher.shutdown().await;
    }
}

/// Republishes every dispatched event to the observer stream.
struct ObserverPassthrough {
    tx: broadcast::Sender<Event>,
}

#[async_trait]
impl EventHandler for ObserverPassthrough {
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        // No receivers is not an error: observers are optional.
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}
