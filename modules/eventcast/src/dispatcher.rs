//! The serialized dispatch loop.
//!
//! One worker task owns the queue, the registry and every cursor. Callers
//! talk to it through an unbounded command channel, so `enqueue`,
//! `subscribe` and `unsubscribe` never wait. Commands are applied strictly
//! in the order they were sent, and each `Enqueue` / `Subscribe` runs one
//! full dispatch before the next command is looked at.
//!
//! ```text
//! enqueue ─────┐
//! subscribe ───┼──► [command channel] ──► worker
//! unsubscribe ─┘                            ├─ apply command
//!                                           ├─ for each subscriber (registration order):
//!                                           │     while cursor < len: handle(event); cursor += 1
//!                                           └─ compact()
//! ```
//!
//! Delivery to one subscriber is sequential, and a slow handler holds up
//! every subscriber after it in the same dispatch. There is no timeout on
//! handlers.
//!
//! The worker is not the only holder of the events. A `Backlog` mirror is
//! appended on the caller side of `enqueue` and trimmed by the worker after
//! each compaction, so [`Dispatcher::snapshot`] never queues behind a
//! dispatch that is stuck in a handler.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{EventcastError, Result};
use crate::event::Event;
use crate::handler::EventHandler;
use crate::queue::EventQueue;
use crate::registry::{Subscriber, SubscriberId, SubscriberRegistry};

/// Point-in-time view of the dispatcher's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Events still held because some subscriber has not consumed them.
    pub retained: usize,
    pub subscribers: usize,
}

enum Command {
    Enqueue(Event),
    Subscribe(Subscriber),
    Unsubscribe(SubscriberId),
    Stats(oneshot::Sender<QueueStats>),
    Flush(oneshot::Sender<()>),
}

/// Handle to the dispatch worker. Dropping it lets the worker finish the
/// commands already sent and then exit.
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Command>,
    backlog: Backlog,
    worker: JoinHandle<()>,
}

/// Events enqueued and not yet compacted away: the worker's retained queue
/// followed by `Enqueue` commands it has not reached yet.
#[derive(Clone, Default)]
struct Backlog(Arc<Mutex<VecDeque<Event>>>);

impl Backlog {
    fn lock(&self) -> MutexGuard<'_, VecDeque<Event>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drop the `count` oldest events; called with what the worker compacted.
    fn release(&self, count: usize) {
        let mut events = self.lock();
        let count = count.min(events.len());
        events.drain(..count);
    }
}

impl Dispatcher {
    /// Spawn the worker on the current Tokio runtime.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let backlog = Backlog::default();
        let worker = tokio::spawn(DispatchLoop::new(backlog.clone()).run(rx));
        Self {
            tx,
            backlog,
            worker,
        }
    }

    /// Append an event and trigger a dispatch.
    pub fn enqueue(&self, event: Event) {
        // Held across the send: the mirror keeps channel order, and the worker
        // cannot release this event before it has been mirrored.
        let mut backlog = self.backlog.lock();
        match self.tx.send(Command::Enqueue(event.clone())) {
            Ok(()) => backlog.push_back(event),
            Err(_) => warn!(event_id = %event.id, "Dispatcher worker is gone, event dropped"),
        }
    }

    /// Register a handler. It starts at the front of the retained backlog.
    pub fn subscribe<H>(&self, handler: H) -> SubscriberId
    where
        H: EventHandler + 'static,
    {
        let subscriber = Subscriber::new(Arc::new(handler));
        let id = subscriber.id;
        self.send(Command::Subscribe(subscriber));
        id
    }

    /// Remove a subscriber. The dispatch already running when this is sent
    /// finishes its pass, in-flight handler call included; later dispatches
    /// skip `id`.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.send(Command::Unsubscribe(id));
    }

    /// Every event not yet consumed by all subscribers, oldest first. This
    /// includes events the worker has not dispatched yet, and it does not
    /// wait for a dispatch in progress.
    pub fn snapshot(&self) -> Vec<Event> {
        self.backlog.lock().iter().cloned().collect()
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        self.request(Command::Stats).await
    }

    /// Resolves once every command sent before this call has been processed,
    /// including the dispatches they triggered.
    ///
    /// Must not be awaited from inside a handler: the worker would be waiting
    /// on itself.
    pub async fn flush(&self) -> Result<()> {
        self.request(Command::Flush).await
    }

    /// Close the command channel and wait for the worker to drain it.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            warn!(error = %e, "Dispatcher worker ended abnormally");
        }
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            warn!("Dispatcher worker is gone, command dropped");
        }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .map_err(|_| EventcastError::DispatcherClosed)?;
        rx.await.map_err(|_| EventcastError::DispatcherClosed)
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct DispatchLoop {
    queue: EventQueue,
    registry: SubscriberRegistry,
    backlog: Backlog,
}

impl DispatchLoop {
    fn new(backlog: Backlog) -> Self {
        Self {
            queue: EventQueue::new(),
            registry: SubscriberRegistry::new(),
            backlog,
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Enqueue(event) => {
                    self.queue.push(event);
                    self.dispatch().await;
                }
                Command::Subscribe(subscriber) => {
                    if !self.registry.contains(subscriber.id) {
                        self.queue.track(subscriber.id);
                    }
                    debug!(
                        subscriber = %subscriber.id,
                        backlog = self.queue.len(),
                        "Subscriber registered"
                    );
                    self.registry.insert(subscriber);
                    self.dispatch().await;
                }
                Command::Unsubscribe(id) => {
                    if self.registry.remove(id).is_some() {
                        self.queue.untrack(id);
                        self.compact();
                        debug!(subscriber = %id, "Subscriber removed");
                    }
                }
                Command::Stats(reply) => {
                    let _ = reply.send(QueueStats {
                        retained: self.queue.len(),
                        subscribers: self.registry.len(),
                    });
                }
                Command::Flush(reply) => {
                    let _ = reply.send(());
                }
            }
        }

        debug!(retained = self.queue.len(), "Dispatcher worker stopped");
    }

    /// One dispatch invocation: catch every subscriber up, then compact.
    async fn dispatch(&mut self) {
        for subscriber in self.registry.snapshot() {
            self.catch_up(&subscriber).await;
        }
        self.compact();
    }

    fn compact(&mut self) {
        let dropped = self.queue.compact();
        if dropped > 0 {
            self.backlog.release(dropped);
            debug!(dropped, retained = self.queue.len(), "Queue compacted");
        }
    }

    async fn catch_up(&mut self, subscriber: &Subscriber) {
        while let Some(event) = self.queue.next_for(subscriber.id).cloned() {
            let outcome = AssertUnwindSafe(subscriber.handler.handle(&event))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(anyhow::anyhow!("handler panicked: {}", panic_message(&*panic)))
                });

            match outcome {
                Ok(()) => self.queue.advance(subscriber.id),
                Err(e) => {
                    warn!(
                        subscriber = %subscriber.id,
                        event_id = %event.id,
                        error = %e,
                        "Handler failed, subscriber stalled until next dispatch"
                    );
                    break;
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
