//! The single-method capability every subscriber provides.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::event::Event;

/// Consumes one event at a time.
///
/// Returning `Err` (or panicking) stops delivery to this subscriber for the
/// rest of the current dispatch; the same event is offered again on the next
/// dispatch. A handler that always fails therefore stalls its subscriber at
/// that event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

#[async_trait]
impl<H: EventHandler + ?Sized> EventHandler for Arc<H> {
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        (**self).handle(event).await
    }
}

/// Forwards each event into an unbounded channel. A dropped receiver is a
/// handler error.
#[async_trait]
impl EventHandler for mpsc::UnboundedSender<Event> {
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        self.send(event.clone())
            .map_err(|_| anyhow::anyhow!("subscriber channel closed"))
    }
}

/// Handler backed by an async closure. Build with [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure taking an owned `Event`.
///
/// ```ignore
/// let handler = handler_fn(|event| async move {
///     println!("{}", event.name);
///     Ok(())
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        (self.f)(event.clone()).await
    }
}
