//! The seam between remote delivery and the network.

use std::sync::Arc;

use async_trait::async_trait;
use collector_client::CollectorClient;

/// Sends one JSON document to the collection endpoint. `Ok` means the
/// endpoint answered 2xx; everything else is an error.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, body: &serde_json::Value) -> anyhow::Result<()>;
}

#[async_trait]
impl Transport for CollectorClient {
    async fn send(&self, body: &serde_json::Value) -> anyhow::Result<()> {
        self.post(body).await?;
        Ok(())
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, body: &serde_json::Value) -> anyhow::Result<()> {
        (**self).send(body).await
    }
}
