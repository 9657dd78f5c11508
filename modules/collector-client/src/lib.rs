pub mod error;

pub use error::{CollectorError, Result};

use std::time::Duration;

use serde::Serialize;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// POSTs JSON documents to a single collection endpoint.
pub struct CollectorClient {
    client: reqwest::Client,
    endpoint: String,
}

impl CollectorClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one JSON body to the endpoint. Any status outside 2xx is an error;
    /// the response body is read only to enrich that error.
    pub async fn post<T: Serialize + ?Sized>(&self, body: &T) -> Result<()> {
        let payload = serde_json::to_vec(body)?;

        let resp = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            tracing::debug!(endpoint = %self.endpoint, status = status.as_u16(), "Collector rejected request");
            return Err(CollectorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}
