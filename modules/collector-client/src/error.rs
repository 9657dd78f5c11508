use thiserror::Error;

pub type Result<T> = std::result::Result<T, CollectorError>;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Collector error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Encode error: {0}")]
    Encode(String),
}

impl CollectorError {
    /// HTTP status returned by the collector, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            CollectorError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CollectorError {
    fn from(err: reqwest::Error) -> Self {
        CollectorError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for CollectorError {
    fn from(err: serde_json::Error) -> Self {
        CollectorError::Encode(err.to_string())
    }
}
