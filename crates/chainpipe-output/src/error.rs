//! Error types for output sinks.

use thiserror::Error;

/// Errors raised while delivering an event.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Delivery rejected with HTTP {status}: {body}")]
    Delivery { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serialize(String),
}

impl From<serde_json::Error> for OutputError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}
