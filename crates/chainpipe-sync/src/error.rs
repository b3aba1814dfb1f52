//! Error types for the chain-sync input.

use thiserror::Error;

/// Errors raised while connecting to or syncing from a node.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Event stream closed")]
    Closed,
}

impl SyncError {
    /// Returns `true` if the event stream was closed by shutdown rather than
    /// by a failure. Such errors are never reported on the error channel.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_is_not_a_failure() {
        assert!(SyncError::Closed.is_closed());
        assert!(!SyncError::Protocol("boom".into()).is_closed());
        assert_eq!(
            SyncError::Configuration("unknown network: foo".into()).to_string(),
            "Configuration error: unknown network: foo"
        );
    }
}
