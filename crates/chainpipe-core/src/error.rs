//! Error types for the chainpipe pipeline.

use thiserror::Error;

use crate::registry::StageKind;

/// Errors raised by pipeline plumbing and reported on stage error channels.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Stage '{0}' already started")]
    AlreadyStarted(String),

    #[error("Pipeline has no {0} stage")]
    MissingStage(StageKind),

    #[error("Stage '{stage}' does not expose an {queue} queue")]
    QueueUnavailable { stage: String, queue: &'static str },

    #[error("Unknown {kind} plugin: {name}")]
    UnknownPlugin { kind: StageKind, name: String },

    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Wrap a stage-specific error so it can travel on a stage error channel.
    pub fn stage(
        stage: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Stage {
            stage: stage.into(),
            source: Box::new(source),
        }
    }

    /// Returns the wrapped stage error if it is of type `E`.
    pub fn downcast_source<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Stage { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Errors from parsing chain identifiers out of text or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Invalid bech32: {0}")]
    InvalidBech32(String),

    #[error("Invalid {what} length: expected {expected}, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Empty address")]
    EmptyAddress,

    #[error("Unknown address header type {0:#x}")]
    UnknownAddressHeader(u8),

    #[error("Invalid point '{0}': expected <slot>.<hash>")]
    InvalidPoint(String),
}

impl From<hex::FromHexError> for ParseError {
    fn from(err: hex::FromHexError) -> Self {
        Self::InvalidHex(err.to_string())
    }
}

impl From<bech32::Error> for ParseError {
    fn from(err: bech32::Error) -> Self {
        Self::InvalidBech32(err.to_string())
    }
}
