//! `log` sink: one JSON line per event through `tracing`.

use async_trait::async_trait;

use chainpipe_core::Event;

use crate::error::OutputError;
use crate::sink::EventSink;

/// Tracing target of emitted event lines, for filtering with `RUST_LOG`.
pub const EVENT_TARGET: &str = "chainpipe::event";

#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, event: &Event) -> Result<(), OutputError> {
        let line = serde_json::to_string(event)?;
        tracing::info!(target: EVENT_TARGET, kind = %event.kind(), "{line}");
        Ok(())
    }
}
