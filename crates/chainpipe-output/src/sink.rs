//! The `EventSink` trait and the stage that drives it.

use async_trait::async_trait;

use chainpipe_core::{Event, PipelineError, Processor, ProcessorStage};

use crate::error::OutputError;
use crate::metrics::OutputMetrics;

/// Delivers events outside the process.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    /// Short name used in logs and as the stage name.
    fn name(&self) -> &str;

    async fn deliver(&self, event: &Event) -> Result<(), OutputError>;
}

/// Runs a sink for every inbound event. Failed deliveries are logged and
/// counted; they never stop the stage.
pub struct Delivery<S: EventSink> {
    sink: S,
    metrics: OutputMetrics,
}

impl<S: EventSink> Delivery<S> {
    pub fn new(sink: S, metrics: OutputMetrics) -> Self {
        Self { sink, metrics }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

#[async_trait]
impl<S: EventSink> Processor for Delivery<S> {
    async fn process(&self, event: Event) -> Result<Option<Event>, PipelineError> {
        let kind = event.kind();
        match self.sink.deliver(&event).await {
            Ok(()) => self.metrics.record_delivered(self.sink.name(), kind),
            Err(e) => {
                self.metrics.record_failure(self.sink.name(), kind);
                tracing::warn!(
                    sink = self.sink.name(),
                    kind = %kind,
                    error = %e,
                    "Event delivery failed"
                );
            }
        }
        Ok(None)
    }
}

/// A terminal stage delivering every event to `S`.
pub type OutputStage<S> = ProcessorStage<Delivery<S>>;

/// Build an output stage recording on the global meter provider.
pub fn output_stage<S: EventSink>(sink: S) -> OutputStage<S> {
    let name = sink.name().to_string();
    ProcessorStage::sink(name, Delivery::new(sink, OutputMetrics::global()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainpipe_core::{BlockEvent, Stage};
    use std::sync::Mutex;

    /// Records slots; rejects odd ones.
    #[derive(Default)]
    struct Picky(Mutex<Vec<u64>>);

    #[async_trait]
    impl EventSink for Picky {
        fn name(&self) -> &str {
            "picky"
        }

        async fn deliver(&self, event: &Event) -> Result<(), OutputError> {
            let chainpipe_core::EventPayload::Block(b) = &event.payload else {
                return Ok(());
            };
            if b.slot_number % 2 == 1 {
                return Err(OutputError::Http("connection refused".into()));
            }
            self.0.lock().unwrap().push(b.slot_number);
            Ok(())
        }
    }

    fn block(slot: u64) -> Event {
        Event::new(
            BlockEvent {
                block_number: slot,
                block_hash: String::new(),
                slot_number: slot,
                block_cbor: None,
            }
            .into(),
        )
    }

    #[tokio::test]
    async fn failed_deliveries_are_not_fatal() {
        let mut stage = output_stage(Picky::default());
        assert_eq!(stage.name(), "picky");
        assert!(stage.take_outbound().is_none());
        let tx = stage.take_inbound().unwrap();
        let mut errors = stage.take_error_receiver().unwrap();
        stage.start().await.unwrap();

        for slot in 0..5 {
            tx.send(block(slot)).await.unwrap();
        }
        drop(tx);

        // closes without ever reporting an error
        assert!(errors.recv().await.is_none());
        assert_eq!(*stage.processor().sink().0.lock().unwrap(), vec![0, 2, 4]);
    }
}
