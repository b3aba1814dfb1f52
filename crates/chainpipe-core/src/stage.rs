//! The `Stage` trait and the generic queue-driven processing stage.
//!
//! A stage exposes up to three endpoints:
//!
//! - an inbound queue sender (absent for sources),
//! - an outbound queue receiver (absent for sinks),
//! - an error receiver.
//!
//! Each endpoint can be taken exactly once; the [`Pipeline`](crate::Pipeline)
//! takes them when wiring stages together.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::PipelineError;
use crate::event::Event;

/// Capacity of every inter-stage queue.
pub const QUEUE_CAPACITY: usize = 10;

pub type EventSender = mpsc::Sender<Event>;
pub type EventReceiver = mpsc::Receiver<Event>;
pub type ErrorSender = mpsc::Sender<PipelineError>;
pub type ErrorReceiver = mpsc::Receiver<PipelineError>;

/// A bounded event queue of [`QUEUE_CAPACITY`].
pub fn event_queue() -> (EventSender, EventReceiver) {
    mpsc::channel(QUEUE_CAPACITY)
}

/// An error channel. Stages report at most one fatal error, so one slot is
/// enough for the report never to block.
pub fn error_queue() -> (ErrorSender, ErrorReceiver) {
    mpsc::channel(1)
}

/// Uniform contract for input, filter and output stages.
#[async_trait]
pub trait Stage: Send {
    /// Short name used in logs and error reports.
    fn name(&self) -> &str;

    async fn start(&mut self) -> Result<(), PipelineError>;

    async fn stop(&mut self) -> Result<(), PipelineError>;

    /// Take the receiving end of this stage's error channel.
    fn take_error_receiver(&mut self) -> Option<ErrorReceiver>;

    /// Take the sending end of this stage's inbound queue. `None` for sources.
    fn take_inbound(&mut self) -> Option<EventSender> {
        None
    }

    /// Take the receiving end of this stage's outbound queue. `None` for sinks.
    fn take_outbound(&mut self) -> Option<EventReceiver> {
        None
    }
}

/// Per-event transformation applied by a [`ProcessorStage`].
///
/// Returning `Ok(Some(evt))` forwards the event downstream, `Ok(None)` drops
/// it, and `Err` is fatal: it is reported once on the error channel and the
/// stage shuts down.
#[async_trait]
pub trait Processor: Send + Sync + 'static {
    async fn process(&self, event: Event) -> Result<Option<Event>, PipelineError>;
}

/// A stage that reads its inbound queue, runs a [`Processor`], and pushes
/// surviving events to its outbound queue (if it has one).
pub struct ProcessorStage<P: Processor> {
    name: String,
    processor: Arc<P>,
    inbound_tx: Option<EventSender>,
    inbound_rx: Option<EventReceiver>,
    outbound_tx: Option<EventSender>,
    outbound_rx: Option<EventReceiver>,
    error_tx: Option<ErrorSender>,
    error_rx: Option<ErrorReceiver>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl<P: Processor> ProcessorStage<P> {
    /// An intermediate stage with both inbound and outbound queues.
    pub fn new(name: impl Into<String>, processor: P) -> Self {
        let (outbound_tx, outbound_rx) = event_queue();
        let mut stage = Self::sink(name, processor);
        stage.outbound_tx = Some(outbound_tx);
        stage.outbound_rx = Some(outbound_rx);
        stage
    }

    /// A terminal stage: events are consumed, never forwarded.
    pub fn sink(name: impl Into<String>, processor: P) -> Self {
        let (inbound_tx, inbound_rx) = event_queue();
        let (error_tx, error_rx) = error_queue();
        Self {
            name: name.into(),
            processor: Arc::new(processor),
            inbound_tx: Some(inbound_tx),
            inbound_rx: Some(inbound_rx),
            outbound_tx: None,
            outbound_rx: None,
            error_tx: Some(error_tx),
            error_rx: Some(error_rx),
            shutdown: None,
            task: None,
        }
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }
}

#[async_trait]
impl<P: Processor> Stage for ProcessorStage<P> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&mut self) -> Result<(), PipelineError> {
        let inbound = self
            .inbound_rx
            .take()
            .ok_or_else(|| PipelineError::AlreadyStarted(self.name.clone()))?;
        let errors = self
            .error_tx
            .take()
            .ok_or_else(|| PipelineError::AlreadyStarted(self.name.clone()))?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown = Some(shutdown_tx);

        let name = self.name.clone();
        let processor = Arc::clone(&self.processor);
        let outbound = self.outbound_tx.take();
        self.task = Some(tokio::spawn(run_loop(
            name,
            processor,
            inbound,
            outbound,
            errors,
            shutdown_rx,
        )));
        debug!(stage = %self.name, "Stage started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), PipelineError> {
        if let Some(shutdown) = self.shutdown.take() {
            // the loop may already have exited on its own
            let _ = shutdown.send(());
        }
        // never started: dropping our ends closes both queues
        self.inbound_rx = None;
        self.outbound_tx = None;
        self.error_tx = None;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(stage = %self.name, error = %e, "Stage task aborted");
            }
        }
        Ok(())
    }

    fn take_error_receiver(&mut self) -> Option<ErrorReceiver> {
        self.error_rx.take()
    }

    fn take_inbound(&mut self) -> Option<EventSender> {
        self.inbound_tx.take()
    }

    fn take_outbound(&mut self) -> Option<EventReceiver> {
        self.outbound_rx.take()
    }
}

async fn run_loop<P: Processor>(
    name: String,
    processor: Arc<P>,
    mut inbound: EventReceiver,
    outbound: Option<EventSender>,
    errors: ErrorSender,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = &mut shutdown => {
                debug!(stage = %name, "Stop requested, closing inbound queue");
                break;
            }
            next = inbound.recv() => match next {
                Some(evt) => evt,
                None => {
                    debug!(stage = %name, "Inbound queue closed");
                    break;
                }
            },
        };

        match processor.process(event).await {
            Ok(Some(evt)) => {
                let Some(out) = &outbound else { continue };
                // blocks while downstream is full
                tokio::select! {
                    biased;
                    _ = &mut shutdown => {
                        debug!(stage = %name, "Stop requested while downstream was full");
                        break;
                    }
                    sent = out.send(evt) => {
                        if sent.is_err() {
                            debug!(stage = %name, "Outbound queue closed by consumer");
                            break;
                        }
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                error!(stage = %name, error = %e, "Stage failed");
                let _ = errors.send(e).await;
                break;
            }
        }
    }
    // dropping `outbound` and `errors` here propagates shutdown downstream
}
