//! `Pipeline` — owns one input, any number of filters, and one output.
//!
//! ```text
//! input ──outbound─▶ link ──inbound─▶ filter ──outbound─▶ link ──inbound─▶ output
//!   │                                   │                                    │
//!   └──────────── errors ───────────────┴────────────── errors ──────────────┘
//!                                   merged error receiver
//! ```
//!
//! Each link is a task moving events from one stage's outbound queue to the
//! next stage's inbound queue. When a stage closes its outbound queue the link
//! ends and drops its sender, which closes the downstream inbound queue, so
//! shutdown cascades from source to sink.

use std::future::Future;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::registry::StageKind;
use crate::stage::{ErrorReceiver, EventReceiver, EventSender, Stage};

/// A linear input → filters → output pipeline.
#[derive(Default)]
pub struct Pipeline {
    input: Option<Box<dyn Stage>>,
    filters: Vec<Box<dyn Stage>>,
    output: Option<Box<dyn Stage>>,
    links: Vec<JoinHandle<()>>,
    errors: Option<ErrorReceiver>,
    started: bool,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_input(&mut self, stage: Box<dyn Stage>) {
        self.input = Some(stage);
    }

    pub fn add_filter(&mut self, stage: Box<dyn Stage>) {
        self.filters.push(stage);
    }

    pub fn set_output(&mut self, stage: Box<dyn Stage>) {
        self.output = Some(stage);
    }

    /// Wire the stages together and start them, sink first.
    pub async fn start(&mut self) -> Result<(), PipelineError> {
        if self.started {
            return Err(PipelineError::AlreadyStarted("pipeline".into()));
        }
        if self.input.is_none() {
            return Err(PipelineError::MissingStage(StageKind::Input));
        }
        if self.output.is_none() {
            return Err(PipelineError::MissingStage(StageKind::Output));
        }

        let mut stages = self.stages_mut();

        // link outbound(i) → inbound(i + 1)
        let mut links = Vec::with_capacity(stages.len() - 1);
        for i in 0..stages.len() - 1 {
            let from = stages[i]
                .take_outbound()
                .ok_or_else(|| PipelineError::QueueUnavailable {
                    stage: stages[i].name().to_string(),
                    queue: "outbound",
                })?;
            let to = stages[i + 1]
                .take_inbound()
                .ok_or_else(|| PipelineError::QueueUnavailable {
                    stage: stages[i + 1].name().to_string(),
                    queue: "inbound",
                })?;
            let label = format!("{}→{}", stages[i].name(), stages[i + 1].name());
            links.push(tokio::spawn(forward(label, from, to)));
        }

        let (merged_tx, merged_rx) = mpsc::channel(stages.len());
        for stage in stages.iter_mut() {
            if let Some(mut errors) = stage.take_error_receiver() {
                let merged = merged_tx.clone();
                tokio::spawn(async move {
                    while let Some(err) = errors.recv().await {
                        if merged.send(err).await.is_err() {
                            break;
                        }
                    }
                });
            }
        }
        drop(merged_tx);

        let mut failed = None;
        for stage in stages.iter_mut().rev() {
            if let Err(e) = stage.start().await {
                failed = Some(e);
                break;
            }
            info!(stage = %stage.name(), "Started pipeline stage");
        }

        self.links = links;
        if let Some(e) = failed {
            // tear down whatever already runs so the queues close
            if let Err(stop_err) = self.stop().await {
                warn!(error = %stop_err, "Failed to stop pipeline after start error");
            }
            return Err(e);
        }
        self.errors = Some(merged_rx);
        self.started = true;
        Ok(())
    }

    /// Stop all stages, source first. Returns the first stop error, if any.
    pub async fn stop(&mut self) -> Result<(), PipelineError> {
        let mut first_err = None;
        for stage in self.stages_mut() {
            if let Err(e) = stage.stop().await {
                warn!(stage = %stage.name(), error = %e, "Failed to stop stage");
                first_err.get_or_insert(e);
            }
        }
        join_all(self.links.drain(..)).await;
        self.started = false;
        info!("Pipeline stopped");
        first_err.map_or(Ok(()), Err)
    }

    /// Take the merged error receiver. It yields every fatal stage error and
    /// closes once all stages have shut down.
    pub fn take_errors(&mut self) -> Option<ErrorReceiver> {
        self.errors.take()
    }

    /// Run until a stage reports a fatal error, every stage has shut down, or
    /// `shutdown` resolves; then stop the pipeline.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<(), PipelineError>
    where
        F: Future<Output = ()> + Send,
    {
        let mut errors = self
            .take_errors()
            .ok_or_else(|| PipelineError::Other("pipeline not started".into()))?;
        let outcome = tokio::select! {
            err = errors.recv() => match err {
                Some(e) => Err(e),
                None => Ok(()),
            },
            _ = shutdown => {
                info!("Shutdown requested");
                Ok(())
            }
        };
        self.stop().await?;
        outcome
    }

    fn stages_mut(&mut self) -> Vec<&mut Box<dyn Stage>> {
        let mut stages = Vec::with_capacity(self.filters.len() + 2);
        stages.extend(self.input.as_mut());
        stages.extend(self.filters.iter_mut());
        stages.extend(self.output.as_mut());
        stages
    }
}

async fn forward(label: String, mut from: EventReceiver, to: EventSender) {
    while let Some(evt) = from.recv().await {
        if to.send(evt).await.is_err() {
            debug!(link = %label, "Downstream closed");
            return;
        }
    }
    debug!(link = %label, "Upstream closed");
}
