//! The stage registry available to the `chainpipe` binary.

use std::sync::Arc;

use chainpipe_core::{PipelineError, Stage, StageKind, StageRegistry};
use chainpipe_filter::filter_stage;
use chainpipe_output::{output_stage, LogSink, WebhookSink};
use chainpipe_sync::{ReplayConnector, SyncEngine, SyncError};

use crate::options::Options;

/// Every input, filter and output this build knows about.
pub fn registry() -> StageRegistry<Options> {
    let mut registry = StageRegistry::new();
    registry.register(
        StageKind::Input,
        chainpipe_sync::STAGE_NAME,
        "Follow a Cardano node with chain-sync and block-fetch",
        chainsync_input,
    );
    registry.register(
        StageKind::Filter,
        chainpipe_filter::STAGE_NAME,
        "Keep transactions touching the given addresses, policies or assets",
        |opts: &Options| Ok(Box::new(filter_stage(opts.filter_criteria())) as Box<dyn Stage>),
    );
    registry.register(
        StageKind::Output,
        "log",
        "Write each event as a JSON log line",
        |_: &Options| Ok(Box::new(output_stage(LogSink::new())) as Box<dyn Stage>),
    );
    registry.register(
        StageKind::Output,
        "webhook",
        "POST each event as JSON to a URL",
        webhook_output,
    );
    registry
}

fn chainsync_input(opts: &Options) -> Result<Box<dyn Stage>, PipelineError> {
    let config = opts.sync_config();
    // surface bad network/target settings before anything connects
    config
        .dial_target()
        .map_err(|e| PipelineError::stage(chainpipe_sync::STAGE_NAME, e))?;

    let path = opts.chainsync_replay.as_ref().ok_or_else(|| {
        PipelineError::stage(
            chainpipe_sync::STAGE_NAME,
            SyncError::Configuration(
                "no node protocol client is linked into this build; use --input-chainsync-replay"
                    .into(),
            ),
        )
    })?;
    let connector = ReplayConnector::from_path(path)
        .map_err(|e| PipelineError::stage(chainpipe_sync::STAGE_NAME, e))?;
    tracing::info!(path = %path.display(), messages = connector.len(), "Replaying recorded session");

    let engine = SyncEngine::new(config, Arc::new(connector)).with_status_observer(|status| {
        tracing::debug!(
            slot = status.slot_number,
            block = status.block_number,
            tip_slot = status.tip_slot_number,
            tip_reached = status.tip_reached,
            "Sync status"
        );
    });
    Ok(Box::new(engine))
}

fn webhook_output(opts: &Options) -> Result<Box<dyn Stage>, PipelineError> {
    let sink = WebhookSink::new(opts.webhook_config())
        .map_err(|e| PipelineError::stage("webhook", e))?;
    tracing::info!(url = sink.endpoint(), "Posting events to webhook");
    Ok(Box::new(output_stage(sink)))
}
