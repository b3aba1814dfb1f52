//! `SyncEngine` — the chain-sync input stage.
//!
//! # Bulk mode
//! When enabled (and not intersecting at the tip), the engine asks the node
//! for the block range available after the intersection points and fetches it
//! through block-fetch. Once the block at the end of that range arrives it
//! starts chain-sync from there.
//!
//! # Incremental mode
//! Chain-sync from the intersection points (or the node's current tip).
//! Header-only roll-forwards are completed with a targeted block fetch.
//!
//! Every block produces one block event followed by one transaction event per
//! transaction, in block order. Rollbacks produce a rollback event and leave
//! the sync status untouched.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use chainpipe_core::stage::{error_queue, event_queue, ErrorReceiver, ErrorSender, EventReceiver, EventSender};
use chainpipe_core::{Event, EventPayload, PipelineError, Point, RollbackEvent, Stage, Tip};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::events::{block_event, transaction_event};
use crate::protocol::{Block, ChainSyncHandler, Connector, NodeConnection, RollForward};
use crate::status::{BulkRange, StatusObserver, StatusTracker, SyncState, SyncStatus};

/// Name under which the engine reports logs and errors.
pub const STAGE_NAME: &str = "chainsync";

/// Input stage that turns a node's chain-sync and block-fetch notifications
/// into an ordered event stream.
pub struct SyncEngine {
    config: SyncConfig,
    connector: Arc<dyn Connector>,
    core: Arc<EngineCore>,
    outbound: Option<EventReceiver>,
    errors: Option<ErrorReceiver>,
    started: bool,
}

impl SyncEngine {
    pub fn new(config: SyncConfig, connector: Arc<dyn Connector>) -> Self {
        let (events_tx, events_rx) = event_queue();
        let (errors_tx, errors_rx) = error_queue();
        let core = Arc::new(EngineCore {
            include_cbor: config.include_cbor,
            state: Mutex::new(SyncState::Idle),
            bulk_range: Mutex::new(None),
            tracker: Mutex::new(StatusTracker::new()),
            observer: Mutex::new(None),
            events: Mutex::new(Some(events_tx)),
            closing: watch::channel(false).0,
            errors: Mutex::new(Some(errors_tx)),
            connection: Mutex::new(None),
        });
        Self {
            config,
            connector,
            core,
            outbound: Some(events_rx),
            errors: Some(errors_rx),
            started: false,
        }
    }

    /// Install a callback invoked with a status snapshot after every block.
    pub fn with_status_observer<F>(self, observer: F) -> Self
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        let observer: StatusObserver = Arc::new(observer);
        *self.core.observer.lock() = Some(observer);
        self
    }

    pub fn state(&self) -> SyncState {
        *self.core.state.lock()
    }

    pub fn status(&self) -> SyncStatus {
        self.core.tracker.lock().status().clone()
    }

    /// The range fetched in bulk, if bulk mode was used.
    pub fn bulk_range(&self) -> Option<BulkRange> {
        self.core.bulk_range.lock().clone()
    }

    async fn connect_and_sync(&mut self) -> Result<(), SyncError> {
        let target = self.config.dial_target()?;
        tracing::info!(node = %target, "Connecting to node");

        let handler: Arc<dyn ChainSyncHandler> = self.core.clone();
        let conn = self
            .connector
            .connect(&target, handler)
            .await
            .map_err(|e| match e {
                SyncError::Connection(_) => e,
                other => SyncError::Connection(other.to_string()),
            })?;
        *self.core.connection.lock() = Some(Arc::clone(&conn));

        if let Some(errors) = conn.take_errors() {
            tokio::spawn(watch_connection(Arc::clone(&self.core), errors));
        }

        if let Err(e) = self.begin(conn.as_ref()).await {
            self.core.connection.lock().take();
            if let Err(close_err) = conn.close().await {
                tracing::warn!(error = %close_err, "Failed to close connection after startup error");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Pick bulk or incremental mode and issue the first request.
    async fn begin(&self, conn: &dyn NodeConnection) -> Result<(), SyncError> {
        let cfg = &self.config;
        if cfg.bulk_mode && !cfg.intersect_tip && conn.supports_block_fetch() {
            let (start, end) = conn.available_block_range(&cfg.intersect_points).await?;
            tracing::info!(start = %start, end = %end, "Starting bulk fetch");
            self.core.begin_bulk(BulkRange {
                start: start.clone(),
                end: end.clone(),
            });
            conn.request_block_range(&start, &end).await?;
            return Ok(());
        }

        if cfg.bulk_mode && !cfg.intersect_tip {
            tracing::warn!("Block-fetch unavailable on this connection, using chain-sync only");
        }
        let points = if cfg.intersect_tip {
            let tip = conn.current_tip().await?;
            tracing::info!(slot = tip.point.slot, "Intersecting at current tip");
            vec![tip.point]
        } else {
            cfg.intersect_points.clone()
        };
        tracing::info!(points = points.len(), "Starting chain-sync");
        *self.core.state.lock() = SyncState::IncrementalSyncing;
        conn.sync(&points).await
    }
}

#[async_trait]
impl Stage for SyncEngine {
    fn name(&self) -> &str {
        STAGE_NAME
    }

    async fn start(&mut self) -> Result<(), PipelineError> {
        if self.started {
            return Err(PipelineError::AlreadyStarted(STAGE_NAME.into()));
        }
        self.started = true;
        if let Err(e) = self.connect_and_sync().await {
            tracing::error!(error = %e, "Chain-sync failed to start");
            self.core.close_streams();
            return Err(PipelineError::stage(STAGE_NAME, e));
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), PipelineError> {
        let conn = self.core.connection.lock().take();
        let closed = match conn {
            Some(conn) => conn.close().await,
            None => Ok(()),
        };
        *self.core.state.lock() = SyncState::Stopped;
        self.core.close_streams();
        tracing::info!("Chain-sync stopped");
        closed.map_err(|e| PipelineError::stage(STAGE_NAME, e))
    }

    fn take_error_receiver(&mut self) -> Option<ErrorReceiver> {
        self.errors.take()
    }

    fn take_outbound(&mut self) -> Option<EventReceiver> {
        self.outbound.take()
    }
}

/// Forward the connection's error stream. A clean end of the stream means the
/// node session is over, so the event stream is closed too.
async fn watch_connection(core: Arc<EngineCore>, mut errors: mpsc::Receiver<SyncError>) {
    match errors.recv().await {
        Some(err) => core.fail(err),
        None => {
            tracing::info!("Node connection ended");
            core.close_streams();
        }
    }
}

// ─── Notification path ────────────────────────────────────────────────────────

/// State shared between the stage handle and the connection's callbacks.
struct EngineCore {
    include_cbor: bool,
    state: Mutex<SyncState>,
    bulk_range: Mutex<Option<BulkRange>>,
    tracker: Mutex<StatusTracker>,
    observer: Mutex<Option<StatusObserver>>,
    /// `None` once the stream is closed; later notifications are dropped.
    events: Mutex<Option<EventSender>>,
    /// Set when the streams close, cancelling any send blocked on a full queue.
    closing: watch::Sender<bool>,
    /// Taken by the first fatal error, so it is reported at most once.
    errors: Mutex<Option<ErrorSender>>,
    connection: Mutex<Option<Arc<dyn NodeConnection>>>,
}

impl EngineCore {
    fn begin_bulk(&self, range: BulkRange) {
        self.tracker.lock().set_bulk_end_slot(range.end.slot);
        *self.bulk_range.lock() = Some(range);
        *self.state.lock() = SyncState::BulkFetching;
    }

    fn connection(&self) -> Result<Arc<dyn NodeConnection>, SyncError> {
        self.connection.lock().clone().ok_or(SyncError::Closed)
    }

    /// Move from `from` to `to`; returns `false` if not in `from`.
    fn transition(&self, from: SyncState, to: SyncState) -> bool {
        let mut state = self.state.lock();
        if *state != from {
            return false;
        }
        *state = to;
        true
    }

    /// Queue one event. A send still waiting for capacity when the streams
    /// close is abandoned, so nothing is emitted after a reported error.
    async fn emit(&self, payload: EventPayload) -> Result<(), SyncError> {
        let mut closing = self.closing.subscribe();
        let events = self.events.lock().clone().ok_or(SyncError::Closed)?;
        tokio::select! {
            biased;
            _ = closing.wait_for(|closed| *closed) => Err(SyncError::Closed),
            sent = events.send(Event::new(payload)) => sent.map_err(|_| SyncError::Closed),
        }
    }

    async fn emit_block(&self, block: &Block) -> Result<(), SyncError> {
        self.emit(block_event(block, self.include_cbor).into()).await?;
        for tx in &block.transactions {
            self.emit(transaction_event(block, tx, self.include_cbor).into())
                .await?;
        }
        tracing::debug!(
            slot = block.slot,
            number = block.number,
            txs = block.transactions.len(),
            "Block emitted"
        );
        Ok(())
    }

    fn update_status(&self, block: &Block, tip: &Point) {
        let snapshot = self
            .tracker
            .lock()
            .update(block.slot, block.number, block.hash_hex(), tip);
        let observer = self.observer.lock().clone();
        if let Some(observer) = observer {
            observer(&snapshot);
        }
    }

    /// Report `err` once and close both streams.
    fn fail(&self, err: SyncError) {
        let errors = self.errors.lock().take();
        self.events.lock().take();
        self.closing.send_replace(true);
        if let Some(errors) = errors {
            tracing::error!(error = %err, "Chain-sync failed");
            // single-slot channel, first and only send
            let _ = errors.try_send(PipelineError::stage(STAGE_NAME, err));
        }
    }

    fn close_streams(&self) {
        self.closing.send_replace(true);
        self.events.lock().take();
        self.errors.lock().take();
    }

    /// Report failures; a closed stream just means we are shutting down.
    fn settle(&self, result: Result<(), SyncError>) -> Result<(), SyncError> {
        match &result {
            Err(e) if e.is_closed() => tracing::debug!("Event stream closed, dropping notification"),
            Err(e) => self.fail(e.clone()),
            Ok(()) => {}
        }
        result
    }

    async fn handle_roll_forward(&self, update: RollForward, tip: Tip) -> Result<(), SyncError> {
        let block = match update {
            RollForward::Block(block) => block,
            RollForward::Header(header) => {
                let point = header.point();
                self.connection()?
                    .fetch_block(&point)
                    .await
                    .map_err(|e| fetch_failed(&point, e))?
            }
        };
        self.emit_block(&block).await?;
        self.update_status(&block, &tip.point);
        Ok(())
    }

    async fn handle_roll_backward(&self, point: Point, tip: Tip) -> Result<(), SyncError> {
        tracing::info!(slot = point.slot, hash = %point.hash_hex(), "Rollback");
        self.emit(RollbackEvent { point, tip }.into()).await
    }

    async fn handle_block_fetched(&self, block: Block) -> Result<(), SyncError> {
        let range = self
            .bulk_range
            .lock()
            .clone()
            .ok_or_else(|| SyncError::Protocol("block delivered outside of a bulk fetch".into()))?;
        self.emit_block(&block).await?;
        // the tip is not advertised during block-fetch
        self.update_status(&block, &range.end);

        if block.slot == range.end.slot
            && self.transition(SyncState::BulkFetching, SyncState::IncrementalSyncing)
        {
            tracing::info!(slot = block.slot, "Bulk fetch complete, switching to chain-sync");
            self.connection()?.sync(std::slice::from_ref(&range.end)).await?;
        }
        Ok(())
    }
}

fn fetch_failed(point: &Point, err: SyncError) -> SyncError {
    match err {
        SyncError::Closed => err,
        SyncError::Protocol(msg) => SyncError::Protocol(format!("fetch block {point}: {msg}")),
        other => SyncError::Protocol(format!("fetch block {point}: {other}")),
    }
}

#[async_trait]
impl ChainSyncHandler for EngineCore {
    async fn roll_forward(&self, update: RollForward, tip: Tip) -> Result<(), SyncError> {
        let result = self.handle_roll_forward(update, tip).await;
        self.settle(result)
    }

    async fn roll_backward(&self, point: Point, tip: Tip) -> Result<(), SyncError> {
        let result = self.handle_roll_backward(point, tip).await;
        self.settle(result)
    }

    async fn block_fetched(&self, block: Block) -> Result<(), SyncError> {
        let result = self.handle_block_fetched(block).await;
        self.settle(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chainpipe_core::{BlockEvent, QUEUE_CAPACITY};

    use crate::replay::ReplayConnector;

    fn block_payload(slot: u64) -> EventPayload {
        BlockEvent {
            block_number: slot,
            block_hash: String::new(),
            slot_number: slot,
            block_cbor: None,
        }
        .into()
    }

    #[tokio::test]
    async fn send_blocked_on_full_queue_is_dropped_after_failure() {
        let mut engine = SyncEngine::new(
            SyncConfig::default(),
            Arc::new(ReplayConnector::new(vec![])),
        );
        let mut events = engine.take_outbound().unwrap();
        let mut errors = engine.take_error_receiver().unwrap();

        for slot in 0..QUEUE_CAPACITY as u64 {
            engine.core.emit(block_payload(slot)).await.unwrap();
        }
        let core = Arc::clone(&engine.core);
        let pending = tokio::spawn(async move { core.emit(block_payload(99)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        engine.core.fail(SyncError::Protocol("fetch failed".into()));
        assert!(matches!(pending.await.unwrap(), Err(SyncError::Closed)));
        assert!(errors.recv().await.is_some());
        assert!(errors.recv().await.is_none());

        let mut slots = vec![];
        while let Some(evt) = events.recv().await {
            if let EventPayload::Block(b) = &evt.payload {
                slots.push(b.slot_number);
            }
        }
        assert_eq!(slots, (0..QUEUE_CAPACITY as u64).collect::<Vec<_>>());
    }
}
