//! Sync engine integration tests.
//!
//! Each test drives a `SyncEngine` through a `ReplayConnector` session and
//! checks the emitted event stream, the error channel and the sync status.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chainpipe_core::stage::{ErrorReceiver, EventReceiver};
use chainpipe_core::{Event, EventKind, EventPayload, PipelineError, Point, Stage, Tip};
use chainpipe_sync::{
    Block, BlockHeader, ChainSyncHandler, Connector, DialTarget, NodeConnection, ReplayConnector,
    ReplayMessage, SyncConfig, SyncEngine, SyncError, SyncState, SyncStatus, Transaction,
};

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn hash(slot: u64) -> Vec<u8> {
    let mut h = vec![0u8; 32];
    h[..8].copy_from_slice(&slot.to_be_bytes());
    h
}

fn point(slot: u64) -> Point {
    Point::new(slot, hash(slot))
}

fn tip(slot: u64) -> Tip {
    Tip::new(point(slot), slot / 10)
}

fn block(slot: u64, txs: usize) -> Block {
    Block {
        slot,
        number: slot / 10,
        hash: hash(slot),
        cbor: vec![],
        transactions: (0..txs)
            .map(|i| Transaction {
                hash: vec![i as u8; 32],
                cbor: vec![],
                inputs: vec![],
                outputs: vec![],
                metadata: None,
            })
            .collect(),
    }
}

fn body(slot: u64, txs: usize) -> ReplayMessage {
    ReplayMessage::Block {
        block: block(slot, txs),
    }
}

fn forward(slot: u64, txs: usize, tip_slot: u64) -> ReplayMessage {
    ReplayMessage::RollForward {
        block: block(slot, txs),
        tip: tip(tip_slot),
    }
}

fn relay() -> SyncConfig {
    SyncConfig::builder().address("127.0.0.1:3001").build()
}

struct Harness {
    engine: SyncEngine,
    events: EventReceiver,
    errors: ErrorReceiver,
    statuses: Arc<Mutex<Vec<SyncStatus>>>,
}

fn harness(config: SyncConfig, connector: impl Connector + 'static) -> Harness {
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&statuses);
    let mut engine = SyncEngine::new(config, Arc::new(connector))
        .with_status_observer(move |s: &SyncStatus| seen.lock().unwrap().push(s.clone()));
    let events = engine.take_outbound().unwrap();
    let errors = engine.take_error_receiver().unwrap();
    Harness {
        engine,
        events,
        errors,
        statuses,
    }
}

/// Collect events until the stream closes.
async fn drain(events: &mut EventReceiver) -> Vec<Event> {
    let mut out = vec![];
    loop {
        match tokio::time::timeout(Duration::from_secs(5), events.recv()).await {
            Ok(Some(evt)) => out.push(evt),
            Ok(None) => return out,
            Err(_) => panic!("event stream did not close; got {} events", out.len()),
        }
    }
}

fn block_slots(events: &[Event]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match &e.payload {
            EventPayload::Block(b) => Some(b.slot_number),
            _ => None,
        })
        .collect()
}

fn kinds(events: &[Event]) -> Vec<EventKind> {
    events.iter().map(Event::kind).collect()
}

fn sync_error(err: &PipelineError) -> &SyncError {
    err.downcast_source::<SyncError>()
        .unwrap_or_else(|| panic!("not a sync error: {err}"))
}

// ─── Bulk mode ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn bulk_fetch_switches_to_chain_sync_at_range_end() {
    let replay = ReplayConnector::new(vec![
        body(100, 0),
        body(150, 0),
        body(200, 0),
        // at or before the range end: never replayed by chain-sync
        forward(150, 0, 200),
        forward(200, 0, 200),
    ]);
    let config = SyncConfig::builder()
        .address("127.0.0.1:3001")
        .bulk_mode(true)
        .intersect_point(point(50))
        .build();
    let mut h = harness(config, replay);
    h.engine.start().await.unwrap();

    let events = drain(&mut h.events).await;
    assert_eq!(block_slots(&events), vec![100, 150, 200]);
    assert_eq!(h.engine.state(), SyncState::IncrementalSyncing);

    let range = h.engine.bulk_range().unwrap();
    assert_eq!((range.start.slot, range.end.slot), (100, 200));

    let statuses = h.statuses.lock().unwrap().clone();
    assert_eq!(statuses.len(), 3);
    assert!(statuses.iter().all(|s| !s.tip_reached && s.tip_slot_number == 200));
    assert_eq!(h.engine.status().slot_number, 200);
    assert!(h.errors.recv().await.is_none());
}

#[tokio::test]
async fn chain_sync_after_bulk_reaches_tip_once() {
    let replay = ReplayConnector::new(vec![
        body(100, 0),
        body(150, 0),
        body(200, 0),
        forward(250, 0, 300),
        forward(260, 0, 300),
        forward(300, 0, 300),
    ]);
    let config = SyncConfig::builder()
        .address("127.0.0.1:3001")
        .bulk_mode(true)
        .build();
    let mut h = harness(config, replay);
    h.engine.start().await.unwrap();

    let events = drain(&mut h.events).await;
    assert_eq!(block_slots(&events), vec![100, 150, 200, 250, 260, 300]);

    let reached: Vec<bool> = h.statuses.lock().unwrap().iter().map(|s| s.tip_reached).collect();
    // 250 is past the bulk range and at/after the last known tip (200)
    assert_eq!(reached, vec![false, false, false, true, true, true]);
}

#[tokio::test]
async fn bulk_mode_without_block_fetch_uses_chain_sync() {
    let replay =
        ReplayConnector::new(vec![body(10, 0), forward(10, 0, 20), forward(20, 0, 20)])
            .without_block_fetch();
    let config = SyncConfig::builder()
        .address("127.0.0.1:3001")
        .bulk_mode(true)
        .build();
    let mut h = harness(config, replay);
    h.engine.start().await.unwrap();

    assert_eq!(block_slots(&drain(&mut h.events).await), vec![10, 20]);
    assert!(h.engine.bulk_range().is_none());
}

// ─── Incremental mode ─────────────────────────────────────────────────────────

#[tokio::test]
async fn block_event_precedes_its_transactions() {
    let replay = ReplayConnector::new(vec![forward(10, 3, 20), forward(20, 1, 20)]);
    let mut h = harness(relay(), replay);
    h.engine.start().await.unwrap();

    let events = drain(&mut h.events).await;
    assert_eq!(
        kinds(&events),
        vec![
            EventKind::Block,
            EventKind::Transaction,
            EventKind::Transaction,
            EventKind::Transaction,
            EventKind::Block,
            EventKind::Transaction,
        ]
    );
    let first_block_txs: Vec<String> = events[1..4]
        .iter()
        .map(|e| e.as_transaction().unwrap().transaction_hash.clone())
        .collect();
    assert_eq!(
        first_block_txs,
        vec!["00".repeat(32), "01".repeat(32), "02".repeat(32)]
    );
    assert!(events[1..4]
        .iter()
        .all(|e| e.as_transaction().unwrap().slot_number == 10));
}

#[tokio::test]
async fn header_roll_forward_fetches_the_body() {
    let replay = ReplayConnector::new(vec![
        body(10, 2),
        ReplayMessage::RollForwardHeader {
            header: BlockHeader {
                slot: 10,
                number: 1,
                hash: hash(10),
            },
            tip: tip(10),
        },
    ]);
    let mut h = harness(relay(), replay);
    h.engine.start().await.unwrap();

    let events = drain(&mut h.events).await;
    assert_eq!(
        kinds(&events),
        vec![EventKind::Block, EventKind::Transaction, EventKind::Transaction]
    );
    assert_eq!(h.engine.status().slot_number, 10);
}

#[tokio::test]
async fn failed_body_fetch_reports_one_error_then_closes() {
    let replay = ReplayConnector::new(vec![
        ReplayMessage::RollForwardHeader {
            header: BlockHeader {
                slot: 10,
                number: 1,
                hash: hash(10),
            },
            tip: tip(20),
        },
        forward(20, 0, 20),
    ]);
    let mut h = harness(relay(), replay);
    h.engine.start().await.unwrap();

    let err = h.errors.recv().await.unwrap();
    assert!(matches!(sync_error(&err), SyncError::Protocol(_)));
    assert!(h.errors.recv().await.is_none());
    assert!(drain(&mut h.events).await.is_empty());
    assert!(h.statuses.lock().unwrap().is_empty());
}

#[tokio::test]
async fn rollback_is_emitted_and_leaves_status_alone() {
    let replay = ReplayConnector::new(vec![
        forward(10, 0, 30),
        ReplayMessage::RollBackward {
            point: point(5),
            tip: tip(30),
        },
    ]);
    let mut h = harness(relay(), replay);
    h.engine.start().await.unwrap();

    let events = drain(&mut h.events).await;
    assert_eq!(kinds(&events), vec![EventKind::Block, EventKind::Rollback]);
    match &events[1].payload {
        EventPayload::Rollback(rb) => {
            assert_eq!(rb.point, point(5));
            assert_eq!(rb.tip.point.slot, 30);
        }
        other => panic!("expected rollback, got {other:?}"),
    }
    assert_eq!(h.engine.status().slot_number, 10);
    assert_eq!(h.statuses.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn intersect_tip_starts_from_current_tip() {
    let replay = ReplayConnector::new(vec![
        ReplayMessage::Tip { tip: tip(30) },
        body(10, 0),
        forward(10, 0, 40),
        forward(20, 0, 40),
        forward(30, 0, 40),
        forward(40, 0, 40),
    ]);
    let config = SyncConfig::builder()
        .address("127.0.0.1:3001")
        .bulk_mode(true)
        .intersect_tip(true)
        .build();
    let mut h = harness(config, replay);
    h.engine.start().await.unwrap();

    assert_eq!(block_slots(&drain(&mut h.events).await), vec![40]);
    assert_eq!(h.engine.state(), SyncState::IncrementalSyncing);
    assert!(h.engine.bulk_range().is_none());
}

#[tokio::test]
async fn connection_error_is_reported_once() {
    let replay = ReplayConnector::new(vec![
        forward(10, 0, 10),
        ReplayMessage::Disconnect {
            reason: "peer reset".into(),
        },
        forward(20, 0, 20),
    ]);
    let mut h = harness(relay(), replay);
    h.engine.start().await.unwrap();

    let err = h.errors.recv().await.unwrap();
    assert!(matches!(sync_error(&err), SyncError::Connection(m) if m == "peer reset"));
    assert!(h.errors.recv().await.is_none());
    assert_eq!(block_slots(&drain(&mut h.events).await), vec![10]);
}

#[tokio::test]
async fn recorded_fixture_session() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/preview-session.jsonl");
    let replay = ReplayConnector::from_path(path).unwrap();
    let config = SyncConfig::builder()
        .network("preview")
        .bulk_mode(true)
        .build();
    let mut h = harness(config, replay);
    h.engine.start().await.unwrap();

    let events = drain(&mut h.events).await;
    assert_eq!(block_slots(&events), vec![1000, 1020, 1040, 1060]);
    assert_eq!(events.len(), 9);
    assert_eq!(events[6].kind(), EventKind::Rollback);
    assert!(h.engine.status().tip_reached);
}

// ─── Startup failures ─────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_network_fails_before_any_event() {
    let config = SyncConfig::builder().network("devnet").build();
    let mut h = harness(config, ReplayConnector::new(vec![forward(10, 0, 10)]));

    let err = h.engine.start().await.unwrap_err();
    assert!(matches!(sync_error(&err), SyncError::Configuration(_)));
    assert_eq!(h.engine.state(), SyncState::Idle);
    // nothing was emitted and both streams are closed
    assert!(h.events.recv().await.is_none());
    assert!(h.errors.recv().await.is_none());
}

#[tokio::test]
async fn missing_target_fails_start() {
    let mut h = harness(SyncConfig::default(), ReplayConnector::new(vec![]));
    let err = h.engine.start().await.unwrap_err();
    assert!(matches!(sync_error(&err), SyncError::Configuration(_)));
}

struct Unreachable;

#[async_trait]
impl Connector for Unreachable {
    async fn connect(
        &self,
        _target: &DialTarget,
        _handler: Arc<dyn ChainSyncHandler>,
    ) -> Result<Arc<dyn NodeConnection>, SyncError> {
        Err(SyncError::Protocol("handshake refused".into()))
    }
}

#[tokio::test]
async fn connect_failure_is_a_connection_error() {
    let mut h = harness(relay(), Unreachable);
    let err = h.engine.start().await.unwrap_err();
    assert!(matches!(sync_error(&err), SyncError::Connection(m) if m.contains("handshake refused")));
}

#[tokio::test]
async fn empty_bulk_range_fails_start() {
    let config = SyncConfig::builder()
        .address("127.0.0.1:3001")
        .bulk_mode(true)
        .intersect_point(point(500))
        .build();
    let mut h = harness(config, ReplayConnector::new(vec![body(100, 0)]));
    let err = h.engine.start().await.unwrap_err();
    assert!(matches!(sync_error(&err), SyncError::Protocol(_)));
}

// ─── Shutdown ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn stop_closes_streams() {
    let session: Vec<ReplayMessage> = (1..=200).map(|i| forward(i * 10, 1, 2000)).collect();
    let mut h = harness(relay(), ReplayConnector::new(session));
    h.engine.start().await.unwrap();

    // let the queue fill up, then stop mid-stream
    assert!(h.events.recv().await.is_some());
    h.engine.stop().await.unwrap();

    let rest = drain(&mut h.events).await;
    assert!(rest.len() < 399);
    assert!(h.errors.recv().await.is_none());
    assert_eq!(h.engine.state(), SyncState::Stopped);
    assert!(matches!(
        h.engine.start().await,
        Err(PipelineError::AlreadyStarted(_))
    ));
}
