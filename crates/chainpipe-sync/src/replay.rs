//! `ReplayConnector` — serves a recorded node session.
//!
//! A session is a JSON-lines file; each line is one message:
//!
//! ```text
//! {"type":"tip","tip":{"point":{"slot":30,"hash":"…"},"blockNumber":3}}
//! {"type":"block","block":{"slot":10,"number":1,"hash":"…","transactions":[…]}}
//! {"type":"rollForward","block":{…},"tip":{…}}
//! {"type":"rollForwardHeader","header":{"slot":…,"number":…,"hash":"…"},"tip":{…}}
//! {"type":"rollBackward","point":{…},"tip":{…}}
//! {"type":"disconnect","reason":"…"}
//! ```
//!
//! `block` messages are the bodies available to block-fetch. Chain-sync
//! replays the `roll*` messages in file order, skipping roll-forwards at or
//! before the intersection. The session ends after the last message, or at
//! `disconnect`, which is reported as a connection error.
//!
//! Blank lines and lines starting with `#` are ignored.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use chainpipe_core::{Point, Tip};

use crate::error::SyncError;
use crate::protocol::{
    Block, BlockHeader, ChainSyncHandler, Connector, DialTarget, NodeConnection, RollForward,
};

/// One recorded message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReplayMessage {
    /// The node's tip at connection time.
    Tip { tip: Tip },
    /// A block body available to block-fetch.
    Block { block: Block },
    RollForward { block: Block, tip: Tip },
    RollForwardHeader { header: BlockHeader, tip: Tip },
    RollBackward { point: Point, tip: Tip },
    Disconnect { reason: String },
}

/// Connector replaying a recorded session instead of dialling a node.
#[derive(Debug, Clone)]
pub struct ReplayConnector {
    session: Arc<Vec<ReplayMessage>>,
    block_fetch: bool,
}

impl ReplayConnector {
    pub fn new(messages: Vec<ReplayMessage>) -> Self {
        Self {
            session: Arc::new(messages),
            block_fetch: true,
        }
    }

    pub fn from_json_lines(text: &str) -> Result<Self, SyncError> {
        let mut messages = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let msg = serde_json::from_str(line).map_err(|e| {
                SyncError::Configuration(format!("replay line {}: {e}", i + 1))
            })?;
            messages.push(msg);
        }
        Ok(Self::new(messages))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Configuration(format!("cannot read replay file {}: {e}", path.display()))
        })?;
        Self::from_json_lines(&text)
    }

    /// Behave like a node-to-client connection, which has no block-fetch.
    pub fn without_block_fetch(mut self) -> Self {
        self.block_fetch = false;
        self
    }

    pub fn len(&self) -> usize {
        self.session.len()
    }

    pub fn is_empty(&self) -> bool {
        self.session.is_empty()
    }
}

#[async_trait]
impl Connector for ReplayConnector {
    async fn connect(
        &self,
        target: &DialTarget,
        handler: Arc<dyn ChainSyncHandler>,
    ) -> Result<Arc<dyn NodeConnection>, SyncError> {
        tracing::info!(
            node = %target,
            messages = self.session.len(),
            "Replaying recorded session"
        );
        let (errors_tx, errors_rx) = mpsc::channel(1);
        Ok(Arc::new(ReplayConnection {
            session: Arc::clone(&self.session),
            block_fetch: self.block_fetch,
            handler,
            closed: Arc::new(AtomicBool::new(false)),
            errors_tx: Arc::new(Mutex::new(Some(errors_tx))),
            errors_rx: Mutex::new(Some(errors_rx)),
        }))
    }
}

struct ReplayConnection {
    session: Arc<Vec<ReplayMessage>>,
    block_fetch: bool,
    handler: Arc<dyn ChainSyncHandler>,
    closed: Arc<AtomicBool>,
    /// Dropped when the session ends, which closes the error stream.
    errors_tx: Arc<Mutex<Option<mpsc::Sender<SyncError>>>>,
    errors_rx: Mutex<Option<mpsc::Receiver<SyncError>>>,
}

impl ReplayConnection {
    fn ensure_open(&self) -> Result<(), SyncError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SyncError::Connection("connection closed".into()));
        }
        Ok(())
    }

    /// Bodies offered to block-fetch, in file order.
    fn fetchable(&self) -> impl Iterator<Item = &Block> {
        self.session.iter().filter_map(|m| match m {
            ReplayMessage::Block { block } => Some(block),
            _ => None,
        })
    }
}

fn intersect_slot(points: &[Point]) -> u64 {
    points.iter().map(|p| p.slot).max().unwrap_or(0)
}

#[async_trait]
impl NodeConnection for ReplayConnection {
    fn supports_block_fetch(&self) -> bool {
        self.block_fetch
    }

    async fn current_tip(&self) -> Result<Tip, SyncError> {
        self.ensure_open()?;
        let announced = self.session.iter().find_map(|m| match m {
            ReplayMessage::Tip { tip } => Some(tip.clone()),
            _ => None,
        });
        let last_seen = || {
            self.session.iter().rev().find_map(|m| match m {
                ReplayMessage::RollForward { tip, .. }
                | ReplayMessage::RollForwardHeader { tip, .. }
                | ReplayMessage::RollBackward { tip, .. } => Some(tip.clone()),
                _ => None,
            })
        };
        announced
            .or_else(last_seen)
            .ok_or_else(|| SyncError::Protocol("recorded session has no tip".into()))
    }

    async fn available_block_range(&self, points: &[Point]) -> Result<(Point, Point), SyncError> {
        self.ensure_open()?;
        let after = intersect_slot(points);
        let mut available = self.fetchable().filter(|b| b.slot > after);
        let first = available
            .next()
            .ok_or_else(|| SyncError::Protocol(format!("no blocks available after slot {after}")))?;
        let last = available.last().unwrap_or(first);
        Ok((first.point(), last.point()))
    }

    async fn request_block_range(&self, start: &Point, end: &Point) -> Result<(), SyncError> {
        self.ensure_open()?;
        let blocks: Vec<Block> = self
            .fetchable()
            .filter(|b| b.slot >= start.slot && b.slot <= end.slot)
            .cloned()
            .collect();
        let handler = Arc::clone(&self.handler);
        let closed = Arc::clone(&self.closed);
        tokio::spawn(async move {
            for block in blocks {
                if closed.load(Ordering::SeqCst) {
                    return;
                }
                if let Err(e) = handler.block_fetched(block).await {
                    tracing::debug!(error = %e, "Block-fetch replay stopped by handler");
                    return;
                }
            }
        });
        Ok(())
    }

    async fn sync(&self, points: &[Point]) -> Result<(), SyncError> {
        self.ensure_open()?;
        let after = intersect_slot(points);
        let session = Arc::clone(&self.session);
        let handler = Arc::clone(&self.handler);
        let closed = Arc::clone(&self.closed);
        let errors = Arc::clone(&self.errors_tx);
        tokio::spawn(async move {
            for msg in session.iter() {
                if closed.load(Ordering::SeqCst) {
                    break;
                }
                let delivered = match msg {
                    ReplayMessage::RollForward { block, tip } if block.slot > after => {
                        handler
                            .roll_forward(RollForward::Block(block.clone()), tip.clone())
                            .await
                    }
                    ReplayMessage::RollForwardHeader { header, tip } if header.slot > after => {
                        handler
                            .roll_forward(RollForward::Header(header.clone()), tip.clone())
                            .await
                    }
                    ReplayMessage::RollBackward { point, tip } => {
                        handler.roll_backward(point.clone(), tip.clone()).await
                    }
                    ReplayMessage::Disconnect { reason } => {
                        let sender = errors.lock().take();
                        if let Some(sender) = sender {
                            let _ = sender.send(SyncError::Connection(reason.clone())).await;
                        }
                        return;
                    }
                    _ => Ok(()),
                };
                if let Err(e) = delivered {
                    tracing::debug!(error = %e, "Chain-sync replay stopped by handler");
                    break;
                }
            }
            tracing::debug!("Recorded session exhausted");
            errors.lock().take();
        });
        Ok(())
    }

    async fn fetch_block(&self, point: &Point) -> Result<Block, SyncError> {
        self.ensure_open()?;
        self.session
            .iter()
            .find_map(|m| match m {
                ReplayMessage::Block { block } | ReplayMessage::RollForward { block, .. }
                    if block.slot == point.slot && block.hash == point.hash =>
                {
                    Some(block.clone())
                }
                _ => None,
            })
            .ok_or_else(|| SyncError::Protocol(format!("block {point} not available")))
    }

    fn take_errors(&self) -> Option<mpsc::Receiver<SyncError>> {
        self.errors_rx.lock().take()
    }

    async fn close(&self) -> Result<(), SyncError> {
        self.closed.store(true, Ordering::SeqCst);
        self.errors_tx.lock().take();
        Ok(())
    }
}
