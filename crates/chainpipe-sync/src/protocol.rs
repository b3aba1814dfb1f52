//! Interface to the node protocol client.
//!
//! The wire-level client (handshake, multiplexing, CBOR decoding) lives
//! outside this crate. It is reached through three traits:
//!
//! - [`Connector`] dials a [`DialTarget`] and returns a [`NodeConnection`];
//! - [`NodeConnection`] issues chain-sync and block-fetch requests;
//! - [`ChainSyncHandler`] receives the resulting notifications. The
//!   [`SyncEngine`](crate::SyncEngine) implements it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use chainpipe_core::{Point, Tip, TransactionInput, TransactionOutput};

use crate::error::SyncError;

// ─── Dial target ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialFamily {
    Tcp,
    Unix,
}

impl fmt::Display for DialFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Unix => write!(f, "unix"),
        }
    }
}

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialTarget {
    pub family: DialFamily,
    pub address: String,
    /// Node-to-node (relay) protocol; node-to-client otherwise.
    pub node_to_node: bool,
    pub network_magic: u32,
}

impl fmt::Display for DialTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.node_to_node { "n2n" } else { "n2c" };
        write!(f, "{}://{} ({mode}, magic {})", self.family, self.address, self.network_magic)
    }
}

// ─── Decoded ledger types ─────────────────────────────────────────────────────

/// A decoded block as handed over by the protocol client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub slot: u64,
    pub number: u64,
    #[serde(with = "chainpipe_core::serde_hex")]
    pub hash: Vec<u8>,
    #[serde(default, with = "chainpipe_core::serde_hex")]
    pub cbor: Vec<u8>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn point(&self) -> Point {
        Point::new(self.slot, self.hash.clone())
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(&self.hash)
    }
}

/// Header-only form of a block, as sent by node-to-node chain-sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub slot: u64,
    pub number: u64,
    #[serde(with = "chainpipe_core::serde_hex")]
    pub hash: Vec<u8>,
}

impl BlockHeader {
    pub fn point(&self) -> Point {
        Point::new(self.slot, self.hash.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(with = "chainpipe_core::serde_hex")]
    pub hash: Vec<u8>,
    #[serde(default, with = "chainpipe_core::serde_hex")]
    pub cbor: Vec<u8>,
    #[serde(default)]
    pub inputs: Vec<TransactionInput>,
    #[serde(default)]
    pub outputs: Vec<TransactionOutput>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Payload of a roll-forward notification.
#[derive(Debug, Clone, PartialEq)]
pub enum RollForward {
    /// Node-to-client chain-sync delivers full blocks.
    Block(Block),
    /// Node-to-node chain-sync delivers headers; the body must be fetched.
    Header(BlockHeader),
}

// ─── Collaborator traits ──────────────────────────────────────────────────────

/// Dials a node.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `target`, delivering notifications to `handler`.
    async fn connect(
        &self,
        target: &DialTarget,
        handler: Arc<dyn ChainSyncHandler>,
    ) -> Result<Arc<dyn NodeConnection>, SyncError>;
}

/// An established connection to a node.
#[async_trait]
pub trait NodeConnection: Send + Sync {
    /// Whether the block-fetch mini-protocol is available (node-to-node only).
    fn supports_block_fetch(&self) -> bool;

    async fn current_tip(&self) -> Result<Tip, SyncError>;

    /// Find the intersection with `points` and return the `(start, end)` of
    /// the blocks available after it.
    async fn available_block_range(&self, points: &[Point]) -> Result<(Point, Point), SyncError>;

    /// Request every block in `start..=end`; each is delivered through
    /// [`ChainSyncHandler::block_fetched`].
    async fn request_block_range(&self, start: &Point, end: &Point) -> Result<(), SyncError>;

    /// Start chain-sync from the best intersection with `points`.
    async fn sync(&self, points: &[Point]) -> Result<(), SyncError>;

    /// Fetch a single block body.
    async fn fetch_block(&self, point: &Point) -> Result<Block, SyncError>;

    /// Take the asynchronous error stream. It yields at most one error and
    /// closes when the connection ends.
    fn take_errors(&self) -> Option<mpsc::Receiver<SyncError>>;

    async fn close(&self) -> Result<(), SyncError>;
}

/// Receives chain-sync and block-fetch notifications.
///
/// Returning `Err` tells the connection to stop delivering.
#[async_trait]
pub trait ChainSyncHandler: Send + Sync {
    async fn roll_forward(&self, update: RollForward, tip: Tip) -> Result<(), SyncError>;

    async fn roll_backward(&self, point: Point, tip: Tip) -> Result<(), SyncError>;

    async fn block_fetched(&self, block: Block) -> Result<(), SyncError>;
}
