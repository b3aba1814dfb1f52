//! The event envelope carried through every pipeline queue.
//!
//! Wire form (JSON):
//!
//! ```text
//! {
//!   "type": "chainsync.transaction",
//!   "timestamp": "2024-01-01T00:00:00Z",
//!   "payload": { "blockNumber": …, "blockHash": "…", "slotNumber": …, … }
//! }
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::asset::MultiAsset;
use crate::types::{Point, Tip};

// ─── Envelope ─────────────────────────────────────────────────────────────────

/// A single chain notification, stamped at emission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    /// Wrap a payload, stamping it with the current time.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::Block(_) => EventKind::Block,
            EventPayload::Transaction(_) => EventKind::Transaction,
            EventPayload::Rollback(_) => EventKind::Rollback,
        }
    }

    pub fn as_transaction(&self) -> Option<&TransactionEvent> {
        match &self.payload {
            EventPayload::Transaction(tx) => Some(tx),
            _ => None,
        }
    }
}

/// Closed set of payloads an event can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EventPayload {
    #[serde(rename = "chainsync.block")]
    Block(BlockEvent),
    #[serde(rename = "chainsync.transaction")]
    Transaction(TransactionEvent),
    #[serde(rename = "chainsync.rollback")]
    Rollback(RollbackEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Block,
    Transaction,
    Rollback,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => write!(f, "chainsync.block"),
            Self::Transaction => write!(f, "chainsync.transaction"),
            Self::Rollback => write!(f, "chainsync.rollback"),
        }
    }
}

// ─── Payloads ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEvent {
    pub block_number: u64,
    pub block_hash: String,
    pub slot_number: u64,
    /// Raw block CBOR; only present when raw encodings are enabled.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serde_hex::option"
    )]
    pub block_cbor: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEvent {
    pub block_number: u64,
    pub block_hash: String,
    pub slot_number: u64,
    pub transaction_hash: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serde_hex::option"
    )]
    pub transaction_cbor: Option<Vec<u8>>,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Reference to an output being spent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInput {
    pub transaction_hash: String,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutput {
    pub address: Address,
    /// Lovelace amount.
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<MultiAsset>,
}

/// The chain switched branches at `point`. Consumers should treat anything
/// emitted at or after that point as superseded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackEvent {
    pub point: Point,
    pub tip: Tip,
}

impl From<BlockEvent> for EventPayload {
    fn from(evt: BlockEvent) -> Self {
        Self::Block(evt)
    }
}

impl From<TransactionEvent> for EventPayload {
    fn from(evt: TransactionEvent) -> Self {
        Self::Transaction(evt)
    }
}

impl From<RollbackEvent> for EventPayload {
    fn from(evt: RollbackEvent) -> Self {
        Self::Rollback(evt)
    }
}
