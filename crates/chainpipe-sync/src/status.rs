//! Sync progress tracking.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use chainpipe_core::Point;

/// Snapshot of sync progress, handed to the status observer after every block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub slot_number: u64,
    pub block_number: u64,
    pub block_hash: String,
    pub tip_slot_number: u64,
    pub tip_block_hash: String,
    /// Once set, never cleared.
    pub tip_reached: bool,
}

/// Called synchronously on the notification path; must not block.
pub type StatusObserver = Arc<dyn Fn(&SyncStatus) + Send + Sync>;

/// Lifecycle of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    /// Not yet started.
    Idle,
    /// Fetching a fixed historical range through block-fetch.
    BulkFetching,
    /// Following the chain through chain-sync.
    IncrementalSyncing,
    Stopped,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::BulkFetching => write!(f, "bulk-fetching"),
            Self::IncrementalSyncing => write!(f, "incremental-syncing"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// The block range fetched in bulk before switching to chain-sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRange {
    pub start: Point,
    pub end: Point,
}

/// Maintains [`SyncStatus`] and decides when the tip has been reached.
#[derive(Debug, Default)]
pub struct StatusTracker {
    status: SyncStatus,
    bulk_end_slot: u64,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks at or below this slot never count towards reaching the tip,
    /// since the tip reference is frozen during a bulk fetch.
    pub fn set_bulk_end_slot(&mut self, slot: u64) {
        self.bulk_end_slot = slot;
    }

    /// Record a processed block and the tip reference it was seen with.
    ///
    /// The tip is considered reached once a block at or beyond the
    /// *previously* recorded tip arrives, so a tip that keeps moving is
    /// caught up with on the following block.
    pub fn update(
        &mut self,
        slot: u64,
        block_number: u64,
        block_hash: String,
        tip: &Point,
    ) -> SyncStatus {
        let s = &mut self.status;
        if !s.tip_reached
            && slot > self.bulk_end_slot
            && s.slot_number > 0
            && slot >= s.tip_slot_number
        {
            s.tip_reached = true;
            tracing::info!(slot, tip_slot = s.tip_slot_number, "Chain tip reached");
        }
        s.slot_number = slot;
        s.block_number = block_number;
        s.block_hash = block_hash;
        s.tip_slot_number = tip.slot;
        s.tip_block_hash = tip.hash_hex();
        s.clone()
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }
}
