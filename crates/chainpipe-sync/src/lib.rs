//! chainpipe-sync — Cardano chain-sync input stage.
//!
//! ```text
//! Connector ──connect──▶ NodeConnection
//!                             │ roll_forward / roll_backward / block_fetched
//!                             ▼
//!                        SyncEngine ──▶ outbound queue (Event)
//!                             │
//!                             └──▶ SyncStatus ──▶ status observer
//! ```
//!
//! The wire protocol client is not part of this crate; it plugs in through
//! the [`Connector`] / [`NodeConnection`] traits. [`ReplayConnector`] serves a
//! recorded session through the same traits.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod network;
pub mod protocol;
pub mod replay;
pub mod status;

pub use config::{SyncConfig, SyncConfigBuilder};
pub use engine::{SyncEngine, STAGE_NAME};
pub use error::SyncError;
pub use network::Network;
pub use protocol::{
    Block, BlockHeader, ChainSyncHandler, Connector, DialFamily, DialTarget, NodeConnection,
    RollForward, Transaction,
};
pub use replay::{ReplayConnector, ReplayMessage};
pub use status::{BulkRange, StatusObserver, StatusTracker, SyncState, SyncStatus};
