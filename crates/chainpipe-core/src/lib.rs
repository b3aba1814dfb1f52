//! chainpipe-core — foundation for the chain-sync event pipeline.
//!
//! # Architecture
//!
//! ```text
//! Pipeline
//!     ├── input stage   (chainpipe-sync: SyncEngine)
//!     │        │ bounded queue (10)
//!     ├── filter stages (chainpipe-filter: ChainSyncFilter)
//!     │        │ bounded queue (10)
//!     └── output stage  (chainpipe-output: log / webhook sinks)
//! ```
//!
//! Every stage implements [`Stage`]; the [`Pipeline`] links one stage's
//! outbound queue to the next stage's inbound queue and merges their error
//! channels. Stages are looked up by name through an explicit
//! [`StageRegistry`] owned by the process entry point.

pub mod address;
pub mod asset;
pub mod error;
pub mod event;
pub mod pipeline;
pub mod registry;
pub mod serde_hex;
pub mod stage;
pub mod types;

pub use address::{Address, AddressKind};
pub use asset::{AssetFingerprint, AssetName, MultiAsset, PolicyId};
pub use error::{ParseError, PipelineError};
pub use event::{
    BlockEvent, Event, EventKind, EventPayload, RollbackEvent, TransactionEvent, TransactionInput,
    TransactionOutput,
};
pub use pipeline::Pipeline;
pub use registry::{StageKind, StageRegistry};
pub use stage::{Processor, ProcessorStage, Stage, QUEUE_CAPACITY};
pub use types::{Point, Tip};
