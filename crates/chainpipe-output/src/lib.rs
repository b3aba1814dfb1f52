//! chainpipe-output — terminal stages delivering events outside the process.
//!
//! - [`LogSink`] (`log`): one JSON line per event through `tracing`.
//! - [`WebhookSink`] (`webhook`): HTTP POST of the event JSON.
//!
//! Both run inside an [`OutputStage`], which records deliveries and failures
//! in [`OutputMetrics`] and keeps going.

pub mod error;
pub mod log;
pub mod metrics;
pub mod sink;
pub mod webhook;

pub use error::OutputError;
pub use log::{LogSink, EVENT_TARGET};
pub use metrics::{OutputMetrics, METER_NAME};
pub use sink::{output_stage, Delivery, EventSink, OutputStage};
pub use webhook::{WebhookConfig, WebhookSink, DEFAULT_URL};
