//! Output delivery metrics.
//!
//! Instruments follow OpenTelemetry conventions and go to whatever meter
//! provider the host process installs; without one they are no-ops.

use opentelemetry::{
    global,
    metrics::{Counter, Meter},
    KeyValue,
};

use chainpipe_core::EventKind;

/// Instrumentation scope used when no meter is supplied.
pub const METER_NAME: &str = "chainpipe";

/// Counters shared by every output stage.
#[derive(Clone)]
pub struct OutputMetrics {
    pub events_delivered: Counter<u64>,
    pub delivery_failures: Counter<u64>,
}

impl OutputMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            events_delivered: meter
                .u64_counter("chainpipe.events_delivered")
                .with_description("Events accepted by an output sink")
                .build(),
            delivery_failures: meter
                .u64_counter("chainpipe.delivery_failures")
                .with_description("Events an output sink failed to deliver")
                .build(),
        }
    }

    /// Metrics on the process-wide meter provider.
    pub fn global() -> Self {
        Self::new(&global::meter(METER_NAME))
    }

    pub fn record_delivered(&self, sink: &str, kind: EventKind) {
        self.events_delivered.add(1, &attributes(sink, kind));
    }

    pub fn record_failure(&self, sink: &str, kind: EventKind) {
        self.delivery_failures.add(1, &attributes(sink, kind));
    }
}

fn attributes(sink: &str, kind: EventKind) -> [KeyValue; 2] {
    [
        KeyValue::new("sink", sink.to_string()),
        KeyValue::new("kind", kind.to_string()),
    ]
}
