//! Stderr telemetry sink: renders each `TelemetryEvent` as a compact JSON
//! line, gated on verbosity the same way `orchestrator_core::display`
//! gates progress lines. Anything wanting a real bus (NATS, etc.) plugs
//! in behind the same `TelemetrySink` trait without touching `core`.

use orchestrator_core::display::Verbosity;
use orchestrator_core::ports::{TelemetryEvent, TelemetrySink};

pub struct StderrTelemetrySink {
    verbosity: Verbosity,
}

impl StderrTelemetrySink {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }
}

impl TelemetrySink for StderrTelemetrySink {
    fn publish(&self, subject: &str, event: &TelemetryEvent) {
        if self.verbosity == Verbosity::Quiet {
            return;
        }
        match serde_json::to_string(event) {
            Ok(json) => eprintln!("telemetry {subject} {json}"),
            Err(_) => eprintln!("telemetry {subject}"),
        }
    }
}
