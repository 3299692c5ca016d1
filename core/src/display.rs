//! Progress/telemetry surface generalized from a single-agent CLI spinner
//! to an orchestrator-wide channel: the workflow controller owns the
//! sender half, the `cli` crate (or a test harness) owns a receiver and
//! renders lines to stderr. No external logging crate — this module *is*
//! the logging idiom for this codebase.

use std::fmt;

use tokio::sync::mpsc::{Receiver, Sender, channel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressKind {
    PhaseStarted,
    PhaseCompleted,
    PhaseFailed,
    ToolCall,
    Paused,
    Resumed,
    Info,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub kind: ProgressKind,
    pub task_id: Option<String>,
    pub message: String,
}

impl ProgressEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self { kind: ProgressKind::Info, task_id: None, message: message.into() }
    }

    pub fn for_task(kind: ProgressKind, task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind, task_id: Some(task_id.into()), message: message.into() }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.task_id {
            Some(id) => write!(f, "[{id}] {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Renders one event as a single line, filtered by `verbosity`. Returns
/// `None` when the event should be suppressed at this verbosity level.
pub fn render_progress_event(event: &ProgressEvent, verbosity: Verbosity) -> Option<String> {
    if verbosity == Verbosity::Quiet && !matches!(event.kind, ProgressKind::Paused | ProgressKind::PhaseFailed) {
        return None;
    }
    Some(event.to_string())
}

/// A bounded, non-blocking progress channel: sends never block pipeline
/// progress. A full channel silently drops the event rather than
/// stalling the caller.
#[derive(Clone)]
pub struct ProgressChannel {
    tx: Sender<ProgressEvent>,
}

impl ProgressChannel {
    pub fn new(capacity: usize) -> (Self, Receiver<ProgressEvent>) {
        let (tx, rx) = channel(capacity);
        (Self { tx }, rx)
    }

    pub fn send(&self, event: ProgressEvent) {
        let _ = self.tx.try_send(event);
    }
}

/// Default stderr renderer: drains a receiver until the channel closes,
/// printing each non-suppressed event on its own line.
pub async fn drain_to_stderr(mut rx: Receiver<ProgressEvent>, verbosity: Verbosity) {
    while let Some(event) = rx.recv().await {
        if let Some(line) = render_progress_event(&event, verbosity) {
            eprintln!("{line}");
        }
    }
}
