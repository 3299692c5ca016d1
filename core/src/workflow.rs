//! Workflow controller: process-wide shared state —
//! current phase, active sub-agent, pause latch, progress channel,
//! telemetry emission, tool-call authorization. Treated as an
//! actor-like coordinator with a private mutex; callers never reach
//! into its fields directly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use orchestrator_kernel::{risk, TrustLevel};

use crate::builder::contains_elevation_token;
use crate::display::{ProgressChannel, ProgressEvent, ProgressKind};
use crate::error::WorkflowPaused;
use crate::ports::{TelemetryEvent, TelemetrySink, telemetry_subject};

/// Steering notes and autonomy level, keyed by session ID and reloaded
/// when a controller is reconstructed against the same storage
/// directory (spec.md §4.7 "Persistence").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionState {
    #[serde(default)]
    steering_notes: Vec<String>,
    #[serde(default)]
    autonomy_level: Option<TrustLevel>,
}

fn session_state_path(dir: &Path, session_id: &str) -> PathBuf {
    dir.join(format!("{session_id}.session.json"))
}

fn load_session_state(dir: &Path, session_id: &str) -> SessionState {
    std::fs::read_to_string(session_state_path(dir, session_id))
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

/// Best-effort, matching `plan_store`'s write-failure discipline: a
/// failure to persist session state is a warning, never fatal.
fn save_session_state(dir: &Path, session_id: &str, state: &SessionState) {
    let Ok(json) = serde_json::to_string_pretty(state) else { return };
    if let Err(e) = write_session_state_atomic(dir, session_id, &json) {
        eprintln!("warning: failed to persist session state for `{session_id}`: {e}");
    }
}

fn write_session_state_atomic(dir: &Path, session_id: &str, contents: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    use std::io::Write as _;
    tmp.write_all(contents.as_bytes())?;
    tmp.flush()?;
    tmp.persist(session_state_path(dir, session_id))
        .map_err(|e| e.error)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowPhase {
    Planning,
    Execution,
    Review,
}

impl WorkflowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Execution => "execution",
            Self::Review => "review",
        }
    }
}

#[derive(Debug, Clone, Default)]
struct PauseLatch {
    paused: bool,
    reason: String,
    question: Option<String>,
    since: Option<DateTime<Utc>>,
}

struct Inner {
    phase: WorkflowPhase,
    active_sub_agent: Option<String>,
    pause: PauseLatch,
    session_id: String,
    plan_id: Option<String>,
    session: SessionState,
    store_dir: Option<PathBuf>,
}

/// Shared by reference across Executor, Builder, Reviewer, and Batch
/// dispatcher. Safe to clone cheaply: the clone shares the same inner
/// state via `Arc`.
#[derive(Clone)]
pub struct WorkflowController {
    inner: Arc<Mutex<Inner>>,
    progress: Option<ProgressChannel>,
    telemetry: Arc<dyn TelemetrySink>,
    telemetry_subject_prefix: String,
}

impl WorkflowController {
    pub fn new(session_id: impl Into<String>, telemetry: Arc<dyn TelemetrySink>, telemetry_subject_prefix: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                phase: WorkflowPhase::Planning,
                active_sub_agent: None,
                pause: PauseLatch::default(),
                session_id: session_id.into(),
                plan_id: None,
                session: SessionState::default(),
                store_dir: None,
            })),
            progress: None,
            telemetry,
            telemetry_subject_prefix: telemetry_subject_prefix.into(),
        }
    }

    pub fn with_progress_channel(mut self, capacity: usize) -> (Self, tokio::sync::mpsc::Receiver<ProgressEvent>) {
        let (channel, rx) = ProgressChannel::new(capacity);
        self.progress = Some(channel);
        (self, rx)
    }

    /// Points this controller at a JSON session store under `dir`
    /// (typically the plan directory) and immediately reloads any
    /// steering notes/autonomy level previously saved for this session
    /// ID. Subsequent calls to `add_steering_note`/`set_autonomy_level`
    /// persist back to the same file.
    pub fn with_session_store(self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let mut inner = self.inner.lock();
        let session_id = inner.session_id.clone();
        inner.session = load_session_state(&dir, &session_id);
        inner.store_dir = Some(dir);
        drop(inner);
        self
    }

    /// Appends a steering note for this session and persists it if a
    /// session store is configured.
    pub fn add_steering_note(&self, note: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.session.steering_notes.push(note.into());
        self.persist_session_state(&inner);
    }

    pub fn steering_notes(&self) -> Vec<String> {
        self.inner.lock().session.steering_notes.clone()
    }

    /// Sets the autonomy level for this session and persists it if a
    /// session store is configured. Distinct from a single plan's
    /// `trust_level`: this is the session-wide default a newly created
    /// plan inherits.
    pub fn set_autonomy_level(&self, level: TrustLevel) {
        let mut inner = self.inner.lock();
        inner.session.autonomy_level = Some(level);
        self.persist_session_state(&inner);
    }

    pub fn autonomy_level(&self) -> Option<TrustLevel> {
        self.inner.lock().session.autonomy_level
    }

    fn persist_session_state(&self, inner: &Inner) {
        if let Some(dir) = &inner.store_dir {
            save_session_state(dir, &inner.session_id, &inner.session);
        }
    }

    pub fn set_plan_id(&self, plan_id: impl Into<String>) {
        self.inner.lock().plan_id = Some(plan_id.into());
    }

    pub fn set_phase(&self, phase: WorkflowPhase) {
        self.inner.lock().phase = phase;
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.inner.lock().phase
    }

    pub fn set_active_sub_agent(&self, name: Option<String>) {
        self.inner.lock().active_sub_agent = name;
    }

    /// Empty value maps to the phase name.
    pub fn active_sub_agent_name(&self) -> String {
        let inner = self.inner.lock();
        inner.active_sub_agent.clone().unwrap_or_else(|| inner.phase.as_str().to_string())
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().pause.paused
    }

    /// Returns a sentinel error wrapping `WorkflowPaused` so callers can
    /// distinguish it from a task failure.
    pub fn pause(&self, reason: impl Into<String>, question: Option<String>) -> WorkflowPaused {
        let reason = reason.into();
        {
            let mut inner = self.inner.lock();
            inner.pause = PauseLatch {
                paused: true,
                reason: reason.clone(),
                question: question.clone(),
                since: Some(Utc::now()),
            };
        }
        self.send_progress(ProgressEvent::info(format!("paused: {reason}")));
        WorkflowPaused { reason, question }
    }

    pub fn resume(&self, _note: Option<String>) {
        self.clear_pause();
    }

    pub fn clear_pause(&self) {
        self.inner.lock().pause = PauseLatch::default();
    }

    pub fn send_progress(&self, event: ProgressEvent) {
        if let Some(channel) = &self.progress {
            channel.send(event);
        }
    }

    pub fn emit_telemetry(&self, event_type: &str, task_id: Option<&str>, data: Option<serde_json::Value>) {
        let plan_id = self.inner.lock().plan_id.clone();
        let session_id = self.inner.lock().session_id.clone();
        let event = TelemetryEvent {
            event_type: event_type.to_string(),
            plan_id,
            task_id: task_id.map(|s| s.to_string()),
            session_id: Some(session_id),
            timestamp: Utc::now(),
            data,
        };
        let subject = telemetry_subject(&self.telemetry_subject_prefix, &event);
        self.telemetry.publish(&subject, &event);
    }

    /// Tool-call authorization hook: inspects shell-command arguments for
    /// elevation tokens and raises a pause if found.
    /// `arguments` is the raw JSON-string the model supplied; any `command`
    /// field inside it is scanned.
    pub fn authorize_tool_call(&self, tool_name: &str, arguments: &str) -> Result<(), WorkflowPaused> {
        if self.is_paused() {
            let inner = self.inner.lock();
            return Err(WorkflowPaused { reason: inner.pause.reason.clone(), question: inner.pause.question.clone() });
        }

        let command = serde_json::from_str::<serde_json::Value>(arguments)
            .ok()
            .and_then(|v| v.get("command").and_then(|c| c.as_str()).map(|s| s.to_string()));

        if let Some(command) = command {
            if contains_elevation_token(&command) {
                self.send_progress(ProgressEvent::for_task(
                    ProgressKind::Paused,
                    tool_name,
                    "tool call requests elevated privileges",
                ));
                return Err(self.pause(
                    format!("tool `{tool_name}` requests elevated privileges"),
                    Some(format!("allow `{command}` to run with elevated privileges?")),
                ));
            }

            let assessment = risk::analyze(&command);
            if assessment.requires_pause() {
                self.send_progress(ProgressEvent::for_task(
                    ProgressKind::Paused,
                    tool_name,
                    format!("tool call classified as {:?} risk", assessment.level),
                ));
                return Err(self.pause(
                    format!("tool `{tool_name}` requests a {:?}-risk operation: {}", assessment.level, assessment.reasons.join("; ")),
                    Some(format!("allow `{command}` to run?")),
                ));
            }
        }

        Ok(())
    }
}
