//! Per-module error enums composed into one top-level error at the crate
//! boundary, the way `AgentError` composes `std::io::Error` via `From`.

use std::fmt;

use crate::{
    batch::BatchError, builder::BuilderError, reviewer::ReviewerError, self_heal::SelfHealError,
    validator::ValidatorError, verifier::VerifierError,
};

/// Distinguished sentinel: the workflow controller suspended the current
/// stage pending an external resume. Callers must not treat this as a
/// task failure.
#[derive(Debug, Clone)]
pub struct WorkflowPaused {
    pub reason: String,
    pub question: Option<String>,
}

impl fmt::Display for WorkflowPaused {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "workflow paused: {}", self.reason)
    }
}

impl std::error::Error for WorkflowPaused {}

#[derive(Debug)]
pub enum OrchestratorError {
    Cancelled,
    UnmetDependencies { task_id: String, missing: Vec<String> },
    Paused(WorkflowPaused),
    Validator(ValidatorError),
    Verifier(VerifierError),
    Builder(BuilderError),
    Reviewer(ReviewerError),
    SelfHeal(SelfHealError),
    Batch(BatchError),
    Io(std::io::Error),
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "execution cancelled"),
            Self::UnmetDependencies { task_id, missing } => write!(
                f,
                "unmet dependencies for task {task_id}: {}",
                missing.join(", ")
            ),
            Self::Paused(p) => write!(f, "{p}"),
            Self::Validator(e) => write!(f, "{e}"),
            Self::Verifier(e) => write!(f, "{e}"),
            Self::Builder(e) => write!(f, "{e}"),
            Self::Reviewer(e) => write!(f, "{e}"),
            Self::SelfHeal(e) => write!(f, "{e}"),
            Self::Batch(e) => write!(f, "{e}"),
            Self::Io(e) => write!(f, "{e}"),
            Self::Other(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Paused(p) => Some(p),
            Self::Validator(e) => Some(e),
            Self::Verifier(e) => Some(e),
            Self::Builder(e) => Some(e),
            Self::Reviewer(e) => Some(e),
            Self::SelfHeal(e) => Some(e),
            Self::Batch(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OrchestratorError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<WorkflowPaused> for OrchestratorError {
    fn from(e: WorkflowPaused) -> Self {
        Self::Paused(e)
    }
}

impl From<ValidatorError> for OrchestratorError {
    fn from(e: ValidatorError) -> Self {
        Self::Validator(e)
    }
}

impl From<VerifierError> for OrchestratorError {
    fn from(e: VerifierError) -> Self {
        Self::Verifier(e)
    }
}

impl From<BuilderError> for OrchestratorError {
    fn from(e: BuilderError) -> Self {
        match e {
            BuilderError::Paused(p) => Self::Paused(p),
            other => Self::Builder(other),
        }
    }
}

impl From<ReviewerError> for OrchestratorError {
    fn from(e: ReviewerError) -> Self {
        Self::Reviewer(e)
    }
}

impl From<SelfHealError> for OrchestratorError {
    fn from(e: SelfHealError) -> Self {
        match e {
            SelfHealError::Paused(p) => Self::Paused(p),
            other => Self::SelfHeal(other),
        }
    }
}

impl From<BatchError> for OrchestratorError {
    fn from(e: BatchError) -> Self {
        Self::Batch(e)
    }
}
