//! Self-heal loop: wraps [`orchestrator_kernel::retry::RetryContext`]
//! with the actual model call, Builder re-application, and Verifier
//! re-run. The retry-loop detection and retry-count bound are pure
//! kernel logic; this module only supplies the I/O between attempts.

use std::fmt;
use std::path::Path;

use orchestrator_kernel::retry::{FileSnapshot, RetryContext, RetryOutcome};

use orchestrator_kernel::Task;

use crate::builder::{BuildContext, BuilderError};
use crate::error::WorkflowPaused;
use crate::ports::{ChatMessage, MessageRole};
use crate::verifier::{VerifyContext, VerifyResult, verify};

#[derive(Debug)]
pub enum SelfHealError {
    MaxRetriesExceeded { error: String, attempts: u32 },
    LoopDetected { error: String, attempts: u32 },
    Builder(BuilderError),
    /// The workflow controller suspended the self-heal fix attempt.
    /// Unwinds the self-heal loop without counting as a failed attempt.
    Paused(WorkflowPaused),
}

impl fmt::Display for SelfHealError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxRetriesExceeded { error, attempts } => {
                write!(f, "max retries exceeded after {attempts} attempts: {error}")
            }
            Self::LoopDetected { error, attempts } => {
                write!(f, "retry loop detected after {attempts} attempts: {error}")
            }
            Self::Builder(e) => write!(f, "{e}"),
            Self::Paused(p) => write!(f, "{p}"),
        }
    }
}

impl std::error::Error for SelfHealError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Builder(e) => Some(e),
            Self::Paused(p) => Some(p),
            _ => None,
        }
    }
}

fn snapshot_task_files(project_root: &Path, task: &Task) -> FileSnapshot {
    task.files
        .iter()
        .filter(|f| !f.contains('*') && !f.ends_with("/..."))
        .map(|f| (f.clone(), project_root.join(f).exists()))
        .collect()
}

/// Runs self-heal attempts until the Verifier passes, the retry budget
/// is exhausted, or a dead-end loop is detected. `build_ctx` drives the
/// `self_heal` source build; `first_error` is the initial verification
/// failure string.
pub async fn heal(
    build_ctx: &BuildContext<'_>,
    project_root: &Path,
    task: &Task,
    max_retries: u32,
    first_error: String,
) -> Result<VerifyResult, SelfHealError> {
    let mut retry = RetryContext::new(first_error.clone(), snapshot_task_files(project_root, task));
    let mut current_error = first_error;

    loop {
        let fix_prompt = ChatMessage {
            role: MessageRole::User,
            content: format!(
                "Verification failed with error:\n{current_error}\n\nAnalyze the failure and propose a fix for task `{}`.",
                task.id
            ),
            tool_calls: vec![],
            tool_call_id: None,
        };

        crate::builder::run_builder(build_ctx, vec![fix_prompt], &task.files, false)
            .await
            .map_err(|e| match e {
                BuilderError::Paused(p) => SelfHealError::Paused(p),
                other => SelfHealError::Builder(other),
            })?;

        let new_snapshot = snapshot_task_files(project_root, task);
        let verify_ctx = VerifyContext { project_root };
        let verify_result = verify(&verify_ctx, task).await;

        if verify_result.passed {
            return Ok(verify_result);
        }

        current_error = verify_result.errors.join("; ");
        match retry.record_attempt(max_retries, current_error.clone(), new_snapshot) {
            RetryOutcome::Proceed => {}
            RetryOutcome::MaxRetriesExceeded => {
                return Err(SelfHealError::MaxRetriesExceeded { error: current_error, attempts: retry.attempt });
            }
            RetryOutcome::LoopDetected => {
                return Err(SelfHealError::LoopDetected { error: current_error, attempts: retry.attempt });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_kernel::TaskType;

    #[test]
    fn snapshot_skips_glob_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = Task::new("1", "t", TaskType::Implementation);
        task.files = vec!["src/*".to_string(), "pkg/.../x.go".to_string(), "a.rs".to_string()];
        let snapshot = snapshot_task_files(dir.path(), &task);
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("a.rs"));
    }
}
