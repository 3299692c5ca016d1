//! Post-change verification: reads back declared files,
//! translates verification strings into concrete commands via the
//! project detector, runs them with a hard timeout, and collects
//! well-known artifacts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use orchestrator_kernel::{Task, TaskType};
use tokio::process::Command;

use crate::project_detector::{self, CommandSet};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const KNOWN_TOOL_PREFIXES: &[&str] =
    &["go ", "npm ", "npx ", "cargo ", "pytest", "mvn ", "golangci-lint", "ruff", "eslint"];

const ARTIFACT_CANDIDATES: &[&str] = &["coverage.out", "test-results"];

#[derive(Debug)]
pub enum VerifierError {
    Timeout { command: String },
    Spawn { command: String, source: std::io::Error },
}

impl fmt::Display for VerifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { command } => write!(f, "command `{command}` timed out after 5m"),
            Self::Spawn { command, source } => write!(f, "failed to run `{command}`: {source}"),
        }
    }
}

impl std::error::Error for VerifierError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Coverage,
    TestResults,
    Binary,
}

#[derive(Debug, Clone)]
pub struct Artifact {
    pub id: String,
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct VerifyResult {
    pub passed: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub artifacts: Vec<Artifact>,
}

pub struct VerifyContext<'a> {
    pub project_root: &'a Path,
}

async fn run_with_timeout(command_line: &str, cwd: &Path) -> Result<(bool, String), VerifierError> {
    let mut parts = command_line.split_whitespace();
    let Some(program) = parts.next() else {
        return Ok((true, String::new()));
    };
    let args: Vec<&str> = parts.collect();

    let mut cmd = Command::new(program);
    cmd.args(&args).current_dir(cwd);

    let run = async {
        cmd.output()
            .await
            .map_err(|source| VerifierError::Spawn { command: command_line.to_string(), source })
    };

    match tokio::time::timeout(COMMAND_TIMEOUT, run).await {
        Ok(Ok(output)) => {
            let combined = format!(
                "{}{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
            Ok((output.status.success(), combined))
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(VerifierError::Timeout { command: command_line.to_string() }),
    }
}

/// Pass-through rule: a verification string already starting with a
/// recognized tool prefix for the detected project runs
/// verbatim; otherwise `test`/`build`/`lint` map onto the detector's
/// commands. Anything else is skipped, not failed.
fn resolve_verification(raw: &str, detector: Option<&CommandSet>) -> Option<String> {
    let trimmed = raw.trim();
    if KNOWN_TOOL_PREFIXES.iter().any(|p| trimmed.starts_with(p.trim())) {
        return Some(trimmed.to_string());
    }

    let detector = detector?;
    match trimmed {
        "test" => detector.test_command.clone(),
        "build" => detector.build_command.clone(),
        "lint" => detector.linter_command.clone(),
        _ => None,
    }
}

fn collect_artifacts(project_root: &Path) -> Vec<Artifact> {
    let mut artifacts = Vec::new();
    for candidate in ARTIFACT_CANDIDATES {
        let path = project_root.join(candidate);
        if path.exists() {
            let kind = if candidate.contains("coverage") {
                ArtifactKind::Coverage
            } else {
                ArtifactKind::TestResults
            };
            artifacts.push(Artifact { id: candidate.to_string(), kind, path });
        }
    }
    artifacts
}

pub async fn verify(ctx: &VerifyContext<'_>, task: &Task) -> VerifyResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if matches!(task.task_type, TaskType::Implementation) {
        for file in &task.files {
            if file.contains('*') || file.ends_with("/...") {
                continue;
            }
            let path = ctx.project_root.join(file);
            match std::fs::metadata(&path) {
                Ok(meta) if meta.len() == 0 => warnings.push(format!("`{file}` exists but is empty")),
                Ok(_) => {}
                Err(_) => errors.push(format!("`{file}` was not found after the build")),
            }
        }
    }

    let detector = project_detector::detect(ctx.project_root);

    let mut ran_test = false;
    for raw in &task.verification {
        let Some(command) = resolve_verification(raw, detector.as_ref()) else {
            continue;
        };
        if let Some(d) = &detector {
            if d.test_command.as_deref() == Some(command.as_str()) {
                ran_test = true;
            }
        }
        match run_with_timeout(&command, ctx.project_root).await {
            Ok((true, _)) => {}
            Ok((false, output)) => errors.push(format!("`{command}` failed: {}", output.trim())),
            Err(e) => errors.push(e.to_string()),
        }
    }

    let wants_default_test =
        matches!(task.task_type, TaskType::Validation) || task.task_type == TaskType::Implementation && task.verification.is_empty();
    if !ran_test && wants_default_test {
        if let Some(d) = &detector {
            if let Some(test_cmd) = &d.test_command {
                match run_with_timeout(test_cmd, ctx.project_root).await {
                    Ok((true, _)) => {}
                    Ok((false, output)) => errors.push(format!("`{test_cmd}` failed: {}", output.trim())),
                    Err(e) => errors.push(e.to_string()),
                }
            }
        }
    }

    if matches!(task.task_type, TaskType::Implementation) {
        if let Some(d) = &detector {
            if let Some(lint_cmd) = &d.linter_command {
                let Some(binary) = lint_cmd.split_whitespace().next() else {
                    return VerifyResult { passed: errors.is_empty(), errors, warnings, artifacts: collect_artifacts(ctx.project_root) };
                };
                if is_on_path(binary) {
                    match run_with_timeout(lint_cmd, ctx.project_root).await {
                        Ok((true, _)) => {}
                        Ok((false, output)) => warnings.push(format!("`{lint_cmd}` reported issues: {}", output.trim())),
                        Err(e) => warnings.push(e.to_string()),
                    }
                }
            }
        }
    }

    let artifacts = collect_artifacts(ctx.project_root);
    VerifyResult { passed: errors.is_empty(), errors, warnings, artifacts }
}

fn is_on_path(name: &str) -> bool {
    let Ok(path_var) = std::env::var("PATH") else {
        return false;
    };
    std::env::split_paths(&path_var).any(|dir| dir.join(name).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_kernel::TaskStatus;

    fn task(verification: &[&str], task_type: TaskType) -> Task {
        let mut t = Task::new("1", "t", task_type);
        t.status = TaskStatus::Pending;
        t.verification = verification.iter().map(|s| s.to_string()).collect();
        t
    }

    #[tokio::test]
    async fn missing_declared_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = task(&[], TaskType::Implementation);
        t.files = vec!["missing.txt".to_string()];
        let ctx = VerifyContext { project_root: dir.path() };
        let result = verify(&ctx, &t).await;
        assert!(!result.passed);
    }

    #[tokio::test]
    async fn unknown_verification_is_skipped_not_failed() {
        let dir = tempfile::tempdir().unwrap();
        let t = task(&["do the thing"], TaskType::Analysis);
        let ctx = VerifyContext { project_root: dir.path() };
        let result = verify(&ctx, &t).await;
        assert!(result.passed);
    }

    #[test]
    fn resolve_verbatim_known_prefix() {
        assert_eq!(resolve_verification("cargo fmt --check", None), Some("cargo fmt --check".to_string()));
    }

    #[test]
    fn resolve_maps_test_keyword_to_detector() {
        let detector = CommandSet {
            project_type: crate::project_detector::ProjectType::Rust,
            test_command: Some("cargo test".to_string()),
            build_command: None,
            linter_command: None,
        };
        assert_eq!(resolve_verification("test", Some(&detector)), Some("cargo test".to_string()));
        assert_eq!(resolve_verification("unknown-thing", Some(&detector)), None);
    }
}
