//! Precondition checks. Every check here is non-fatal
//! unless noted — the validator accumulates errors and warnings rather
//! than short-circuiting, so a caller sees the full picture of what is
//! wrong before deciding whether to proceed.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use orchestrator_kernel::{Task, TaskType};

use crate::ports::ToolRegistry;

#[derive(Debug)]
pub enum ValidatorError {
    PathOutsideProject { path: String },
    NoWritableParent { path: String },
}

impl fmt::Display for ValidatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathOutsideProject { path } => {
                write!(f, "path `{path}` is outside the project root")
            }
            Self::NoWritableParent { path } => {
                write!(f, "no writable parent directory exists for `{path}`")
            }
        }
    }
}

impl std::error::Error for ValidatorError {}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub missing_tools: Vec<String>,
    pub missing_env_vars: Vec<String>,
}

const KNOWN_TOOL_PREFIXES: &[&str] = &[
    "go ", "npm ", "npx ", "cargo ", "docker ", "terraform ", "kubectl ", "pytest", "mvn ",
    "gradle ", "yarn ",
];

const ARTIFACT_EXTENSIONS: &[&str] = &[".log", ".out"];
const ARTIFACT_NAME_HINTS: &[&str] = &["coverage", "report"];

fn looks_like_glob_or_artifact(path: &str) -> bool {
    if path.contains('*') || path.ends_with("/...") {
        return true;
    }
    let lower = path.to_ascii_lowercase();
    ARTIFACT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
        || ARTIFACT_NAME_HINTS.iter().any(|hint| lower.contains(hint))
}

/// Extracts candidate tool/command names from free-form task text: known
/// prefixes, plus the first token of any backtick-enclosed command.
fn extract_candidate_tools(text: &str) -> HashSet<String> {
    let mut candidates = HashSet::new();

    for prefix in KNOWN_TOOL_PREFIXES {
        if text.contains(prefix) {
            candidates.insert(prefix.trim().to_string());
        }
    }

    let mut in_backtick = false;
    let mut current = String::new();
    for ch in text.chars() {
        if ch == '`' {
            if in_backtick && !current.trim().is_empty() {
                if let Some(first) = current.trim().split_whitespace().next() {
                    candidates.insert(first.to_string());
                }
            }
            current.clear();
            in_backtick = !in_backtick;
        } else if in_backtick {
            current.push(ch);
        }
    }

    candidates
}

fn is_on_path(name: &str) -> bool {
    let Ok(path_var) = std::env::var("PATH") else {
        return false;
    };
    std::env::split_paths(&path_var).any(|dir| dir.join(name).is_file())
}

struct EnvHint {
    keywords: &'static [&'static str],
    required_vars: &'static [&'static str],
}

const ENV_HINTS: &[EnvHint] = &[
    EnvHint { keywords: &["aws", "amazon"], required_vars: &["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"] },
    EnvHint { keywords: &["gcp", "google"], required_vars: &["GOOGLE_APPLICATION_CREDENTIALS"] },
    EnvHint { keywords: &["azure"], required_vars: &["AZURE_CLIENT_ID", "AZURE_TENANT_ID"] },
    EnvHint {
        keywords: &["database", "postgres", "mysql", "mongodb"],
        required_vars: &["DATABASE_URL"],
    },
    EnvHint {
        keywords: &["model", "openai", "anthropic", "openrouter"],
        required_vars: &["MODEL_API_KEY"],
    },
];

fn check_env_vars(text: &str, warnings: &mut Vec<String>, missing: &mut Vec<String>) {
    let lower = text.to_ascii_lowercase();
    for hint in ENV_HINTS {
        if hint.keywords.iter().any(|kw| lower.contains(kw)) {
            for var in hint.required_vars {
                if std::env::var(var).is_err() {
                    missing.push((*var).to_string());
                    warnings.push(format!("environment variable `{var}` is not set"));
                }
            }
        }
    }
}

/// Normalizes `path` relative to `project_root` and verifies it stays
/// inside it. Returns the absolute path on success.
fn normalize_within_root(project_root: &Path, path: &str) -> Result<PathBuf, ValidatorError> {
    let candidate = project_root.join(path);
    let mut normalized = PathBuf::new();
    for component in candidate.components() {
        use std::path::Component;
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other),
        }
    }

    if !normalized.starts_with(project_root) {
        return Err(ValidatorError::PathOutsideProject { path: path.to_string() });
    }
    Ok(normalized)
}

fn check_permissions(
    project_root: &Path,
    task: &Task,
    tools: &dyn ToolRegistry,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    if matches!(task.task_type, TaskType::Analysis | TaskType::Validation) {
        return;
    }

    for raw_path in &task.files {
        if looks_like_glob_or_artifact(raw_path) {
            continue;
        }

        let absolute = match normalize_within_root(project_root, raw_path) {
            Ok(p) => p,
            Err(e) => {
                errors.push(e.to_string());
                continue;
            }
        };

        if absolute.exists() {
            let writable = absolute
                .metadata()
                .map(|m| !m.permissions().readonly())
                .unwrap_or(false);
            if !writable {
                errors.push(format!("`{raw_path}` exists but is not writable"));
            }
            continue;
        }

        let mut parent = absolute.parent();
        let mut found_existing_parent = false;
        while let Some(p) = parent {
            if p.exists() {
                found_existing_parent = true;
                break;
            }
            parent = p.parent();
        }

        if !found_existing_parent {
            errors.push(ValidatorError::NoWritableParent { path: raw_path.clone() }.to_string());
            continue;
        }

        if !tools.has("write_file") {
            errors.push(format!(
                "`{raw_path}` does not exist and no `write_file` tool is registered to create it"
            ));
        } else {
            warnings.push(format!("`{raw_path}` will be created by write_file"));
        }
    }
}

pub fn validate(project_root: &Path, task: &Task, tools: &dyn ToolRegistry) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut missing_tools = Vec::new();
    let mut missing_env_vars = Vec::new();

    let combined_text = format!("{} {}", task.description, task.verification.join(" "));

    for candidate in extract_candidate_tools(&combined_text) {
        let registered = tools.has(&candidate);
        let on_path = is_on_path(&candidate);
        if !registered && !on_path {
            missing_tools.push(candidate.clone());
            errors.push(format!("required tool `{candidate}` is not available"));
        }
    }

    check_env_vars(&combined_text, &mut warnings, &mut missing_env_vars);
    check_permissions(project_root, task, tools, &mut errors, &mut warnings);

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
        missing_tools,
        missing_env_vars,
    }
}
