//! Project-type detector: inspects the working tree for ecosystem marker
//! files and returns the test/build/lint commands the verifier should
//! run for each supported ecosystem.

use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectType {
    Rust,
    Node,
    Go,
    Python,
    Java,
}

#[derive(Debug, Clone)]
pub struct CommandSet {
    pub project_type: ProjectType,
    pub test_command: Option<String>,
    pub build_command: Option<String>,
    pub linter_command: Option<String>,
}

impl CommandSet {
    fn rust() -> Self {
        Self {
            project_type: ProjectType::Rust,
            test_command: Some("cargo test".to_string()),
            build_command: Some("cargo build".to_string()),
            linter_command: Some("cargo clippy".to_string()),
        }
    }

    fn node() -> Self {
        Self {
            project_type: ProjectType::Node,
            test_command: Some("npm test".to_string()),
            build_command: Some("npm run build".to_string()),
            linter_command: Some("npx eslint .".to_string()),
        }
    }

    fn go() -> Self {
        Self {
            project_type: ProjectType::Go,
            test_command: Some("go test ./...".to_string()),
            build_command: Some("go build ./...".to_string()),
            linter_command: Some("golangci-lint run".to_string()),
        }
    }

    fn python() -> Self {
        Self {
            project_type: ProjectType::Python,
            test_command: Some("pytest".to_string()),
            build_command: None,
            linter_command: Some("ruff check .".to_string()),
        }
    }

    fn java() -> Self {
        Self {
            project_type: ProjectType::Java,
            test_command: Some("mvn test".to_string()),
            build_command: Some("mvn package".to_string()),
            linter_command: None,
        }
    }
}

/// Checks marker files in a fixed priority order. A project that
/// straddles ecosystems (e.g. a Rust crate with a `package.json` for
/// tooling) resolves to the first match below.
pub fn detect(project_root: &Path) -> Option<CommandSet> {
    let has = |name: &str| project_root.join(name).exists();

    if has("Cargo.toml") {
        Some(CommandSet::rust())
    } else if has("package.json") {
        Some(CommandSet::node())
    } else if has("go.mod") {
        Some(CommandSet::go())
    } else if has("pyproject.toml") || has("setup.py") {
        Some(CommandSet::python())
    } else if has("pom.xml") || has("build.gradle") {
        Some(CommandSet::java())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_rust_project() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\n").unwrap();
        let detected = detect(dir.path()).unwrap();
        assert_eq!(detected.project_type, ProjectType::Rust);
        assert_eq!(detected.test_command.as_deref(), Some("cargo test"));
    }

    #[test]
    fn detects_python_from_pyproject() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pyproject.toml"), "").unwrap();
        let detected = detect(dir.path()).unwrap();
        assert_eq!(detected.project_type, ProjectType::Python);
        assert!(detected.build_command.is_none());
    }

    #[test]
    fn unknown_project_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(detect(dir.path()).is_none());
    }
}
