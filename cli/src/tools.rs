//! Local filesystem `ToolRegistry`: `read_file`, `write_file`, and
//! `shell`, each sandboxed to the project root the orchestrator was
//! invoked against. This is the concrete collaborator `orchestrator_core`
//! only ever sees through the `Tool`/`ToolRegistry` traits.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use orchestrator_core::ports::{Tool, ToolRegistry, ToolResult, ToolSpec};

/// Joins `relative` onto `root` and rejects any path that would resolve
/// outside it via `..` segments. Does not require the target to exist,
/// so it works for `write_file` creating a new file.
fn sandboxed_path(root: &Path, relative: &str) -> Result<PathBuf, String> {
    let candidate = Path::new(relative);
    if candidate.is_absolute() {
        return Err(format!("path `{relative}` must be relative to the project root"));
    }

    let mut resolved = root.to_path_buf();
    for component in candidate.components() {
        use std::path::Component;
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(format!("path `{relative}` escapes the project root")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(format!("path `{relative}` must be relative to the project root"));
            }
        }
    }

    Ok(resolved)
}

fn string_param(params: &HashMap<String, Value>, key: &str) -> Result<String, String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| format!("missing required string argument `{key}`"))
}

struct ReadFileTool {
    project_root: PathBuf,
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file relative to the project root."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "path": { "type": "string" } },
            "required": ["path"],
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> ToolResult {
        let path = match string_param(&params, "path") {
            Ok(p) => p,
            Err(e) => return ToolResult { success: false, error: e, ..Default::default() },
        };
        let resolved = match sandboxed_path(&self.project_root, &path) {
            Ok(p) => p,
            Err(e) => return ToolResult { success: false, error: e, ..Default::default() },
        };

        match tokio::fs::read_to_string(&resolved).await {
            Ok(contents) => {
                let mut data = HashMap::new();
                data.insert("contents".to_string(), Value::String(contents));
                ToolResult { success: true, data, error: String::new() }
            }
            Err(e) => ToolResult { success: false, error: format!("failed to read `{path}`: {e}"), ..Default::default() },
        }
    }
}

struct WriteFileTool {
    project_root: PathBuf,
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write (overwrite) a file relative to the project root, creating parent directories as needed."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "content": { "type": "string" },
            },
            "required": ["path", "content"],
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> ToolResult {
        let path = match string_param(&params, "path") {
            Ok(p) => p,
            Err(e) => return ToolResult { success: false, error: e, ..Default::default() },
        };
        let content = match string_param(&params, "content") {
            Ok(c) => c,
            Err(e) => return ToolResult { success: false, error: e, ..Default::default() },
        };
        let resolved = match sandboxed_path(&self.project_root, &path) {
            Ok(p) => p,
            Err(e) => return ToolResult { success: false, error: e, ..Default::default() },
        };

        if let Some(parent) = resolved.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolResult { success: false, error: format!("failed to create `{}`: {e}", parent.display()), ..Default::default() };
            }
        }

        match tokio::fs::write(&resolved, content.as_bytes()).await {
            Ok(()) => {
                let mut data = HashMap::new();
                data.insert("path".to_string(), Value::String(path));
                ToolResult { success: true, data, error: String::new() }
            }
            Err(e) => ToolResult { success: false, error: format!("failed to write `{path}`: {e}"), ..Default::default() },
        }
    }
}

struct ShellTool {
    project_root: PathBuf,
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Run a shell command with the project root as its working directory."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "command": { "type": "string" } },
            "required": ["command"],
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> ToolResult {
        let command = match string_param(&params, "command") {
            Ok(c) => c,
            Err(e) => return ToolResult { success: false, error: e, ..Default::default() },
        };

        let output = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .current_dir(&self.project_root)
            .stdin(Stdio::null())
            .output()
            .await;

        match output {
            Ok(output) => {
                let mut data = HashMap::new();
                data.insert("stdout".to_string(), Value::String(String::from_utf8_lossy(&output.stdout).to_string()));
                data.insert("stderr".to_string(), Value::String(String::from_utf8_lossy(&output.stderr).to_string()));
                data.insert("exit_code".to_string(), Value::Number(output.status.code().unwrap_or(-1).into()));
                ToolResult { success: output.status.success(), data, error: String::new() }
            }
            Err(e) => ToolResult { success: false, error: format!("failed to run command: {e}"), ..Default::default() },
        }
    }
}

pub struct LocalToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl LocalToolRegistry {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let mut tools: HashMap<String, Box<dyn Tool>> = HashMap::new();
        tools.insert("read_file".to_string(), Box::new(ReadFileTool { project_root: project_root.clone() }));
        tools.insert("write_file".to_string(), Box::new(WriteFileTool { project_root: project_root.clone() }));
        tools.insert("shell".to_string(), Box::new(ShellTool { project_root }));
        Self { tools }
    }
}

impl ToolRegistry for LocalToolRegistry {
    fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    fn catalog(&self, allow: Option<&[String]>) -> Vec<ToolSpec> {
        self.tools
            .values()
            .filter(|t| allow.map(|allowed| allowed.iter().any(|n| n == t.name())).unwrap_or(true))
            .map(|t| ToolSpec { name: t.name().to_string(), description: t.description().to_string(), parameters: t.parameters() })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_dir_escape() {
        let root = tempfile::tempdir().unwrap();
        assert!(sandboxed_path(root.path(), "../outside.txt").is_err());
        assert!(sandboxed_path(root.path(), "/etc/passwd").is_err());
        assert!(sandboxed_path(root.path(), "src/lib.rs").is_ok());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let root = tempfile::tempdir().unwrap();
        let registry = LocalToolRegistry::new(root.path());

        let mut write_params = HashMap::new();
        write_params.insert("path".to_string(), Value::String("a/b.txt".to_string()));
        write_params.insert("content".to_string(), Value::String("hello".to_string()));
        let write_result = registry.get("write_file").unwrap().execute(write_params).await;
        assert!(write_result.success);

        let mut read_params = HashMap::new();
        read_params.insert("path".to_string(), Value::String("a/b.txt".to_string()));
        let read_result = registry.get("read_file").unwrap().execute(read_params).await;
        assert!(read_result.success);
        assert_eq!(read_result.data.get("contents").unwrap().as_str().unwrap(), "hello");
    }

    #[test]
    fn catalog_respects_allow_list() {
        let root = tempfile::tempdir().unwrap();
        let registry = LocalToolRegistry::new(root.path());
        let allow = vec!["read_file".to_string()];
        let catalog = registry.catalog(Some(&allow));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].name, "read_file");
    }
}
