//! Shared test doubles: a scripted `ModelClient` that replays a fixed
//! sequence of responses, a filesystem-backed `ToolRegistry` scoped to a
//! tempdir, and a scratch git repository builder. Mirrors the harness
//! shape a subprocess-spawning fixture module would provide, minus the
//! subprocess — these tests call `orchestrator_core`/`orchestrator_kernel`
//! directly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use orchestrator_core::ports::{
    ChatChoice, ChatMessage, ChatRequest, ChatResponse, MessageRole, ModelClient, ModelError, Tool,
    ToolRegistry, ToolResult, ToolSpec,
};

/// Replays a fixed queue of responses, one per `chat_completion` call.
/// Panics if the queue is exhausted, so a test that under-scripts fails
/// loudly instead of hanging.
pub struct ScriptedModelClient {
    responses: Mutex<Vec<ChatResponse>>,
    pub requests_seen: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModelClient {
    pub fn new(mut responses: Vec<ChatResponse>) -> Self {
        responses.reverse();
        Self { responses: Mutex::new(responses), requests_seen: Mutex::new(Vec::new()) }
    }

    pub fn text_response(text: impl Into<String>) -> ChatResponse {
        ChatResponse {
            choices: vec![ChatChoice {
                message: ChatMessage { role: MessageRole::Assistant, content: text.into(), tool_calls: vec![], tool_call_id: None },
            }],
        }
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, ModelError> {
        self.requests_seen.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| ModelError("scripted model client ran out of responses".to_string()))
    }

    fn supports_reasoning(&self, _model: &str) -> bool {
        false
    }
}

struct ReadFileTool {
    root: PathBuf,
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }
    fn description(&self) -> &str {
        "read a file"
    }
    fn parameters(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {"path": {"type": "string"}}})
    }
    async fn execute(&self, params: HashMap<String, Value>) -> ToolResult {
        let Some(path) = params.get("path").and_then(|v| v.as_str()) else {
            return ToolResult { success: false, error: "missing path".to_string(), ..Default::default() };
        };
        match std::fs::read_to_string(self.root.join(path)) {
            Ok(contents) => {
                let mut data = HashMap::new();
                data.insert("contents".to_string(), Value::String(contents));
                ToolResult { success: true, data, error: String::new() }
            }
            Err(e) => ToolResult { success: false, error: e.to_string(), ..Default::default() },
        }
    }
}

struct WriteFileTool {
    root: PathBuf,
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }
    fn description(&self) -> &str {
        "write a file"
    }
    fn parameters(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {"path": {"type": "string"}, "content": {"type": "string"}}})
    }
    async fn execute(&self, params: HashMap<String, Value>) -> ToolResult {
        let (Some(path), Some(content)) =
            (params.get("path").and_then(|v| v.as_str()), params.get("content").and_then(|v| v.as_str()))
        else {
            return ToolResult { success: false, error: "missing path or content".to_string(), ..Default::default() };
        };
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match std::fs::write(&full, content) {
            Ok(()) => ToolResult { success: true, ..Default::default() },
            Err(e) => ToolResult { success: false, error: e.to_string(), ..Default::default() },
        }
    }
}

pub struct FsToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl FsToolRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut tools: HashMap<String, Box<dyn Tool>> = HashMap::new();
        tools.insert("read_file".to_string(), Box::new(ReadFileTool { root: root.clone() }));
        tools.insert("write_file".to_string(), Box::new(WriteFileTool { root }));
        Self { tools }
    }
}

impl ToolRegistry for FsToolRegistry {
    fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    fn catalog(&self, allow: Option<&[String]>) -> Vec<ToolSpec> {
        self.tools
            .values()
            .filter(|t| allow.map(|a| a.iter().any(|n| n == t.name())).unwrap_or(true))
            .map(|t| ToolSpec { name: t.name().to_string(), description: t.description().to_string(), parameters: t.parameters() })
            .collect()
    }
}

/// A `BatchRuntime` that always reports the job as already succeeded,
/// for tests exercising the batch dispatch path without a real cluster.
pub struct AlwaysSucceedsBatchRuntime {
    pub created: Mutex<Vec<String>>,
}

impl AlwaysSucceedsBatchRuntime {
    pub fn new() -> Self {
        Self { created: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl orchestrator_core::batch::BatchRuntime for AlwaysSucceedsBatchRuntime {
    async fn delete_job(&self, _namespace: &str, _name: &str) -> Result<(), orchestrator_core::batch::BatchError> {
        Ok(())
    }
    async fn create_job(
        &self,
        _namespace: &str,
        name: &str,
        _command: &[String],
        _env: &HashMap<String, String>,
        _backoff_limit: u32,
    ) -> Result<(), orchestrator_core::batch::BatchError> {
        self.created.lock().unwrap().push(name.to_string());
        Ok(())
    }
    async fn job_status(&self, _namespace: &str, _name: &str) -> Result<orchestrator_core::batch::JobStatus, orchestrator_core::batch::BatchError> {
        Ok(orchestrator_core::batch::JobStatus::Succeeded)
    }
    async fn tail_logs(&self, _namespace: &str, _name: &str) -> Result<String, orchestrator_core::batch::BatchError> {
        Ok("remote job output".to_string())
    }
}

/// Initializes a git repository at `dir` with one commit so VCS tests
/// have a HEAD to diff and log against.
pub fn scratch_git_repo(dir: &Path) -> git2::Repository {
    let repo = git2::Repository::init(dir).expect("init scratch repo");
    std::fs::write(dir.join("README.md"), "scratch\n").unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new("README.md")).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = git2::Signature::now("test", "test@example.com").unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "initial commit", &tree, &[]).unwrap();

    repo
}
