//! Chat-with-tools loop: drives the model through up to
//! 10 round-trips, applies authorized tool calls, then parses the final
//! text response into a `{path -> content}` file-block map and applies
//! it via the write tool.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::error::WorkflowPaused;
use crate::ports::{ChatMessage, ChatRequest, MessageRole, ModelClient, ModelError, ToolCallRequest, ToolRegistry};
use crate::workflow::WorkflowController;

pub const MAX_TOOL_ROUNDS: u32 = 10;

const LANGUAGE_FENCE_NAMES: &[&str] = &[
    "go", "python", "javascript", "typescript", "rust", "java", "c", "cpp", "bash", "sh", "yaml",
    "json", "md", "markdown",
];

#[derive(Debug)]
pub enum BuilderError {
    MaxIterationsExceeded,
    Model(ModelError),
    Write { path: String, reason: String },
    /// The workflow controller suspended this build (an authorized tool
    /// call requested elevation, or a write fell outside the task's
    /// declared architectural scope). This unwinds the build without
    /// being a build failure; callers must not mark the task failed.
    Paused(WorkflowPaused),
}

impl fmt::Display for BuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxIterationsExceeded => write!(f, "max tool calling iterations exceeded"),
            Self::Model(e) => write!(f, "{e}"),
            Self::Write { path, reason } => write!(f, "failed to write `{path}`: {reason}"),
            Self::Paused(p) => write!(f, "{p}"),
        }
    }
}

impl std::error::Error for BuilderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Model(e) => Some(e),
            Self::Paused(p) => Some(p),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppliedFile {
    pub path: String,
    pub lines_added: usize,
}

#[derive(Debug, Clone)]
pub struct BuilderResult {
    pub raw_text: String,
    pub applied: Vec<AppliedFile>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Scope rule for the architectural-scope guard: exact path, a
/// `<prefix>/...` deep suffix, or a `<prefix>/*` one-level suffix. These
/// two wildcard suffixes are the only glob forms recognized.
pub fn path_in_scope(candidate: &str, declared_files: &[String]) -> bool {
    declared_files.iter().any(|scope| {
        if scope == candidate {
            return true;
        }
        if let Some(prefix) = scope.strip_suffix("/...") {
            return candidate.starts_with(prefix) && candidate[prefix.len()..].starts_with('/');
        }
        if let Some(prefix) = scope.strip_suffix("/*") {
            if !candidate.starts_with(prefix) {
                return false;
            }
            let rest = &candidate[prefix.len()..];
            return rest.starts_with('/') && !rest[1..].contains('/');
        }
        false
    })
}

/// Finds fenced code blocks whose opening fence is `filepath:<path>` or a
/// bare `<path>` that is not a recognized language name.
/// Idempotent: running this twice on the same text yields the same map.
pub fn extract_file_blocks(text: &str) -> HashMap<String, String> {
    let mut blocks = HashMap::new();
    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim_start();
        if let Some(fence_rest) = trimmed.strip_prefix("```") {
            let header = fence_rest.trim();
            let path = if let Some(p) = header.strip_prefix("filepath:") {
                Some(p.trim().to_string())
            } else if !header.is_empty() && !LANGUAGE_FENCE_NAMES.contains(&header) {
                Some(header.to_string())
            } else {
                None
            };

            let mut body = Vec::new();
            let mut j = i + 1;
            while j < lines.len() && !lines[j].trim_start().starts_with("```") {
                body.push(lines[j]);
                j += 1;
            }

            let accepted_path = path.or_else(|| {
                // bare language-name fence: only accept with an explicit
                // `// File:`/`# File:` directive in the first five lines.
                body.iter().take(5).find_map(|l| {
                    l.trim_start()
                        .strip_prefix("// File:")
                        .or_else(|| l.trim_start().strip_prefix("# File:"))
                        .map(|p| p.trim().to_string())
                })
            });

            if let Some(path) = accepted_path {
                blocks.insert(path, body.join("\n"));
            }

            i = j + 1;
        } else {
            i += 1;
        }
    }

    blocks
}

/// Splits a shell command on `&&`/`||`/`;`/newline, tokenizes each
/// segment, and reports whether any segment's first token (after
/// stripping inline `VAR=value` assignments) requests elevation.
pub fn contains_elevation_token(command: &str) -> bool {
    const ELEVATION_TOKENS: &[&str] = &["sudo", "doas", "su"];

    command
        .split(['\n'])
        .flat_map(|line| line.split("&&"))
        .flat_map(|s| s.split("||"))
        .flat_map(|s| s.split(';'))
        .any(|segment| {
            let mut tokens = segment.split_whitespace().skip_while(|t| t.contains('=') && !t.starts_with('-'));
            tokens.next().map(|t| ELEVATION_TOKENS.contains(&t)).unwrap_or(false)
        })
}

pub struct BuildContext<'a> {
    pub model: &'a dyn ModelClient,
    pub tools: &'a dyn ToolRegistry,
    pub workflow: &'a WorkflowController,
    pub model_name: String,
    pub allowed_tools: Option<Vec<String>>,
}

/// Runs the bounded chat-with-tools loop and applies any resulting file
/// blocks via the `write_file` tool. `declared_files` drives the
/// architectural-scope guard when `guard_scope` is set.
pub async fn run_builder(
    ctx: &BuildContext<'_>,
    mut messages: Vec<ChatMessage>,
    declared_files: &[String],
    guard_scope: bool,
) -> Result<BuilderResult, BuilderError> {
    let started_at = chrono::Utc::now();
    let mut tools_enabled = true;

    for round in 0..MAX_TOOL_ROUNDS {
        let catalog = if tools_enabled { ctx.tools.catalog(ctx.allowed_tools.as_deref()) } else { vec![] };

        let request = ChatRequest {
            model: ctx.model_name.clone(),
            messages: messages.clone(),
            tools: catalog,
            tool_choice: None,
            temperature: None,
            reasoning: ctx.model.supports_reasoning(&ctx.model_name),
        };

        let response = match ctx.model.chat_completion(request).await {
            Ok(r) => r,
            Err(e) if tools_enabled && is_tool_unsupported(&e) => {
                tools_enabled = false;
                continue;
            }
            Err(e) => return Err(BuilderError::Model(e)),
        };

        let Some(choice) = response.choices.into_iter().next() else {
            return Err(BuilderError::Model(ModelError("model returned no choices".to_string())));
        };
        let assistant_message = choice.message;

        if assistant_message.tool_calls.is_empty() {
            let raw_text = assistant_message.content.clone();
            let applied = apply_file_blocks(ctx, &raw_text, declared_files, guard_scope).await?;
            return Ok(BuilderResult { raw_text, applied, started_at, completed_at: chrono::Utc::now() });
        }

        let tool_calls = assistant_message.tool_calls.clone();
        messages.push(assistant_message);

        for call in tool_calls {
            match handle_tool_call(ctx, &call).await {
                Ok(tool_message) => messages.push(tool_message),
                Err(paused) => return Err(BuilderError::Paused(paused)),
            }
        }

        if round + 1 == MAX_TOOL_ROUNDS {
            return Err(BuilderError::MaxIterationsExceeded);
        }
    }

    Err(BuilderError::MaxIterationsExceeded)
}

fn is_tool_unsupported(error: &ModelError) -> bool {
    error.0.to_ascii_lowercase().contains("tool")
}

/// Runs one tool call. Step 4(a) (unauthorized/unknown tool) stays a
/// recoverable tool-response error the model can adapt to. Step 4(b) (the
/// workflow controller's authorization hook raising `WorkflowPaused`) is
/// a distinguished sentinel that must unwind the whole build instead,
/// so it surfaces as `Err` rather than becoming a tool message.
async fn handle_tool_call(ctx: &BuildContext<'_>, call: &ToolCallRequest) -> Result<ChatMessage, WorkflowPaused> {
    let authorized = ctx
        .allowed_tools
        .as_ref()
        .map(|allow| allow.iter().any(|n| n == &call.name))
        .unwrap_or(true);

    if !authorized {
        return Ok(tool_error_message(call, &format!("Error: tool `{}` is not authorized", call.name)));
    }

    let Some(tool) = ctx.tools.get(&call.name) else {
        return Ok(tool_error_message(call, &format!("Error: unknown tool `{}`", call.name)));
    };

    ctx.workflow.authorize_tool_call(&call.name, &call.arguments)?;

    let params: HashMap<String, Value> = serde_json::from_str(&call.arguments).unwrap_or_default();
    let result = tool.execute(params).await;

    let content = if result.success {
        serde_json::to_string(&result.data).unwrap_or_else(|_| "{}".to_string())
    } else {
        format!("Error: {}", result.error)
    };

    Ok(ChatMessage { role: MessageRole::Tool, content, tool_calls: vec![], tool_call_id: Some(call.id.clone()) })
}

fn tool_error_message(call: &ToolCallRequest, content: &str) -> ChatMessage {
    ChatMessage {
        role: MessageRole::Tool,
        content: content.to_string(),
        tool_calls: vec![],
        tool_call_id: Some(call.id.clone()),
    }
}

async fn apply_file_blocks(
    ctx: &BuildContext<'_>,
    raw_text: &str,
    declared_files: &[String],
    guard_scope: bool,
) -> Result<Vec<AppliedFile>, BuilderError> {
    let blocks = extract_file_blocks(raw_text);
    let mut applied = Vec::new();

    for (path, content) in blocks {
        if guard_scope && !declared_files.is_empty() && !path_in_scope(&path, declared_files) {
            let paused = ctx.workflow.pause(
                "architectural-scope guard",
                Some(format!("`{path}` is outside the task's declared file scope; continue?")),
            );
            return Err(BuilderError::Paused(paused));
        }

        let Some(tool) = ctx.tools.get("write_file") else {
            return Err(BuilderError::Write { path, reason: "no write_file tool registered".to_string() });
        };

        let mut params = HashMap::new();
        params.insert("path".to_string(), Value::String(path.clone()));
        params.insert("content".to_string(), Value::String(content.clone()));
        let result = tool.execute(params).await;
        if !result.success {
            return Err(BuilderError::Write { path, reason: result.error });
        }

        applied.push(AppliedFile { path, lines_added: content.lines().count() });
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_filepath_prefixed_fence() {
        let text = "intro\n```filepath:src/lib.rs\nfn main() {}\n```\n";
        let blocks = extract_file_blocks(text);
        assert_eq!(blocks.get("src/lib.rs").unwrap(), "fn main() {}");
    }

    #[test]
    fn ignores_bare_language_fence_without_directive() {
        let text = "```rust\nfn main() {}\n```\n";
        let blocks = extract_file_blocks(text);
        assert!(blocks.is_empty());
    }

    #[test]
    fn accepts_bare_language_fence_with_file_directive() {
        let text = "```rust\n// File: src/lib.rs\nfn main() {}\n```\n";
        let blocks = extract_file_blocks(text);
        assert_eq!(blocks.get("src/lib.rs").unwrap(), "// File: src/lib.rs\nfn main() {}");
    }

    #[test]
    fn extraction_is_idempotent() {
        let text = "```filepath:a.rs\nfn a() {}\n```\n```filepath:b.rs\nfn b() {}\n```\n";
        assert_eq!(extract_file_blocks(text), extract_file_blocks(text));
    }

    #[test]
    fn scope_matches_exact_deep_and_one_level() {
        let scope = vec!["src/lib.rs".to_string(), "pkg/...".to_string(), "cmd/*".to_string()];
        assert!(path_in_scope("src/lib.rs", &scope));
        assert!(path_in_scope("pkg/sub/deep.go", &scope));
        assert!(path_in_scope("cmd/main.go", &scope));
        assert!(!path_in_scope("cmd/sub/main.go", &scope));
        assert!(!path_in_scope("other.rs", &scope));
    }

    #[test]
    fn detects_sudo_after_env_assignment() {
        assert!(contains_elevation_token("FOO=bar sudo rm -rf /tmp/x"));
        assert!(contains_elevation_token("echo hi && sudo reboot"));
        assert!(!contains_elevation_token("echo sudo-like-but-not-a-command"));
    }

    use crate::ports::{ChatChoice, ChatResponse, NullTelemetrySink, Tool, ToolResult, ToolSpec};
    use crate::workflow::WorkflowController;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct ShellTool;

    #[async_trait]
    impl Tool for ShellTool {
        fn name(&self) -> &str {
            "shell"
        }
        fn description(&self) -> &str {
            "runs a shell command"
        }
        fn parameters(&self) -> Value {
            serde_json::json!({})
        }
        async fn execute(&self, _params: HashMap<String, Value>) -> ToolResult {
            ToolResult { success: true, data: HashMap::new(), error: String::new() }
        }
    }

    struct ShellOnlyRegistry {
        tool: ShellTool,
    }

    impl ToolRegistry for ShellOnlyRegistry {
        fn get(&self, name: &str) -> Option<&dyn Tool> {
            if name == "shell" { Some(&self.tool) } else { None }
        }
        fn catalog(&self, _allow: Option<&[String]>) -> Vec<ToolSpec> {
            vec![]
        }
    }

    struct SingleToolCallThenDone {
        tool_name: String,
        tool_args: String,
    }

    #[async_trait]
    impl ModelClient for SingleToolCallThenDone {
        async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, ModelError> {
            let already_called = request.messages.iter().any(|m| matches!(m.role, MessageRole::Tool));
            let message = if already_called {
                ChatMessage { role: MessageRole::Assistant, content: "done".to_string(), tool_calls: vec![], tool_call_id: None }
            } else {
                ChatMessage {
                    role: MessageRole::Assistant,
                    content: String::new(),
                    tool_calls: vec![ToolCallRequest { id: "call_1".to_string(), name: self.tool_name.clone(), arguments: self.tool_args.clone() }],
                    tool_call_id: None,
                }
            };
            Ok(ChatResponse { choices: vec![ChatChoice { message }] })
        }
        fn supports_reasoning(&self, _model: &str) -> bool {
            false
        }
    }

    struct WritesOutOfScope;

    #[async_trait]
    impl ModelClient for WritesOutOfScope {
        async fn chat_completion(&self, _request: ChatRequest) -> Result<ChatResponse, ModelError> {
            Ok(ChatResponse {
                choices: vec![ChatChoice {
                    message: ChatMessage {
                        role: MessageRole::Assistant,
                        content: "```filepath:outside/scope.rs\nfn x() {}\n```".to_string(),
                        tool_calls: vec![],
                        tool_call_id: None,
                    },
                }],
            })
        }
        fn supports_reasoning(&self, _model: &str) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn elevated_tool_call_pauses_and_unwinds_the_build_instead_of_becoming_a_tool_error() {
        let model = SingleToolCallThenDone {
            tool_name: "shell".to_string(),
            tool_args: serde_json::json!({"command": "sudo rm -rf /var/log"}).to_string(),
        };
        let tools = ShellOnlyRegistry { tool: ShellTool };
        let workflow = WorkflowController::new("session-test", Arc::new(NullTelemetrySink), "orchestrator");
        let ctx = BuildContext { model: &model, tools: &tools, workflow: &workflow, model_name: "test-model".to_string(), allowed_tools: None };

        let result = run_builder(&ctx, vec![], &[], false).await;
        assert!(matches!(result, Err(BuilderError::Paused(_))));
        assert!(workflow.is_paused());
    }

    #[tokio::test]
    async fn file_outside_declared_scope_pauses_instead_of_failing_the_build() {
        let model = WritesOutOfScope;
        let tools = ShellOnlyRegistry { tool: ShellTool };
        let workflow = WorkflowController::new("session-test", Arc::new(NullTelemetrySink), "orchestrator");
        let declared = vec!["src/lib.rs".to_string()];
        let ctx = BuildContext { model: &model, tools: &tools, workflow: &workflow, model_name: "test-model".to_string(), allowed_tools: None };

        let result = run_builder(&ctx, vec![], &declared, true).await;
        assert!(matches!(result, Err(BuilderError::Paused(_))));
        assert!(workflow.is_paused());
    }
}
