//! Trait boundaries for every external collaborator: the model RPC, the
//! tool registry, the telemetry bus. `cli` supplies the concrete
//! implementations; `core` only depends on these traits plus `git2`
//! directly (git is a core-engine responsibility, not an external
//! collaborator).

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// Raw JSON-string arguments, matching the OpenAI-style wire shape
    /// (`function.arguments` is a JSON string, not a nested object).
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
    /// Set only on `role: tool` messages, echoing the call being answered.
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
    pub tool_choice: Option<String>,
    pub temperature: Option<f32>,
    pub reasoning: bool,
}

#[derive(Debug, Clone)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug)]
pub struct ModelError(pub String);

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model error: {}", self.0)
    }
}

impl std::error::Error for ModelError {}

/// Narrow capability set: a single chat-completion operation, plus a
/// predicate to decide whether extended reasoning can be requested for
/// a given model.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, ModelError>;
    fn supports_reasoning(&self, model: &str) -> bool;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default)]
    pub data: HashMap<String, Value>,
    #[serde(default)]
    pub error: String,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    async fn execute(&self, params: HashMap<String, Value>) -> ToolResult;
}

/// Consumer interface only: `core` looks tools up by name and asks for a
/// filtered JSON-function catalog. It never owns tool implementations.
pub trait ToolRegistry: Send + Sync {
    fn get(&self, name: &str) -> Option<&dyn Tool>;
    fn catalog(&self, allow: Option<&[String]>) -> Vec<ToolSpec>;
    fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Builds the `orchestrator[.plan.<id>][.task.<id>].<event-type>` subject,
/// with the leading segment as a configurable prefix (default
/// `"orchestrator"`) rather than a literal vendor string.
pub fn telemetry_subject(prefix: &str, event: &TelemetryEvent) -> String {
    let mut subject = prefix.to_string();
    if let Some(plan_id) = &event.plan_id {
        subject.push_str(".plan.");
        subject.push_str(plan_id);
    }
    if let Some(task_id) = &event.task_id {
        subject.push_str(".task.");
        subject.push_str(task_id);
    }
    subject.push('.');
    subject.push_str(&event.event_type);
    subject
}

pub trait TelemetrySink: Send + Sync {
    fn publish(&self, subject: &str, event: &TelemetryEvent);
}

/// A sink that drops events on the floor; used by tests and by callers
/// that have not wired a bus bridge.
pub struct NullTelemetrySink;

impl TelemetrySink for NullTelemetrySink {
    fn publish(&self, _subject: &str, _event: &TelemetryEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_includes_plan_and_task_when_present() {
        let event = TelemetryEvent {
            event_type: "task.started".to_string(),
            plan_id: Some("p1".to_string()),
            task_id: Some("3".to_string()),
            session_id: None,
            timestamp: chrono::Utc::now(),
            data: None,
        };
        assert_eq!(
            telemetry_subject("orchestrator", &event),
            "orchestrator.plan.p1.task.3.task.started"
        );
    }

    #[test]
    fn subject_omits_missing_segments() {
        let event = TelemetryEvent {
            event_type: "run.started".to_string(),
            plan_id: None,
            task_id: None,
            session_id: None,
            timestamp: chrono::Utc::now(),
            data: None,
        };
        assert_eq!(telemetry_subject("orchestrator", &event), "orchestrator.run.started");
    }
}
