//! Concrete `ModelClient`: an OpenAI-compatible chat completions caller
//! over `reqwest`, matching the request/response shape real HTTP model
//! integrations use — headers, JSON body, `choices[0].message`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use orchestrator_core::ports::{
    ChatMessage, ChatRequest, ChatResponse, MessageRole, ModelClient, ModelError, ToolCallRequest,
};

pub struct HttpModelClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    reasoning_models: Vec<String>,
}

impl HttpModelClient {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            api_key: api_key.into(),
            reasoning_models: vec!["o1".to_string(), "o3".to_string(), "o3-mini".to_string()],
        }
    }
}

#[derive(Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    function: WireFunction<'a>,
}

#[derive(Serialize)]
struct WireToolCallFunction<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Serialize)]
struct WireToolCall<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    function: WireToolCallFunction<'a>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct WireResponseToolCallFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct WireResponseToolCall {
    id: String,
    function: WireResponseToolCallFunction,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireResponseToolCall>,
}

#[derive(Deserialize)]
struct WireResponseChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireResponseChoice>,
}

fn role_str(role: &MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    }
}

fn to_wire_message(message: &ChatMessage) -> WireMessage<'_> {
    WireMessage {
        role: role_str(&message.role),
        content: &message.content,
        tool_calls: message
            .tool_calls
            .iter()
            .map(|c| WireToolCall {
                id: &c.id,
                kind: "function",
                function: WireToolCallFunction { name: &c.name, arguments: &c.arguments },
            })
            .collect(),
        tool_call_id: message.tool_call_id.as_deref(),
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, ModelError> {
        let wire_request = WireRequest {
            model: &request.model,
            messages: request.messages.iter().map(to_wire_message).collect(),
            tools: request
                .tools
                .iter()
                .map(|t| WireTool {
                    kind: "function",
                    function: WireFunction { name: &t.name, description: &t.description, parameters: &t.parameters },
                })
                .collect(),
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| ModelError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError(format!("model endpoint returned {status}: {body}")));
        }

        let parsed: WireResponse = response.json().await.map_err(|e| ModelError(e.to_string()))?;

        let choices = parsed
            .choices
            .into_iter()
            .map(|choice| orchestrator_core::ports::ChatChoice {
                message: ChatMessage {
                    role: MessageRole::Assistant,
                    content: choice.message.content.unwrap_or_default(),
                    tool_calls: choice
                        .message
                        .tool_calls
                        .into_iter()
                        .map(|c| ToolCallRequest { id: c.id, name: c.function.name, arguments: c.function.arguments })
                        .collect(),
                    tool_call_id: None,
                },
            })
            .collect();

        Ok(ChatResponse { choices })
    }

    fn supports_reasoning(&self, model: &str) -> bool {
        self.reasoning_models.iter().any(|m| m == model)
    }
}
