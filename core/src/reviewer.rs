//! Reviewer: a single schema-constrained chat request,
//! strict-then-fallback JSON parsing, and the bounded correction cycle
//! around [`orchestrator_kernel::review::decide_approval`].

use std::fmt;

use orchestrator_kernel::review::{ApprovalStatus, ReviewIssue, decide_approval};
use serde::{Deserialize, Serialize};

use crate::ports::{ChatMessage, ChatRequest, MessageRole, ModelClient, ModelError};

const FILE_CONTENT_CHAR_LIMIT: usize = 8000;
const FILE_CONTENT_LINE_LIMIT: usize = 400;
const IMPLEMENTATION_CHAR_LIMIT: usize = 6000;
const IMPLEMENTATION_LINE_LIMIT: usize = 200;

#[derive(Debug)]
pub enum ReviewerError {
    Model(ModelError),
    Parse { raw: String },
}

impl fmt::Display for ReviewerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model(e) => write!(f, "{e}"),
            Self::Parse { raw } => write!(f, "failed to parse review response: {}", truncate_for_display(raw)),
        }
    }
}

impl std::error::Error for ReviewerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Model(e) => Some(e),
            Self::Parse { .. } => None,
        }
    }
}

/// Largest byte index `<= index` that lies on a UTF-8 char boundary of `s`.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn truncate_for_display(s: &str) -> String {
    if s.len() > 200 {
        format!("{}...", &s[..floor_char_boundary(s, 200)])
    } else {
        s.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub summary: String,
    #[serde(default)]
    pub issues: Vec<ReviewIssue>,
    #[serde(default)]
    pub approval_status: ApprovalStatus,
}

/// Truncates `content` to the tighter of a character and a line budget,
/// appending a tail marker when truncation occurred.
fn truncate_with_marker(content: &str, char_limit: usize, line_limit: usize) -> String {
    let by_lines: String = content.lines().take(line_limit).collect::<Vec<_>>().join("\n");
    let truncated = if by_lines.len() > char_limit {
        &by_lines[..floor_char_boundary(&by_lines, char_limit)]
    } else {
        &by_lines
    };

    if truncated.len() < content.len() {
        format!("{truncated}\n... (truncated)")
    } else {
        truncated.to_string()
    }
}

pub struct ReviewInput<'a> {
    pub task_description: &'a str,
    /// `(path, content)` pairs for `task.Files ∪ builderResult.Files`, sorted.
    pub files: &'a [(String, String)],
    pub implementation_text: &'a str,
}

fn build_review_request(model: &str, input: &ReviewInput<'_>) -> ChatRequest {
    let mut prompt = String::new();
    prompt.push_str("Review the following implementation against the task description.\n\n");
    prompt.push_str("Task: ");
    prompt.push_str(input.task_description);
    prompt.push_str("\n\nFiles:\n");
    for (path, content) in input.files {
        let abridged = truncate_with_marker(content, FILE_CONTENT_CHAR_LIMIT, FILE_CONTENT_LINE_LIMIT);
        prompt.push_str(&format!("--- {path} ---\n{abridged}\n"));
    }
    prompt.push_str("\nImplementation notes:\n");
    prompt.push_str(&truncate_with_marker(
        input.implementation_text,
        IMPLEMENTATION_CHAR_LIMIT,
        IMPLEMENTATION_LINE_LIMIT,
    ));
    prompt.push_str(
        "\n\nRespond with JSON matching: {\"summary\": string, \"issues\": [{\"severity\": \
         \"critical\"|\"quality\"|\"nit\", \"category\": string, \"title\": string, \
         \"description\": string, \"location\": string?, \"suggested_fix\": string?}], \
         \"approval_status\": \"approved\"|\"approved_with_nits\"|\"changes_requested\"}",
    );

    ChatRequest {
        model: model.to_string(),
        messages: vec![ChatMessage { role: MessageRole::User, content: prompt, tool_calls: vec![], tool_call_id: None }],
        tools: vec![],
        tool_choice: None,
        temperature: Some(0.0),
        reasoning: false,
    }
}

/// Strict decode, then strip one surrounding fenced block and retry,
/// then take the outermost `{…}` substring and retry.
pub fn parse_review_response(raw: &str) -> Result<ReviewResponse, ReviewerError> {
    if let Ok(parsed) = serde_json::from_str(raw) {
        return Ok(parsed);
    }

    let stripped = strip_fence(raw);
    if stripped != raw {
        if let Ok(parsed) = serde_json::from_str(&stripped) {
            return Ok(parsed);
        }
    }

    if let Some(braces) = outermost_braces(raw) {
        if let Ok(parsed) = serde_json::from_str(braces) {
            return Ok(parsed);
        }
    }

    Err(ReviewerError::Parse { raw: raw.to_string() })
}

fn strip_fence(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return raw.to_string();
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\n', '\r']);
    rest.strip_suffix("```").unwrap_or(rest).to_string()
}

fn outermost_braces(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end > start { Some(&raw[start..=end]) } else { None }
}

pub async fn request_review(model: &dyn ModelClient, model_name: &str, input: &ReviewInput<'_>) -> Result<ReviewResponse, ReviewerError> {
    let request = build_review_request(model_name, input);
    let response = model.chat_completion(request).await.map_err(ReviewerError::Model)?;
    let text = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .unwrap_or_default();
    parse_review_response(&text)
}

/// Decides approval from a parsed review.
pub fn evaluate(review: &ReviewResponse, allow_nits: bool) -> bool {
    decide_approval(review.approval_status, &review.issues, allow_nits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_strict_json() {
        let raw = r#"{"summary": "looks good", "issues": [], "approval_status": "approved"}"#;
        let parsed = parse_review_response(raw).unwrap();
        assert_eq!(parsed.approval_status, ApprovalStatus::Approved);
    }

    #[test]
    fn parses_json_in_fenced_block() {
        let raw = "```json\n{\"summary\": \"ok\", \"issues\": [], \"approval_status\": \"approved\"}\n```";
        let parsed = parse_review_response(raw).unwrap();
        assert_eq!(parsed.summary, "ok");
    }

    #[test]
    fn parses_outermost_braces_with_surrounding_prose() {
        let raw = "Here is my review:\n{\"summary\": \"ok\", \"issues\": [], \"approval_status\": \"approved\"}\nThanks!";
        let parsed = parse_review_response(raw).unwrap();
        assert_eq!(parsed.summary, "ok");
    }

    #[test]
    fn reports_parse_error_when_all_fallbacks_fail() {
        let raw = "not json at all";
        assert!(parse_review_response(raw).is_err());
    }

    #[test]
    fn truncation_adds_tail_marker() {
        let long = "line\n".repeat(500);
        let truncated = truncate_with_marker(&long, 8000, 400);
        assert!(truncated.ends_with("(truncated)"));
    }

    #[test]
    fn truncation_does_not_split_a_multi_byte_char_at_the_boundary() {
        // one line of 7999 ascii bytes, then a 2-byte UTF-8 char straddling
        // the 8000-byte cutoff.
        let mut line = "a".repeat(7999);
        line.push('é');
        let content = format!("{line}\nmore content after the split\n");
        let truncated = truncate_with_marker(&content, 8000, 400);
        assert!(truncated.is_char_boundary(truncated.len() - "\n... (truncated)".len()));
    }

    #[test]
    fn parse_error_display_does_not_panic_on_multi_byte_boundary() {
        let mut raw = "x".repeat(199);
        raw.push('€');
        raw.push_str(" trailing");
        let err = ReviewerError::Parse { raw };
        let _ = err.to_string();
    }
}
