//! LLM client abstraction used by the agent runtime.
//!
//! Models are reached through the [`LlmClient`] trait; [`OpenRouterClient`]
//! is the production implementation. Responses carry reasoning blocks
//! separately from the visible answer so the post-processor can surface them
//! while the runtime sends them back untouched on the next request.

mod error;
mod openrouter;

pub use error::{classify_http_status, LlmError, LlmErrorKind, RetryConfig};
pub use openrouter::OpenRouterClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Reasoning block returned by thinking models.
///
/// `thought_signature`/`data` are opaque continuation markers. They must be sent
/// back verbatim on the next request of a tool-calling exchange, so nothing in
/// this crate rewrites a reasoning block after it is received.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReasoningContent {
    /// Reasoning text (OpenRouter uses either `content` or `text`).
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "text")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", alias = "thoughtSignature")]
    pub thought_signature: Option<String>,

    /// e.g. "reasoning.text", "reasoning.encrypted"
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub reasoning_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,

    /// Tool call id this block belongs to (Gemini via OpenRouter).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Encrypted reasoning payload (Gemini via OpenRouter).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl ReasoningContent {
    /// Plain reasoning text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            reasoning_type: Some("reasoning.text".to_string()),
            ..Default::default()
        }
    }

    /// Non-empty reasoning text, if this block carries any.
    pub fn summary_text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn get_thought_signature(&self) -> Option<&str> {
        self.thought_signature.as_deref().or(self.data.as_deref())
    }
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Sent back as `reasoning_details`, which is what OpenRouter expects.
    #[serde(
        skip_serializing_if = "Option::is_none",
        rename = "reasoning_details",
        alias = "reasoning"
    )]
    pub reasoning: Option<Vec<ReasoningContent>>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            reasoning: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Tool result addressed to a previous tool call.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            reasoning: None,
        }
    }

    /// Assistant turn rebuilt from a response, reasoning blocks included.
    pub fn from_response(response: &ChatResponse) -> Self {
        ChatMessage {
            role: Role::Assistant,
            content: response.content.clone(),
            tool_calls: response.tool_calls.clone(),
            tool_call_id: None,
            reasoning: response.reasoning.clone().filter(|r| !r.is_empty()),
        }
    }
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
    #[serde(skip_serializing_if = "Option::is_none", alias = "thoughtSignature")]
    pub thought_signature: Option<String>,
}

/// Function call details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: String,
    /// Arguments as a JSON string. May be empty for no-argument functions.
    #[serde(default)]
    pub arguments: String,
    #[serde(skip_serializing_if = "Option::is_none", alias = "thoughtSignature")]
    pub thought_signature: Option<String>,
}

impl FunctionCall {
    /// Parse the argument string, treating empty input as `{}`.
    pub fn parsed_arguments(&self) -> serde_json::Value {
        if self.arguments.trim().is_empty() {
            return serde_json::json!({});
        }
        serde_json::from_str(&self.arguments)
            .unwrap_or_else(|_| serde_json::json!({ "input": self.arguments }))
    }
}

/// Tool definition for the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

/// Function definition with schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Response from a chat completion.
///
/// The segments of the output are, in order: the reasoning blocks, then the
/// visible `content`, then any tool calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
    pub model: Option<String>,
    pub reasoning: Option<Vec<ReasoningContent>>,
}

impl ChatResponse {
    /// Tool calls, or an empty slice.
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }

    /// Reasoning blocks, or an empty slice.
    pub fn reasoning_blocks(&self) -> &[ReasoningContent] {
        self.reasoning.as_deref().unwrap_or(&[])
    }
}

/// Token usage information (if provided by the upstream provider).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    /// Tokens spent on internal reasoning, when the provider reports them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
}

impl TokenUsage {
    /// Create a usage object ensuring `total_tokens` is consistent.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
            reasoning_tokens: None,
        }
    }

    pub fn with_reasoning_tokens(mut self, reasoning_tokens: Option<u64>) -> Self {
        self.reasoning_tokens = reasoning_tokens;
        self
    }
}

/// Optional parameters for chat completions.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
    /// Token budget for reasoning; `None` leaves thinking off.
    pub reasoning_max_tokens: Option<u64>,
}

/// Trait for LLM clients.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a chat completion request.
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        options: &ChatOptions,
    ) -> anyhow::Result<ChatResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_message_keeps_reasoning_signatures() {
        let response = ChatResponse {
            content: None,
            tool_calls: Some(vec![ToolCall {
                id: "call_1".to_string(),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: "web_search".to_string(),
                    arguments: "{\"query\":\"rust\"}".to_string(),
                    thought_signature: None,
                },
                thought_signature: None,
            }]),
            reasoning: Some(vec![ReasoningContent {
                id: Some("call_1".to_string()),
                data: Some("opaque".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        };

        let message = ChatMessage::from_response(&response);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["reasoning_details"][0]["data"], "opaque");
        assert_eq!(value["tool_calls"][0]["function"]["name"], "web_search");
    }

    #[test]
    fn parsed_arguments_tolerates_empty_and_raw_strings() {
        let empty = FunctionCall {
            name: "x".to_string(),
            arguments: String::new(),
            thought_signature: None,
        };
        assert_eq!(empty.parsed_arguments(), serde_json::json!({}));

        let raw = FunctionCall {
            name: "x".to_string(),
            arguments: "not json".to_string(),
            thought_signature: None,
        };
        assert_eq!(raw.parsed_arguments()["input"], "not json");
    }

    #[test]
    fn summary_text_skips_blank_blocks() {
        assert_eq!(ReasoningContent::text("  ").summary_text(), None);
        assert_eq!(ReasoningContent::text(" plan ").summary_text(), Some("plan"));
        assert_eq!(ReasoningContent::default().summary_text(), None);
    }
}
