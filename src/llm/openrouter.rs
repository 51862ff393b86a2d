//! OpenRouter API client implementation with automatic retry for transient errors.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::error::{LlmError, RetryConfig};
use super::{
    ChatMessage, ChatOptions, ChatResponse, LlmClient, ReasoningContent, TokenUsage, ToolCall,
    ToolDefinition,
};

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// OpenRouter API client with automatic retry for transient errors.
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    retry_config: RetryConfig,
}

impl OpenRouterClient {
    pub fn new(api_key: String) -> Self {
        Self::with_retry_config(api_key, RetryConfig::default())
    }

    pub fn with_retry_config(api_key: String, retry_config: RetryConfig) -> Self {
        Self {
            client: Client::new(),
            api_key,
            retry_config,
        }
    }

    fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Execute a single request without retry.
    async fn execute_request(&self, request: &OpenRouterRequest) -> Result<ChatResponse, LlmError> {
        let response = self
            .client
            .post(OPENROUTER_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("X-Title", "Agent Studio")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network_error(format!("Request timeout: {}", e))
                } else if e.is_connect() {
                    LlmError::network_error(format!("Connection failed: {}", e))
                } else {
                    LlmError::network_error(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let retry_after = Self::parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), body, retry_after));
        }

        let parsed: OpenRouterResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::parse_error(format!("Failed to parse response: {}, body: {}", e, body))
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::parse_error("No choices in response".to_string()))?;

        let reasoning = choice.message.get_reasoning();
        if let Some(ref blocks) = reasoning {
            tracing::debug!(
                "Received {} reasoning blocks (signed: {})",
                blocks.len(),
                blocks.iter().any(|b| b.get_thought_signature().is_some())
            );
        }

        // Gemini puts the signature for a tool call in reasoning_details[].data keyed by call id.
        let mut tool_calls = choice.message.tool_calls;
        if let (Some(ref mut calls), Some(ref blocks)) = (&mut tool_calls, &reasoning) {
            for call in calls.iter_mut() {
                let data = blocks
                    .iter()
                    .find(|b| b.id.as_ref() == Some(&call.id))
                    .and_then(|b| b.data.clone());
                if let Some(data) = data {
                    if call.thought_signature.is_none() {
                        call.thought_signature = Some(data.clone());
                    }
                    if call.function.thought_signature.is_none() {
                        call.function.thought_signature = Some(data);
                    }
                }
            }
        }

        Ok(ChatResponse {
            content: choice.message.content,
            tool_calls,
            finish_reason: choice.finish_reason,
            usage: parsed.usage.map(|u| {
                TokenUsage::new(u.prompt_tokens, u.completion_tokens).with_reasoning_tokens(
                    u.completion_tokens_details.and_then(|d| d.reasoning_tokens),
                )
            }),
            model: parsed.model.or_else(|| Some(request.model.clone())),
            reasoning,
        })
    }

    /// Execute a request with automatic retry for transient errors.
    async fn execute_with_retry(
        &self,
        request: &OpenRouterRequest,
    ) -> anyhow::Result<ChatResponse> {
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            match self.execute_request(request).await {
                Ok(response) => {
                    if attempt > 0 {
                        tracing::info!(
                            "Request succeeded after {} retries (total time: {:?})",
                            attempt,
                            start.elapsed()
                        );
                    }
                    return Ok(response);
                }
                Err(error) => {
                    let remaining = self
                        .retry_config
                        .max_retry_duration
                        .saturating_sub(start.elapsed());
                    let delay = error.suggested_delay(attempt).min(remaining);

                    if !self.retry_config.should_retry(&error, attempt) || delay.is_zero() {
                        tracing::error!(
                            "Request failed after {} attempts ({:?}): {}",
                            attempt + 1,
                            start.elapsed(),
                            error
                        );
                        return Err(error.into());
                    }

                    tracing::warn!(
                        "Attempt {} failed with {}, retrying in {:?}: {}",
                        attempt + 1,
                        error.kind,
                        delay,
                        error.message
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        options: &ChatOptions,
    ) -> anyhow::Result<ChatResponse> {
        let request = OpenRouterRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            tools: tools.filter(|t| !t.is_empty()).map(|t| t.to_vec()),
            tool_choice: tools.filter(|t| !t.is_empty()).map(|_| "auto".to_string()),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            reasoning: options
                .reasoning_max_tokens
                .map(|max_tokens| ReasoningRequest { max_tokens }),
            usage: UsageRequest { include: true },
        };

        tracing::debug!(
            "Sending request to OpenRouter: model={} messages={}",
            model,
            messages.len()
        );

        self.execute_with_retry(&request).await
    }
}

#[derive(Debug, Serialize)]
struct OpenRouterRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<ReasoningRequest>,
    usage: UsageRequest,
}

#[derive(Debug, Serialize)]
struct ReasoningRequest {
    max_tokens: u64,
}

#[derive(Debug, Serialize)]
struct UsageRequest {
    include: bool,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponse {
    choices: Vec<OpenRouterChoice>,
    #[serde(default)]
    usage: Option<OpenRouterUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterChoice {
    message: OpenRouterMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
    /// Plain-string reasoning (some models send this alongside `reasoning_details`).
    #[serde(default)]
    reasoning: Option<serde_json::Value>,
    #[serde(default)]
    reasoning_details: Option<Vec<ReasoningContent>>,
}

impl OpenRouterMessage {
    /// Prefer structured `reasoning_details`; fall back to `reasoning` as string or array.
    fn get_reasoning(&self) -> Option<Vec<ReasoningContent>> {
        if let Some(ref details) = self.reasoning_details {
            if !details.is_empty() {
                return Some(details.clone());
            }
        }

        match self.reasoning.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => {
                Some(vec![ReasoningContent::text(s.clone())])
            }
            serde_json::Value::Array(arr) => serde_json::from_value::<Vec<ReasoningContent>>(
                serde_json::Value::Array(arr.clone()),
            )
            .ok()
            .filter(|blocks| !blocks.is_empty()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenRouterUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    #[serde(default)]
    completion_tokens_details: Option<CompletionTokensDetails>,
}

#[derive(Debug, Deserialize)]
struct CompletionTokensDetails {
    #[serde(default)]
    reasoning_tokens: Option<u64>,
}
