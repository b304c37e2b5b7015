//! OpenAI-compatible chat completions provider.
//!
//! Works against api.openai.com and any server exposing the same
//! `/chat/completions` endpoint via `base_url`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use kairos_core::error::{KairosError, KairosResult};
use kairos_core::traits::{
    GenerationOptions, Llm, LlmConfig, LlmResponse, ResponseFormat, TokenUsage,
};
use kairos_core::types::{Message, MessageRole};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-nano-2025-04-14";

/// OpenAI LLM provider.
pub struct OpenAIProvider {
    client: Client,
    config: LlmConfig,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ChatResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI LLM provider.
    pub fn new(config: LlmConfig) -> KairosResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                KairosError::Configuration("OpenAI API key not found. Set OPENAI_API_KEY environment variable or provide api_key in config.".to_string())
            })?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {}", api_key)
                .parse()
                .map_err(|_| KairosError::Configuration("Invalid API key format".to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                KairosError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        let base_url = config
            .base_url
            .clone()
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| OPENAI_API_URL.to_string());

        let mut config = config;
        if config.model.is_empty() {
            config.model = DEFAULT_OPENAI_MODEL.to_string();
        }

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    /// Check if this is a reasoning model that doesn't support certain params.
    fn is_reasoning_model_internal(&self) -> bool {
        let model_lower = self.config.model.to_lowercase();
        ["o1", "o3", "gpt-5"]
            .iter()
            .any(|m| model_lower.contains(m))
    }

    fn build_request(&self, messages: &[Message], options: &GenerationOptions) -> ChatRequest {
        let reasoning = self.is_reasoning_model_internal();
        let max_tokens = options.max_tokens.unwrap_or(self.config.max_tokens);

        ChatRequest {
            model: self.config.model.clone(),
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: match m.role {
                        MessageRole::System => "system",
                        MessageRole::User => "user",
                        MessageRole::Assistant => "assistant",
                    },
                    content: m.content.clone(),
                })
                .collect(),
            temperature: (!reasoning)
                .then(|| options.temperature.unwrap_or(self.config.temperature)),
            max_tokens: (!reasoning).then_some(max_tokens),
            max_completion_tokens: reasoning.then_some(max_tokens),
            response_format: options.response_format.as_ref().map(|format| match format {
                ResponseFormat::Json => ChatResponseFormat {
                    format_type: "json_object",
                },
            }),
        }
    }
}

#[async_trait]
impl Llm for OpenAIProvider {
    async fn generate(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> KairosResult<LlmResponse> {
        let options = options.unwrap_or_default();
        let request = self.build_request(messages, &options);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| KairosError::llm(format!("OpenAI API request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| KairosError::llm(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<OpenAIError>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| body.clone());
            return Err(KairosError::llm(format!(
                "OpenAI API error ({}): {}",
                status, message
            )));
        }

        let response: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            KairosError::llm_invalid_response(format!("Failed to parse response: {}", e))
        })?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);
        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });
        debug!(model = %self.config.model, ?usage, "OpenAI generation complete");

        Ok(LlmResponse { content, usage })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(model: &str) -> OpenAIProvider {
        OpenAIProvider::new(LlmConfig {
            model: model.to_string(),
            api_key: Some("sk-test".to_string()),
            base_url: Some("http://localhost:8080/v1/".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_base_url_and_default_model() {
        let llm = provider("");
        assert_eq!(llm.base_url, "http://localhost:8080/v1");
        assert_eq!(llm.model_name(), DEFAULT_OPENAI_MODEL);
        assert!(llm.supports_json_mode());
    }

    #[test]
    fn test_json_mode_request() {
        let llm = provider("gpt-4o-mini");
        let request = llm.build_request(
            &[Message::system("sys"), Message::user("hi")],
            &GenerationOptions {
                response_format: Some(ResponseFormat::Json),
                ..Default::default()
            },
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["max_tokens"], 500);
        assert!(json.get("max_completion_tokens").is_none());
    }

    #[test]
    fn test_reasoning_models_skip_sampling_params() {
        let llm = provider("o3-mini");
        let request = llm.build_request(&[Message::user("hi")], &GenerationOptions::default());
        assert!(request.temperature.is_none());
        assert!(request.max_tokens.is_none());
        assert_eq!(request.max_completion_tokens, Some(500));
    }
}
