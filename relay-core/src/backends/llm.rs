//! Language model backend trait and an HTTP reference implementation
//! talking to a local OpenAI-compatible chat completion endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    /// Why generation stopped: "stop", "length", "timeout", or whatever
    /// the backend reports. The pipeline treats "length" and "timeout" as
    /// truncation and substitutes a fallback.
    pub stop_reason: String,
}

pub trait LanguageModel: Send {
    fn generate(&self, system_prompt: &str, user_text: &str) -> Result<LlmResponse>;
}

#[derive(Debug, Clone)]
pub struct HttpLanguageModelConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_ms: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for HttpLanguageModelConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:11434/v1/chat/completions".to_string(),
            model: "llama3".to_string(),
            timeout_ms: 8_000,
            max_tokens: 200,
            temperature: 0.4,
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponseBody {
    choices: Vec<ChatChoice>,
}

/// Blocking HTTP client against a local, OpenAI-compatible chat endpoint.
/// Kept deliberately minimal: one request, one response, no streaming and
/// no tool calling, matching the pipeline's single-shot request/response
/// per utterance.
pub struct HttpLanguageModel {
    config: HttpLanguageModelConfig,
    client: reqwest::blocking::Client,
}

impl HttpLanguageModel {
    pub fn new(config: HttpLanguageModelConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| RelayError::Backend {
                kind: "llm",
                message: e.to_string(),
            })?;
        Ok(Self { config, client })
    }
}

impl LanguageModel for HttpLanguageModel {
    fn generate(&self, system_prompt: &str, user_text: &str) -> Result<LlmResponse> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_text,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self.client.post(&self.config.endpoint).json(&request).send();

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Ok(LlmResponse {
                    content: String::new(),
                    stop_reason: "timeout".to_string(),
                })
            }
            Err(e) => {
                return Err(RelayError::Backend {
                    kind: "llm",
                    message: e.to_string(),
                })
            }
        };

        if !response.status().is_success() {
            return Err(RelayError::Backend {
                kind: "llm",
                message: format!("unexpected status {}", response.status()),
            });
        }

        let body: ChatResponseBody = response.json().map_err(|e| RelayError::Backend {
            kind: "llm",
            message: e.to_string(),
        })?;

        let choice = body.choices.into_iter().next().ok_or(RelayError::Backend {
            kind: "llm",
            message: "empty choices array".to_string(),
        })?;

        Ok(LlmResponse {
            content: choice.message.content,
            stop_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
        })
    }
}
