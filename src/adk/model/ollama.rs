// SPDX-License-Identifier: MIT

//! Ollama Model - local chat API implementation

use super::{ChatRequest, ChatResponse, Choice, Message, Model, Usage};
use crate::adk::error::ModelError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Ollama chat model implementation
pub struct OllamaModel {
    client: Client,
    base_url: String,
}

impl OllamaModel {
    /// Create a new OllamaModel. An empty `base_url` falls back to the local default.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ModelError> {
        let mut base_url: String = base_url.into();
        if base_url.is_empty() {
            base_url = DEFAULT_BASE_URL.to_string();
        }
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn to_ollama_request(request: &ChatRequest) -> OllamaChatRequest<'_> {
        OllamaChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            format: request.format.as_ref(),
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }

    fn to_chat_response(response: OllamaChatResponse) -> ChatResponse {
        let prompt_tokens = response.prompt_eval_count.unwrap_or(0);
        let completion_tokens = response.eval_count.unwrap_or(0);

        ChatResponse {
            model: response.model,
            created: parse_created_at(&response.created_at),
            choices: vec![Choice {
                index: 0,
                message: response.message,
                finish_reason: response.done_reason.unwrap_or_else(|| "stop".to_string()),
            }],
            usage: Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens.saturating_add(completion_tokens),
            },
        }
    }
}

#[async_trait]
impl Model for OllamaModel {
    async fn generate_content(&self, request: &ChatRequest) -> Result<ChatResponse, ModelError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = Self::to_ollama_request(request);

        log::debug!(
            "Ollama request: model={} messages={}",
            request.model,
            request.messages.len()
        );

        let resp = self.client.post(&url).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let ollama_response: OllamaChatResponse = resp.json().await.map_err(|e| {
            ModelError::invalid_response(format!("Failed to parse Ollama response: {}", e))
        })?;
        log::debug!("Ollama response: {:?}", ollama_response);

        Ok(Self::to_chat_response(ollama_response))
    }
}

/// RFC 3339 timestamp to unix seconds, or now when it does not parse
fn parse_created_at(created_at: &str) -> i64 {
    DateTime::parse_from_rfc3339(created_at)
        .map(|t| t.timestamp())
        .unwrap_or_else(|_| Utc::now().timestamp())
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a serde_json::Value>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    model: String,
    #[serde(default)]
    created_at: String,
    message: Message,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}
