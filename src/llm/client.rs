use super::{ChatMessage, LLMResponse, LLM};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::Config;

/// Client for any OpenAI-compatible chat completions endpoint.
pub struct ChatCompletionsClient {
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

impl ChatCompletionsClient {
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = Url::parse(&config.openai.api_endpoint)
            .map_err(|e| anyhow!("invalid chat endpoint '{}': {}", config.openai.api_endpoint, e))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request.timeout))
            .build()?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            api_key: config.openai.api_key.clone(),
            model: config.openai.model.clone(),
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
            client,
        })
    }
}

#[async_trait]
impl LLM for ChatCompletionsClient {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LLMResponse> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!("Sending chat request to {}", self.endpoint);

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if !self.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("chat endpoint error {}: {}", status, text));
        }

        let chat_response: ChatResponse = response.json().await?;

        let content = chat_response
            .choices
            .first()
            .ok_or_else(|| anyhow!("chat endpoint returned no choices"))?
            .message
            .content
            .clone();

        let tokens_used = chat_response.usage.map(|u| u.total_tokens);

        Ok(LLMResponse {
            content,
            tokens_used,
        })
    }
}
