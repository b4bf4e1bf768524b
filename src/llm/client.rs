//! Async HTTP client for the planning model
//!
//! Talks to either the Anthropic messages API or any OpenAI-compatible chat
//! endpoint (DeepSeek, vLLM, llama.cpp server). Transport and HTTP errors map
//! to `ArmError::Llm`; a reply with no text maps to `ArmError::ModelOutput`
//! so the replanning loop can ask again.

use crate::core::config::LlmConfig;
use crate::core::error::{ArmError, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Wire format of the completion endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFormat {
    Anthropic,
    OpenAI,
}

impl ApiFormat {
    /// anthropic.com endpoints speak the messages API, everything else chat completions
    pub fn detect(url: &str) -> Self {
        if url.contains("anthropic.com") {
            ApiFormat::Anthropic
        } else {
            ApiFormat::OpenAI
        }
    }
}

pub struct LlmClient {
    http: Client,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: u32,
    format: ApiFormat,
}

impl LlmClient {
    pub fn new(api_key: String, config: &LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ArmError::Llm(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            format: ApiFormat::detect(&config.api_url),
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    /// Build from configuration plus environment
    ///
    /// `LLM_API_KEY` is required. `LLM_API_URL` and `LLM_MODEL` override the
    /// configured endpoint and model.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("LLM_API_KEY")
            .map_err(|_| ArmError::Llm("LLM_API_KEY not set".into()))?;

        let mut config = config.clone();
        if let Ok(url) = std::env::var("LLM_API_URL") {
            config.api_url = url;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.model = model;
        }
        Self::new(api_key, &config)
    }

    pub fn from_env() -> Result<Self> {
        Self::from_config(&LlmConfig::default())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn api_format(&self) -> ApiFormat {
        self.format
    }

    /// One completion; returns the reply text, trimmed
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let text = match self.format {
            ApiFormat::Anthropic => {
                let body = AnthropicRequest {
                    model: &self.model,
                    max_tokens: self.max_tokens,
                    system,
                    messages: vec![Message { role: "user", content: user }],
                };
                let request = self
                    .http
                    .post(&self.api_url)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION);
                let reply: AnthropicResponse = send(request, &body).await?;
                reply
                    .content
                    .into_iter()
                    .filter_map(|block| block.text)
                    .collect::<Vec<_>>()
                    .join("")
            }
            ApiFormat::OpenAI => {
                let body = OpenAIRequest {
                    model: &self.model,
                    max_tokens: self.max_tokens,
                    temperature: 0.0,
                    messages: vec![
                        Message { role: "system", content: system },
                        Message { role: "user", content: user },
                    ],
                };
                let request = self.http.post(&self.api_url).bearer_auth(&self.api_key);
                let reply: OpenAIResponse = send(request, &body).await?;
                reply
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .unwrap_or_default()
            }
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(ArmError::ModelOutput("empty completion".into()));
        }
        Ok(text.to_string())
    }
}

/// POST a JSON body and decode the JSON reply
async fn send<B: Serialize, R: DeserializeOwned>(request: RequestBuilder, body: &B) -> Result<R> {
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| ArmError::Llm(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(ArmError::Llm(format!("API error {}: {}", status, detail)));
    }

    response
        .json()
        .await
        .map_err(|e| ArmError::Llm(format!("undecodable API reply: {}", e)))
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

/// Non-text blocks carry no `text`
#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
