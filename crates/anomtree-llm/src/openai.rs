//! OpenAI-compatible chat completions backend.
//!
//! Requires the `api` feature and an API key (`OPENAI_API_KEY`).

use crate::backend::{LlmBackend, LlmConfig, LlmError, LlmResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions backend for OpenAI and compatible endpoints.
///
/// ```rust,ignore
/// use anomtree_llm::{LlmBackend, OpenAiBackend};
///
/// let backend = OpenAiBackend::from_env()?.with_model("gpt-4.1-mini");
/// let reply = backend.complete("Route: ?").await?;
/// ```
pub struct OpenAiBackend {
    api_key: String,
    config: LlmConfig,
    client: reqwest::Client,
    endpoint: String,
}

impl OpenAiBackend {
    pub fn new(api_key: &str) -> Self {
        Self::with_config(api_key, LlmConfig::openai())
    }

    pub fn with_config(api_key: &str, config: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(u64::from(config.timeout_secs)))
            .build()
            .unwrap_or_default();

        Self {
            api_key: api_key.to_string(),
            config,
            client,
            endpoint: OPENAI_API_URL.to_string(),
        }
    }

    /// Read the key from `OPENAI_API_KEY`.
    pub fn from_env() -> LlmResult<Self> {
        Self::from_env_with_config(LlmConfig::openai())
    }

    pub fn from_env_with_config(config: LlmConfig) -> LlmResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| LlmError::AuthenticationFailed)?;
        Ok(Self::with_config(&api_key, config))
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }

    /// Use a custom endpoint (Azure OpenAI or a compatible gateway).
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    async fn request(&self, prompt: &str, system: Option<&str>) -> LlmResult<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system {
            messages.push(ChatMessage {
                role: "system",
                content: sys,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request = ChatRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::ConnectionFailed(format!("Cannot connect to {}", self.endpoint))
                } else if e.is_timeout() {
                    LlmError::Timeout(self.config.timeout_secs)
                } else {
                    LlmError::ApiError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => LlmError::AuthenticationFailed,
                404 => LlmError::ModelNotFound(self.config.model.clone()),
                429 => LlmError::RateLimited(60),
                _ => LlmError::ApiError(format!("OpenAI API error {status}: {body}")),
            });
        }

        let resp: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("No content in response".to_string()))
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn complete(&self, prompt: &str) -> LlmResult<String> {
        self.request(prompt, None).await
    }

    async fn complete_with_system(&self, prompt: &str, system: Option<&str>) -> LlmResult<String> {
        self.request(prompt, system).await
    }
}
