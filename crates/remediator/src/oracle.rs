//! Chat-completion oracle.
//!
//! Any OpenAI-compatible endpoint works. The oracle is text in, text out:
//! one system instruction, one user prompt, first choice back.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::OracleError;

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.siliconflow.cn/v1";

/// Default model
pub const DEFAULT_MODEL: &str = "Qwen/Qwen2.5-72B-Instruct";

/// A text-in/text-out reasoning backend.
#[async_trait]
pub trait ChatOracle: Send + Sync {
    /// Send a two-turn exchange and return the raw text of the first choice.
    async fn complete(&self, system: &str, user: &str) -> Result<String, OracleError>;
}

/// Connection settings for [`OpenAiOracle`].
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

/// Chat oracle speaking the OpenAI chat-completions protocol.
pub struct OpenAiOracle {
    client: Client,
    config: OracleConfig,
}

impl OpenAiOracle {
    pub fn new(config: OracleConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ChatOracle for OpenAiOracle {
    async fn complete(&self, system: &str, user: &str) -> Result<String, OracleError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        debug!(model = %self.config.model, prompt_len = user.len(), "Sending chat completion");

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleError::Unavailable(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OracleError::Unavailable(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(OracleError::Unavailable(format!(
                    "API error ({status}): {}",
                    error_response.error.message
                )));
            }
            return Err(OracleError::Unavailable(format!(
                "API error ({status}): {body}"
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| OracleError::Unavailable(format!("failed to parse response: {e}")))?;

        let first = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(OracleError::EmptyResponse)?;

        Ok(first.message.content.unwrap_or_default())
    }
}
