//! Advisor backed by any OpenAI-compatible Chat Completions endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::AdvisoryConfig;
use crate::error::BridgeError;
use crate::util::retry::RetryPolicy;

use super::http::{json_headers, shared_client, status_to_error};
use super::AdvisoryProvider;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const SYSTEM_PROMPT: &str =
    "You assist a program that calls tools on behalf of users. Answer with JSON only, no prose.";

/// Works with OpenAI, Ollama (`/v1`), LM Studio, vLLM and similar servers.
pub struct OpenAiCompatibleAdvisor {
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f64,
    retry_policy: RetryPolicy,
}

impl OpenAiCompatibleAdvisor {
    pub fn new(config: &AdvisoryConfig) -> Self {
        Self {
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            retry_policy: RetryPolicy::from_config(config),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    async fn complete(&self, body: &serde_json::Value) -> Result<String, BridgeError> {
        let url = format!("{}/chat/completions", self.base_url);
        let resp = shared_client()
            .post(&url)
            .headers(json_headers(self.api_key.as_deref()))
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let data: ChatResponse = resp.json().await?;
        data.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| BridgeError::Advisory {
                provider: self.provider_name().to_string(),
                message: "response contained no message content".into(),
            })
    }
}

#[async_trait]
impl AdvisoryProvider for OpenAiCompatibleAdvisor {
    fn provider_name(&self) -> &str {
        "openai-compatible"
    }

    async fn generate(&self, prompt: &str) -> Result<String, BridgeError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        debug!(model = %self.model, prompt_len = prompt.len(), "advisor generate");
        self.retry_policy
            .execute(self.provider_name(), || self.complete(&body))
            .await
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}
