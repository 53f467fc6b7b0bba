//! Advisor for a bare local generation endpoint: `POST {prompt} -> {text}`.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::AdvisoryConfig;
use crate::error::BridgeError;
use crate::util::retry::RetryPolicy;

use super::http::{json_headers, shared_client, status_to_error};
use super::AdvisoryProvider;

pub struct LocalEndpointAdvisor {
    endpoint: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f64,
    retry_policy: RetryPolicy,
}

impl LocalEndpointAdvisor {
    /// Requires `config.base_url`, the full URL of the generate endpoint.
    pub fn new(config: &AdvisoryConfig) -> Result<Self, BridgeError> {
        let endpoint = config.base_url.clone().ok_or_else(|| {
            BridgeError::Configuration("advisor.base_url is required for the local advisor".into())
        })?;
        Ok(Self {
            endpoint,
            api_key: config.api_key.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            retry_policy: RetryPolicy::from_config(config),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    async fn post(&self, body: &serde_json::Value) -> Result<String, BridgeError> {
        let resp = shared_client()
            .post(&self.endpoint)
            .headers(json_headers(self.api_key.as_deref()))
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let data: GenerateResponse = resp.json().await?;
        Ok(data.text.trim().to_string())
    }
}

#[async_trait]
impl AdvisoryProvider for LocalEndpointAdvisor {
    fn provider_name(&self) -> &str {
        "local"
    }

    async fn generate(&self, prompt: &str) -> Result<String, BridgeError> {
        let body = serde_json::json!({
            "prompt": prompt,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });
        debug!(endpoint = %self.endpoint, prompt_len = prompt.len(), "advisor generate");
        self.retry_policy
            .execute(self.provider_name(), || self.post(&body))
            .await
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    text: String,
}
