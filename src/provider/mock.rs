//! Canned-output advisor for tests and offline use.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::BridgeError;

use super::AdvisoryProvider;

const DEFAULT_RESPONSE: &str = "No advice available.";

/// Returns queued responses in order, then a fixed default.
///
/// Every prompt is recorded so tests can assert on what the bridge asked.
pub struct MockAdvisor {
    queued: Mutex<VecDeque<Result<String, String>>>,
    default_response: String,
    prompts: Mutex<Vec<String>>,
}

impl MockAdvisor {
    pub fn new() -> Self {
        Self::with_default(DEFAULT_RESPONSE)
    }

    pub fn with_default(text: impl Into<String>) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            default_response: text.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a text response.
    pub fn queue_response(&self, text: impl Into<String>) {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Ok(text.into()));
    }

    /// Queue a provider failure.
    pub fn queue_error(&self, message: impl Into<String>) {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(message.into()));
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Default for MockAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AdvisoryProvider for MockAdvisor {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, prompt: &str) -> Result<String, BridgeError> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());

        let next = self
            .queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(BridgeError::Advisory {
                provider: "mock".into(),
                message,
            }),
            None => Ok(self.default_response.clone()),
        }
    }
}
