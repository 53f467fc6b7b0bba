//! Advisory providers: the free-text capability used for enrichment and optimization.
//!
//! The bridge only ever sees [`AdvisoryProvider::generate`]. Which implementation
//! backs it is decided once, from configuration, by [`create_advisor`].

pub mod http;
pub mod local;
pub mod mock;
pub mod openai_compatible;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{AdvisoryConfig, AdvisoryKind};
use crate::error::BridgeError;

pub use local::LocalEndpointAdvisor;
pub use mock::MockAdvisor;
pub use openai_compatible::OpenAiCompatibleAdvisor;

/// Turns a prompt into free text. Output quality is not part of the contract.
#[async_trait]
pub trait AdvisoryProvider: Send + Sync {
    /// Provider name used in logs and errors.
    fn provider_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, BridgeError>;
}

/// Build the advisor selected by `config.kind`.
pub fn create_advisor(config: &AdvisoryConfig) -> Result<Arc<dyn AdvisoryProvider>, BridgeError> {
    match config.kind {
        AdvisoryKind::Mock => Ok(Arc::new(MockAdvisor::new())),
        AdvisoryKind::OpenAiCompatible => Ok(Arc::new(OpenAiCompatibleAdvisor::new(config))),
        AdvisoryKind::Local => Ok(Arc::new(LocalEndpointAdvisor::new(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_advisor_follows_configured_kind() {
        let mut config = AdvisoryConfig::default();
        assert_eq!(create_advisor(&config).unwrap().provider_name(), "mock");

        config.kind = AdvisoryKind::OpenAiCompatible;
        assert_eq!(
            create_advisor(&config).unwrap().provider_name(),
            "openai-compatible"
        );

        config.kind = AdvisoryKind::Local;
        config.base_url = Some("http://localhost:5000/generate".into());
        assert_eq!(create_advisor(&config).unwrap().provider_name(), "local");
    }

    #[test]
    fn local_advisor_requires_an_endpoint() {
        let config = AdvisoryConfig {
            kind: AdvisoryKind::Local,
            ..Default::default()
        };
        assert!(matches!(
            create_advisor(&config),
            Err(BridgeError::Configuration(_))
        ));
    }
}
