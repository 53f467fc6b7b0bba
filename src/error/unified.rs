//! Error classification and recovery hints.

use serde::{Deserialize, Serialize};

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Transport,
    Timeout,
    Protocol,
    ToolNotFound,
    Remote,
    Authentication,
    RateLimit,
    Network,
    Server,
    Api,
    Configuration,
    Serialization,
    Unknown,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    Reconnect,
    IncreaseTimeout,
    RefreshTools,
    CheckParameters,
    CheckCredentials,
    CheckConfiguration,
    ContactSupport,
}

impl RecoverySuggestion {
    /// One-line, caller-facing description of the action.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::RetryWithBackoff => "Retry the call after a short delay",
            Self::Reconnect => "Reconnect to the tool server; the connection is no longer usable",
            Self::IncreaseTimeout => "Increase the request timeout or simplify the call",
            Self::RefreshTools => "Refresh the tool list; the tool may have been renamed or removed",
            Self::CheckParameters => "Check the parameter values the tool server rejected",
            Self::CheckCredentials => "Check the configured credentials",
            Self::CheckConfiguration => "Check the bridge configuration",
            Self::ContactSupport => "Inspect the tool server logs for details",
        }
    }
}
