//! Request and response types of the bridge surface.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::mcp::ToolDescriptor;

/// A worked example of calling a tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UsageExample {
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub description: String,
}

/// Usage guidance derived for a cached tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub examples: Vec<UsageExample>,
    pub related_tools: BTreeSet<String>,
    pub category: String,
}

/// A cached tool annotated with its category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveredTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub category: String,
}

impl DiscoveredTool {
    pub fn from_descriptor(descriptor: &ToolDescriptor, category: impl Into<String>) -> Self {
        Self {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            input_schema: descriptor.input_schema.clone(),
            category: category.into(),
        }
    }
}

/// Filter and pagination for `discover`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolFilter {
    /// Case-insensitive substring matched against name and description.
    pub query: Option<String>,
    /// Case-insensitive exact category name.
    pub category: Option<String>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

impl ToolFilter {
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Default::default()
        }
    }

    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Default::default()
        }
    }
}

/// How the caller judged an interaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Feedback {
    Positive,
    Negative,
    #[default]
    Neutral,
}

/// The tool invocation an interaction was about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub tool_name: String,
    pub parameters: Value,
}

impl ToolCall {
    pub fn new(tool_name: impl Into<String>, parameters: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters,
        }
    }
}

/// One remembered interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionRecord {
    pub id: Uuid,
    pub user_intent: String,
    pub tool_call: ToolCall,
    pub result: Value,
    pub feedback: Feedback,
    pub timestamp: DateTime<Utc>,
}

impl InteractionRecord {
    pub fn new(user_intent: impl Into<String>, tool_call: ToolCall, result: Value, feedback: Feedback) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_intent: user_intent.into(),
            tool_call,
            result,
            feedback,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExecutionContext {
    pub user_intent: Option<String>,
}

/// A request to run one tool through the bridge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecuteRequest {
    pub tool_name: String,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub context: ExecutionContext,
}

impl ExecuteRequest {
    pub fn new(tool_name: impl Into<String>, parameters: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters,
            context: ExecutionContext::default(),
        }
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.context.user_intent = Some(intent.into());
        self
    }
}

/// Outcome of `execute`. Failures are reported here rather than as errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub suggestions: Vec<String>,
    pub parameters_used: Value,
    pub optimized: bool,
    pub execution_time_ms: u64,
}

/// Ranked tools returned by `search`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolSearchResult {
    pub tools: Vec<DiscoveredTool>,
    pub confidence_scores: HashMap<String, f64>,
}

impl ToolSearchResult {
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name.as_str()).collect()
    }
}
