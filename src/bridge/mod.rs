//! The tool bridge: cached discovery, advisor-enriched usage, and execution.
//!
//! [`ToolBridge`] sits between a caller and one MCP server. It caches the
//! server's tool list, derives usage guidance through an
//! [`AdvisoryProvider`], optionally rewrites call parameters from past
//! successful interactions, and keeps a bounded interaction history.
//!
//! Advisory failures never surface to callers; every advisor-backed
//! operation has a deterministic fallback.

pub mod category;
pub mod history;
pub mod parse;
mod prompts;
pub mod refresh;
pub mod types;

#[cfg(test)]
mod tests;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BridgeSettings;
use crate::error::{BridgeError, RecoverySuggestion, Result};
use crate::mcp::{MCPClient, ToolCallResult, ToolDescriptor};
use crate::provider::AdvisoryProvider;

pub use category::{categorize, DEFAULT_CATEGORY};
pub use history::InteractionHistory;
pub use parse::{parse_advisory, Parsed};
pub use refresh::spawn_refresher;
pub use types::{
    DiscoveredTool, ExecuteRequest, ExecutionContext, ExecutionResult, Feedback,
    InteractionRecord, ToolCall, ToolFilter, ToolSearchResult, UsageExample, UsageInfo,
};

/// Confidence given to every tool when the whole cache fits in the result.
const FULL_MATCH_CONFIDENCE: f64 = 1.0;
/// Confidence for tools the advisor did not rank.
const UNRANKED_CONFIDENCE: f64 = 0.5;
/// Search results scoring below this are dropped unless the caller says otherwise.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.1;

/// The two server operations the bridge depends on.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult>;
}

#[async_trait]
impl ToolTransport for MCPClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        MCPClient::list_tools(self).await
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        MCPClient::call_tool(self, name, arguments).await
    }
}

struct BridgeState {
    tools: HashMap<String, ToolDescriptor>,
    /// Tool names in the order the server listed them.
    order: Vec<String>,
    usage: HashMap<String, UsageInfo>,
    history: InteractionHistory,
}

impl BridgeState {
    fn ordered(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }
}

/// Caching, history-aware front for one tool server.
pub struct ToolBridge {
    transport: Arc<dyn ToolTransport>,
    advisor: Arc<dyn AdvisoryProvider>,
    settings: BridgeSettings,
    state: Mutex<BridgeState>,
}

impl ToolBridge {
    pub fn new(
        transport: Arc<dyn ToolTransport>,
        advisor: Arc<dyn AdvisoryProvider>,
        settings: BridgeSettings,
    ) -> Self {
        let history = InteractionHistory::new(settings.history_capacity);
        Self {
            transport,
            advisor,
            settings,
            state: Mutex::new(BridgeState {
                tools: HashMap::new(),
                order: Vec::new(),
                usage: HashMap::new(),
                history,
            }),
        }
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    pub fn advisor_name(&self) -> &str {
        self.advisor.provider_name()
    }

    /// Replace the tool cache with the server's current listing.
    ///
    /// Usage entries survive only for tools whose descriptor is unchanged.
    /// Returns the number of cached tools.
    pub async fn refresh_tools(&self) -> Result<usize> {
        let listed = self.transport.list_tools().await?;

        let mut tools = HashMap::with_capacity(listed.len());
        let mut order = Vec::with_capacity(listed.len());
        for descriptor in listed {
            if !tools.contains_key(&descriptor.name) {
                order.push(descriptor.name.clone());
            } else {
                warn!(tool = %descriptor.name, "server listed tool twice; keeping the later descriptor");
            }
            tools.insert(descriptor.name.clone(), descriptor);
        }

        let mut state = self.state.lock().await;
        let before = state.usage.len();
        state.usage.retain(|name, info| {
            tools.get(name).is_some_and(|tool| {
                tool.description == info.description && tool.input_schema == info.input_schema
            })
        });
        let invalidated = before - state.usage.len();
        state.tools = tools;
        state.order = order;

        let count = state.order.len();
        info!(tools = count, invalidated_usage = invalidated, "tool cache refreshed");
        Ok(count)
    }

    /// Cached tools in server order, filtered and paginated.
    pub async fn discover(&self, filter: &ToolFilter) -> Result<Vec<DiscoveredTool>> {
        let category = match filter.category.as_deref().map(str::trim) {
            Some(wanted) => Some(
                category::known_categories()
                    .into_iter()
                    .find(|known| known.eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| {
                        BridgeError::InvalidArgument(format!("unknown category '{wanted}'"))
                    })?,
            ),
            None => None,
        };
        let query = filter
            .query
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());

        let state = self.state.lock().await;
        let limit = filter.limit.unwrap_or(usize::MAX);
        let tools = state
            .ordered()
            .filter(|tool| {
                query.as_deref().map_or(true, |q| {
                    tool.name.to_lowercase().contains(q) || tool.description.to_lowercase().contains(q)
                })
            })
            .map(|tool| DiscoveredTool::from_descriptor(tool, categorize(&tool.name, &tool.description)))
            .filter(|tool| category.map_or(true, |c| tool.category == c))
            .skip(filter.offset)
            .take(limit)
            .collect();
        Ok(tools)
    }

    pub async fn get_tool(&self, name: &str) -> Result<ToolDescriptor> {
        self.state
            .lock()
            .await
            .tools
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::ToolNotFound(name.to_string()))
    }

    pub async fn cached_tool_count(&self) -> usize {
        self.state.lock().await.order.len()
    }

    /// Usage guidance for a cached tool, generated once and memoized.
    pub async fn usage(&self, name: &str) -> Result<UsageInfo> {
        let (descriptor, others) = {
            let state = self.state.lock().await;
            if let Some(info) = state.usage.get(name) {
                return Ok(info.clone());
            }
            let descriptor = state
                .tools
                .get(name)
                .cloned()
                .ok_or_else(|| BridgeError::ToolNotFound(name.to_string()))?;
            let others: Vec<String> = state
                .order
                .iter()
                .filter(|other| other.as_str() != name)
                .cloned()
                .collect();
            (descriptor, others)
        };

        let other_refs: Vec<&str> = others.iter().map(String::as_str).collect();
        let prompt = prompts::usage_prompt(&descriptor, &other_refs);
        let advice = match self.advisor.generate(&prompt).await {
            Ok(text) => parse_advisory::<UsageAdvice>(&text),
            Err(e) => {
                warn!(tool = %name, error = %e, "usage advice failed; using fallback");
                Parsed::Fallback
            }
        };

        let mut state = self.state.lock().await;
        let mut info = match advice {
            Parsed::Parsed(advice) => UsageInfo {
                name: descriptor.name.clone(),
                description: descriptor.description.clone(),
                input_schema: descriptor.input_schema.clone(),
                examples: advice.examples,
                related_tools: advice.related_tools.into_iter().collect(),
                category: advice
                    .category
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| categorize(&descriptor.name, &descriptor.description).to_string()),
            },
            Parsed::Fallback => {
                debug!(tool = %name, "usage advice unparseable; using fallback");
                fallback_usage(&descriptor)
            }
        };
        info.related_tools
            .retain(|related| related != name && state.tools.contains_key(related));

        if state.tools.get(name) == Some(&descriptor) {
            state.usage.insert(name.to_string(), info.clone());
        } else {
            debug!(tool = %name, "tool changed while generating usage; not caching");
        }
        Ok(info)
    }

    /// Run a tool. Failures are reported in the returned [`ExecutionResult`].
    pub async fn execute(&self, request: ExecuteRequest) -> ExecutionResult {
        let started = Instant::now();
        let ExecuteRequest {
            tool_name,
            parameters,
            context,
        } = request;

        let (parameters, optimized) = self
            .optimize_parameters(&tool_name, parameters, context.user_intent.as_deref())
            .await;

        let outcome = self.transport.call_tool(&tool_name, parameters.clone()).await;
        let execution_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(result) if !result.is_error => {
                debug!(tool = %tool_name, elapsed_ms = execution_time_ms, "tool call succeeded");
                ExecutionResult {
                    success: true,
                    result: Some(result.into_value_or_text()),
                    error: None,
                    suggestions: self.related_suggestions(&tool_name).await,
                    parameters_used: parameters,
                    optimized,
                    execution_time_ms,
                }
            }
            Ok(result) => {
                let message = result
                    .text()
                    .unwrap_or_else(|| format!("tool '{tool_name}' reported an error"));
                warn!(tool = %tool_name, error = %message, "tool reported an error");
                ExecutionResult {
                    success: false,
                    result: Some(result.into_value_or_text()),
                    error: Some(message.clone()),
                    suggestions: remediation(
                        &tool_name,
                        &message,
                        RecoverySuggestion::CheckParameters,
                    ),
                    parameters_used: parameters,
                    optimized,
                    execution_time_ms,
                }
            }
            Err(e) => {
                warn!(tool = %tool_name, error = %e, "tool call failed");
                let message = e.to_string();
                ExecutionResult {
                    success: false,
                    result: None,
                    suggestions: remediation(&tool_name, &message, e.recovery_suggestion()),
                    error: Some(message),
                    parameters_used: parameters,
                    optimized,
                    execution_time_ms,
                }
            }
        }
    }

    /// Append an interaction to the history, evicting the oldest when full.
    pub async fn record(
        &self,
        user_intent: impl Into<String>,
        tool_call: ToolCall,
        result: Value,
        feedback: Feedback,
    ) -> Uuid {
        let record = InteractionRecord::new(user_intent, tool_call, result, feedback);
        let id = record.id;
        let mut state = self.state.lock().await;
        if let Some(evicted) = state.history.push(record) {
            debug!(evicted = %evicted.id, "history full; evicted oldest record");
        }
        id
    }

    /// Snapshot of the history, oldest first.
    pub async fn history(&self) -> Vec<InteractionRecord> {
        self.state.lock().await.history.snapshot()
    }

    /// Rank cached tools against a free-text query, keeping scores of at
    /// least `min_confidence`.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        min_confidence: f64,
    ) -> Result<ToolSearchResult> {
        let query = query.trim();
        if query.is_empty() {
            return Err(BridgeError::InvalidArgument("search query must not be empty".into()));
        }
        if limit == 0 {
            return Err(BridgeError::InvalidArgument("search limit must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(BridgeError::InvalidArgument(format!(
                "min_confidence must be within 0.0..=1.0; got {min_confidence}"
            )));
        }

        let tools: Vec<ToolDescriptor> = self.state.lock().await.ordered().cloned().collect();
        if tools.len() <= limit {
            return Ok(build_search_result(
                tools.iter().map(|tool| (tool, FULL_MATCH_CONFIDENCE)),
                min_confidence,
            ));
        }

        let refs: Vec<&ToolDescriptor> = tools.iter().collect();
        let prompt = prompts::search_prompt(query, &refs, limit);
        let ranking = match self.advisor.generate(&prompt).await {
            Ok(text) => parse_advisory::<Vec<Ranking>>(&text),
            Err(e) => {
                warn!(error = %e, "search ranking failed; using substring scoring");
                Parsed::Fallback
            }
        };

        let ranked = match ranking {
            Parsed::Parsed(ranking) => ranked_tools(&tools, ranking, limit),
            Parsed::Fallback => Vec::new(),
        };
        if ranked.is_empty() {
            debug!(query = %query, "no usable ranking; using substring scoring");
            return Ok(build_search_result(
                substring_scores(&tools, query, limit),
                min_confidence,
            ));
        }
        Ok(build_search_result(ranked, min_confidence))
    }

    async fn optimize_parameters(
        &self,
        tool_name: &str,
        parameters: Value,
        user_intent: Option<&str>,
    ) -> (Value, bool) {
        if !self.settings.optimize_parameters {
            return (parameters, false);
        }

        let (descriptor, precedents) = {
            let state = self.state.lock().await;
            let Some(descriptor) = state.tools.get(tool_name).cloned() else {
                return (parameters, false);
            };
            let precedents = state
                .history
                .positive_precedents(tool_name, self.settings.precedent_limit);
            (descriptor, precedents)
        };

        let prompt = prompts::optimize_prompt(&descriptor, &parameters, user_intent, &precedents);
        let text = match self.advisor.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(tool = %tool_name, error = %e, "parameter optimization failed");
                return (parameters, false);
            }
        };

        match parse_advisory::<Value>(&text) {
            Parsed::Parsed(candidate @ Value::Object(_)) => {
                let optimized = candidate != parameters;
                if optimized {
                    debug!(tool = %tool_name, "using optimized parameters");
                }
                (candidate, optimized)
            }
            _ => {
                debug!(tool = %tool_name, "optimizer returned no parameter object");
                (parameters, false)
            }
        }
    }

    async fn related_suggestions(&self, tool_name: &str) -> Vec<String> {
        let state = self.state.lock().await;
        let own_category = state
            .tools
            .get(tool_name)
            .map(|tool| categorize(&tool.name, &tool.description));

        let mut candidates: Vec<&ToolDescriptor> =
            state.ordered().filter(|tool| tool.name != tool_name).collect();
        // Stable sort keeps server order within each group.
        candidates.sort_by_key(|tool| Some(categorize(&tool.name, &tool.description)) != own_category);

        candidates
            .into_iter()
            .take(self.settings.max_suggestions)
            .map(|tool| {
                if tool.description.is_empty() {
                    format!("Consider {}", tool.name)
                } else {
                    format!("Consider {} for {}", tool.name, tool.description)
                }
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct UsageAdvice {
    #[serde(default)]
    examples: Vec<UsageExample>,
    #[serde(default, rename = "relatedTools", alias = "related_tools")]
    related_tools: Vec<String>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Deserialize)]
struct Ranking {
    name: String,
    confidence: f64,
}

fn fallback_usage(tool: &ToolDescriptor) -> UsageInfo {
    UsageInfo {
        name: tool.name.clone(),
        description: tool.description.clone(),
        input_schema: tool.input_schema.clone(),
        examples: Vec::new(),
        related_tools: BTreeSet::new(),
        category: DEFAULT_CATEGORY.to_string(),
    }
}

fn remediation(tool_name: &str, message: &str, suggestion: RecoverySuggestion) -> Vec<String> {
    let mut steps = vec![
        "Verify the parameters match the tool's input schema".to_string(),
        "Verify all required fields are present".to_string(),
        format!("Consult the usage info for {tool_name}"),
        format!("Error: {message}"),
    ];
    let hint = suggestion.hint().to_string();
    if !steps.contains(&hint) {
        steps.push(hint);
    }
    steps
}

/// Known, de-duplicated advisor rankings padded with unranked tools.
fn ranked_tools<'a>(
    tools: &'a [ToolDescriptor],
    ranking: Vec<Ranking>,
    limit: usize,
) -> Vec<(&'a ToolDescriptor, f64)> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<(&ToolDescriptor, f64)> = ranking
        .into_iter()
        .filter_map(|entry| {
            let tool = tools.iter().find(|tool| tool.name == entry.name)?;
            seen.insert(tool.name.as_str()).then(|| {
                let confidence = if entry.confidence.is_finite() {
                    entry.confidence.clamp(0.0, 1.0)
                } else {
                    UNRANKED_CONFIDENCE
                };
                (tool, confidence)
            })
        })
        .take(limit)
        .collect();

    if ranked.is_empty() {
        return ranked;
    }
    for tool in tools {
        if ranked.len() >= limit {
            break;
        }
        if !seen.contains(tool.name.as_str()) {
            ranked.push((tool, UNRANKED_CONFIDENCE));
        }
    }
    ranked
}

/// Score name (0.6), description (0.3) and property descriptions (0.1) by substring.
fn substring_scores<'a>(
    tools: &'a [ToolDescriptor],
    query: &str,
    limit: usize,
) -> Vec<(&'a ToolDescriptor, f64)> {
    let query = query.to_lowercase();
    let mut scored: Vec<(&ToolDescriptor, f64)> = tools
        .iter()
        .filter_map(|tool| {
            let mut score = 0.0;
            if tool.name.to_lowercase().contains(&query) {
                score += 0.6;
            }
            if tool.description.to_lowercase().contains(&query) {
                score += 0.3;
            }
            if tool
                .property_descriptions()
                .iter()
                .any(|(_, description)| description.to_lowercase().contains(&query))
            {
                score += 0.1;
            }
            (score > 0.0).then_some((tool, score))
        })
        .collect();
    // Stable sort: ties stay in server order.
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(limit);
    scored
}

fn build_search_result<'a>(
    scored: impl IntoIterator<Item = (&'a ToolDescriptor, f64)>,
    min_confidence: f64,
) -> ToolSearchResult {
    let mut result = ToolSearchResult::default();
    for (tool, confidence) in scored.into_iter().filter(|(_, c)| *c >= min_confidence) {
        result.confidence_scores.insert(tool.name.clone(), confidence);
        result
            .tools
            .push(DiscoveredTool::from_descriptor(tool, categorize(&tool.name, &tool.description)));
    }
    result
}
