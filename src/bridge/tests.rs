use std::sync::Mutex as StdMutex;

use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;
use crate::error::METHOD_NOT_FOUND;
use crate::mcp::ToolContent;
use crate::provider::MockAdvisor;

struct FakeTransport {
    tools: StdMutex<Vec<ToolDescriptor>>,
    calls: StdMutex<Vec<(String, Value)>>,
}

impl FakeTransport {
    fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools: StdMutex::new(tools),
            calls: StdMutex::new(Vec::new()),
        }
    }

    fn set_tools(&self, tools: Vec<ToolDescriptor>) {
        *self.tools.lock().unwrap() = tools;
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolTransport for FakeTransport {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        Ok(self.tools.lock().unwrap().clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments.clone()));
        match name {
            "echo" => Ok(ToolCallResult {
                content: vec![ToolContent::text(format!(
                    "Echo: {}",
                    arguments["message"].as_str().unwrap_or_default()
                ))],
                ..Default::default()
            }),
            "add" => Ok(ToolCallResult {
                content: vec![ToolContent::text("bad input: a and b must be numbers")],
                is_error: true,
                ..Default::default()
            }),
            "web_fetch" => Err(BridgeError::Timeout(30_000)),
            _ => Err(BridgeError::remote(METHOD_NOT_FOUND, "Unknown tool")),
        }
    }
}

fn tool(name: &str, description: &str, properties: Value) -> ToolDescriptor {
    ToolDescriptor::new(
        name,
        description,
        json!({ "type": "object", "properties": properties }),
    )
}

fn catalog() -> Vec<ToolDescriptor> {
    vec![
        tool(
            "echo",
            "Echo a message back",
            json!({ "message": { "type": "string", "description": "Text to echo" } }),
        ),
        tool(
            "read_file",
            "Read a file from disk",
            json!({ "path": { "type": "string", "description": "Path of the file to read" } }),
        ),
        tool(
            "write_file",
            "Write a file",
            json!({ "path": { "type": "string", "description": "Destination path" } }),
        ),
        tool("web_fetch", "Fetch a URL", json!({ "url": { "type": "string" } })),
        tool("notify", "Send a notification", json!({})),
        tool("add", "Adds two numbers", json!({ "a": {}, "b": {} })),
    ]
}

async fn bridge_with(
    settings: BridgeSettings,
) -> (ToolBridge, Arc<FakeTransport>, Arc<MockAdvisor>) {
    let transport = Arc::new(FakeTransport::new(catalog()));
    let advisor = Arc::new(MockAdvisor::new());
    let bridge = ToolBridge::new(transport.clone(), advisor.clone(), settings);
    bridge.refresh_tools().await.unwrap();
    (bridge, transport, advisor)
}

async fn bridge() -> (ToolBridge, Arc<FakeTransport>, Arc<MockAdvisor>) {
    bridge_with(BridgeSettings::default()).await
}

fn names(tools: &[DiscoveredTool]) -> Vec<&str> {
    tools.iter().map(|t| t.name.as_str()).collect()
}

#[tokio::test]
async fn discover_keeps_server_order_with_categories() {
    let (bridge, _, _) = bridge().await;

    let tools = bridge.discover(&ToolFilter::default()).await.unwrap();
    assert_eq!(
        names(&tools),
        ["echo", "read_file", "write_file", "web_fetch", "notify", "add"]
    );
    let categories: Vec<&str> = tools.iter().map(|t| t.category.as_str()).collect();
    assert_eq!(
        categories,
        ["Communication", "File System", "File System", "Network", "Communication", "Utility"]
    );
    assert_eq!(bridge.cached_tool_count().await, 6);
}

#[tokio::test]
async fn discover_filters_and_paginates() {
    let (bridge, _, _) = bridge().await;

    let by_query = bridge.discover(&ToolFilter::query("FILE")).await.unwrap();
    assert_eq!(names(&by_query), ["read_file", "write_file"]);

    let by_category = bridge
        .discover(&ToolFilter::category("communication"))
        .await
        .unwrap();
    assert_eq!(names(&by_category), ["echo", "notify"]);

    let page = bridge
        .discover(&ToolFilter {
            limit: Some(2),
            offset: 1,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(names(&page), ["read_file", "write_file"]);

    let err = bridge
        .discover(&ToolFilter::category("Astrology"))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::InvalidArgument(_)));
}

#[tokio::test]
async fn refresh_replaces_cache_and_keeps_first_position_for_duplicates() {
    let (bridge, transport, _) = bridge().await;

    transport.set_tools(vec![
        tool("b", "first b", json!({})),
        tool("a", "only a", json!({})),
        tool("b", "second b", json!({})),
    ]);
    assert_eq!(bridge.refresh_tools().await.unwrap(), 2);

    let tools = bridge.discover(&ToolFilter::default()).await.unwrap();
    assert_eq!(names(&tools), ["b", "a"]);
    assert_eq!(bridge.get_tool("b").await.unwrap().description, "second b");
    assert!(matches!(
        bridge.get_tool("echo").await,
        Err(BridgeError::ToolNotFound(name)) if name == "echo"
    ));
}

#[tokio::test]
async fn usage_is_memoized() {
    let (bridge, _, advisor) = bridge().await;
    advisor.queue_response(
        r#"{"examples": [{"input": {"message": "hi"}, "output": "Echo: hi", "description": "Greets"}],
            "relatedTools": ["notify", "echo", "ghost"], "category": "Communication"}"#,
    );

    let first = bridge.usage("echo").await.unwrap();
    let second = bridge.usage("echo").await.unwrap();

    assert_eq!(advisor.call_count(), 1);
    assert_eq!(first, second);
    assert_eq!(first.examples.len(), 1);
    assert_eq!(first.examples[0].input, json!({"message": "hi"}));
    assert_eq!(first.related_tools, BTreeSet::from(["notify".to_string()]));
    assert_eq!(first.category, "Communication");
    assert!(advisor.prompts()[0].contains("Name: echo"));
}

#[tokio::test]
async fn usage_of_unknown_tool_is_not_found() {
    let (bridge, _, advisor) = bridge().await;
    let err = bridge.usage("nope").await.unwrap_err();
    assert!(matches!(err, BridgeError::ToolNotFound(name) if name == "nope"));
    assert_eq!(advisor.call_count(), 0);
}

#[tokio::test]
async fn usage_falls_back_on_prose_or_advisor_error() {
    let (bridge, _, advisor) = bridge().await;
    advisor.queue_response("I would rather not say.");
    advisor.queue_error("connection refused");

    let prose = bridge.usage("read_file").await.unwrap();
    assert!(prose.examples.is_empty());
    assert!(prose.related_tools.is_empty());
    assert_eq!(prose.category, DEFAULT_CATEGORY);
    assert_eq!(prose.name, "read_file");

    let failed = bridge.usage("write_file").await.unwrap();
    assert_eq!(failed.category, DEFAULT_CATEGORY);
    assert_eq!(advisor.call_count(), 2);
}

#[tokio::test]
async fn parsed_usage_without_category_uses_rule_table() {
    let (bridge, _, advisor) = bridge().await;
    advisor.queue_response(r#"{"examples": []}"#);
    let info = bridge.usage("web_fetch").await.unwrap();
    assert_eq!(info.category, "Network");
}

#[tokio::test]
async fn refresh_invalidates_usage_of_changed_tools_only() {
    let (bridge, transport, advisor) = bridge().await;
    bridge.usage("echo").await.unwrap();
    bridge.usage("notify").await.unwrap();
    assert_eq!(advisor.call_count(), 2);

    let mut tools = catalog();
    tools[0].description = "Echo a message back, loudly".into();
    transport.set_tools(tools);
    bridge.refresh_tools().await.unwrap();

    let echo = bridge.usage("echo").await.unwrap();
    bridge.usage("notify").await.unwrap();
    assert_eq!(echo.description, "Echo a message back, loudly");
    assert_eq!(advisor.call_count(), 3);
}

#[tokio::test]
async fn execute_success_suggests_same_category_first() {
    let (bridge, transport, advisor) = bridge().await;

    let result = bridge
        .execute(ExecuteRequest::new("echo", json!({"message": "hi"})))
        .await;

    assert!(result.success);
    assert_eq!(result.result, Some(json!("Echo: hi")));
    assert_eq!(result.error, None);
    assert!(!result.optimized);
    assert_eq!(result.parameters_used, json!({"message": "hi"}));
    assert_eq!(
        result.suggestions,
        [
            "Consider notify for Send a notification",
            "Consider read_file for Read a file from disk",
            "Consider write_file for Write a file",
        ]
    );
    // Unparseable optimizer output leaves the call untouched.
    assert_eq!(advisor.call_count(), 1);
    assert_eq!(transport.calls(), [("echo".to_string(), json!({"message": "hi"}))]);
}

#[tokio::test]
async fn execute_uses_optimized_parameters_and_positive_precedents() {
    let (bridge, transport, advisor) = bridge().await;
    bridge
        .record(
            "greet politely",
            ToolCall::new("echo", json!({"message": "good morning"})),
            json!("Echo: good morning"),
            Feedback::Positive,
        )
        .await;
    bridge
        .record(
            "spam",
            ToolCall::new("echo", json!({"message": "buy now"})),
            json!("Echo: buy now"),
            Feedback::Negative,
        )
        .await;
    advisor.queue_response("```json\n{\"message\": \"hello there\"}\n```");

    let result = bridge
        .execute(ExecuteRequest::new("echo", json!({"message": "hi"})).with_intent("say hello"))
        .await;

    assert!(result.success);
    assert!(result.optimized);
    assert_eq!(result.parameters_used, json!({"message": "hello there"}));
    assert_eq!(result.result, Some(json!("Echo: hello there")));
    assert_eq!(transport.calls()[0].1, json!({"message": "hello there"}));

    let prompt = &advisor.prompts()[0];
    assert!(prompt.contains("say hello"));
    assert!(prompt.contains("good morning"));
    assert!(!prompt.contains("buy now"));
}

#[tokio::test]
async fn execute_skips_optimization_when_disabled_or_tool_unknown() {
    let settings = BridgeSettings {
        optimize_parameters: false,
        ..Default::default()
    };
    let (bridge, _, advisor) = bridge_with(settings).await;
    bridge
        .execute(ExecuteRequest::new("echo", json!({"message": "hi"})))
        .await;
    assert_eq!(advisor.call_count(), 0);

    let (bridge, _, advisor) = self::bridge().await;
    bridge.execute(ExecuteRequest::new("missing_tool", json!({}))).await;
    assert_eq!(advisor.call_count(), 0);
}

#[tokio::test]
async fn execute_reports_unknown_tool_with_remediation() {
    let (bridge, _, _) = bridge().await;

    let result = bridge.execute(ExecuteRequest::new("missing_tool", json!({}))).await;

    assert!(!result.success);
    assert_eq!(result.result, None);
    assert!(result.error.as_deref().unwrap().contains("Unknown tool"));
    assert_eq!(result.suggestions.len(), 5);
    assert!(result.suggestions[2].contains("missing_tool"));
    assert!(result.suggestions[3].starts_with("Error: "));
    assert!(result.suggestions[3].contains("Unknown tool"));
    assert_eq!(result.suggestions[4], RecoverySuggestion::RefreshTools.hint());
}

#[tokio::test]
async fn execute_reports_tool_level_errors() {
    let (bridge, _, _) = bridge().await;

    let result = bridge.execute(ExecuteRequest::new("add", json!({"a": "x"}))).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("bad input: a and b must be numbers"));
    assert!(result
        .suggestions
        .iter()
        .any(|s| s.contains("required fields")));
    assert!(result
        .suggestions
        .contains(&"Error: bad input: a and b must be numbers".to_string()));
}

#[tokio::test]
async fn execute_timeout_suggests_longer_timeout() {
    let (bridge, _, _) = bridge().await;
    let result = bridge
        .execute(ExecuteRequest::new("web_fetch", json!({"url": "https://example.com"})))
        .await;
    assert!(!result.success);
    assert_eq!(
        result.suggestions.last().map(String::as_str),
        Some(RecoverySuggestion::IncreaseTimeout.hint())
    );
}

#[tokio::test]
async fn history_is_bounded_fifo() {
    let settings = BridgeSettings {
        history_capacity: 3,
        ..Default::default()
    };
    let (bridge, _, _) = bridge_with(settings).await;

    let mut ids = Vec::new();
    for n in 0..5 {
        ids.push(
            bridge
                .record(
                    format!("intent {n}"),
                    ToolCall::new("echo", json!({"n": n})),
                    json!(null),
                    Feedback::Neutral,
                )
                .await,
        );
    }

    let history = bridge.history().await;
    let kept: Vec<Uuid> = history.iter().map(|r| r.id).collect();
    assert_eq!(kept, ids[2..].to_vec());
}

#[tokio::test]
async fn search_rejects_empty_query() {
    let (bridge, _, _) = bridge().await;
    assert!(matches!(
        bridge.search("   ", 3, DEFAULT_MIN_CONFIDENCE).await,
        Err(BridgeError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn search_returns_everything_when_cache_fits() {
    let (bridge, _, advisor) = bridge().await;
    let result = bridge.search("anything", 10, DEFAULT_MIN_CONFIDENCE).await.unwrap();
    assert_eq!(result.tools.len(), 6);
    assert!(result.confidence_scores.values().all(|c| *c == 1.0));
    assert_eq!(advisor.call_count(), 0);
}

#[tokio::test]
async fn search_uses_advisor_ranking_padded_with_unranked() {
    let (bridge, _, advisor) = bridge().await;
    advisor.queue_response(
        r#"[{"name": "web_fetch", "confidence": 0.9}, {"name": "ghost", "confidence": 0.8}]"#,
    );

    let result = bridge.search("download a page", 3, DEFAULT_MIN_CONFIDENCE).await.unwrap();
    assert_eq!(result.names(), ["web_fetch", "echo", "read_file"]);
    assert_eq!(result.confidence_scores["web_fetch"], 0.9);
    assert_eq!(result.confidence_scores["echo"], 0.5);
}

#[tokio::test]
async fn search_falls_back_to_substring_scoring() {
    let (bridge, _, advisor) = bridge().await;

    let result = bridge.search("file", 2, DEFAULT_MIN_CONFIDENCE).await.unwrap();

    assert_eq!(advisor.call_count(), 1);
    assert_eq!(result.names(), ["read_file", "write_file"]);
    assert!(result.confidence_scores["read_file"] > result.confidence_scores["write_file"]);
    assert!((result.confidence_scores["write_file"] - 0.9).abs() < 1e-9);
}

#[tokio::test]
async fn search_drops_scores_below_min_confidence() {
    let (bridge, _, advisor) = bridge().await;
    advisor.queue_response(
        r#"[{"name": "web_fetch", "confidence": 0.9}, {"name": "notify", "confidence": 0.05}]"#,
    );

    let result = bridge.search("fetch it", 3, DEFAULT_MIN_CONFIDENCE).await.unwrap();
    assert_eq!(result.names(), ["web_fetch", "echo"]);
    assert!(!result.confidence_scores.contains_key("notify"));
}

#[tokio::test]
async fn search_rejects_out_of_range_min_confidence() {
    let (bridge, _, _) = bridge().await;
    for bad in [-0.1, 1.5, f64::NAN] {
        assert!(matches!(
            bridge.search("file", 2, bad).await,
            Err(BridgeError::InvalidArgument(_))
        ));
    }
}
