mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use common::{connect_scripted, echo_handler, Reply};
use mitm::bridge::{
    spawn_refresher, ExecuteRequest, Feedback, ToolBridge, ToolCall, ToolFilter,
};
use mitm::config::BridgeSettings;
use mitm::error::BridgeError;
use mitm::provider::MockAdvisor;

async fn echo_bridge() -> (ToolBridge, Arc<MockAdvisor>) {
    let client = Arc::new(connect_scripted(Duration::from_secs(5), echo_handler).await);
    let advisor = Arc::new(MockAdvisor::new());
    let bridge = ToolBridge::new(client, advisor.clone(), BridgeSettings::default());
    assert_eq!(bridge.refresh_tools().await.unwrap(), 1);
    (bridge, advisor)
}

#[tokio::test]
async fn discover_returns_the_listed_tool() {
    let (bridge, _) = echo_bridge().await;

    let tools = bridge.discover(&ToolFilter::default()).await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "echo");
    assert_eq!(tools[0].category, "Communication");
}

#[tokio::test]
async fn execute_echo_succeeds() {
    let (bridge, _) = echo_bridge().await;

    let result = bridge
        .execute(ExecuteRequest::new("echo", json!({"message": "hi"})))
        .await;

    assert!(result.success, "{result:?}");
    assert_eq!(result.result, Some(json!("Echo: hi")));
    assert!(result.suggestions.is_empty());
}

#[tokio::test]
async fn execute_missing_tool_reports_failure_with_suggestions() {
    let (bridge, _) = echo_bridge().await;

    let result = bridge.execute(ExecuteRequest::new("missing_tool", json!({}))).await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("Unknown tool"));
    assert!(!result.suggestions.is_empty());
}

#[tokio::test]
async fn usage_is_memoized_and_unknown_tools_are_not_found() {
    let (bridge, advisor) = echo_bridge().await;
    advisor.queue_response(
        r#"Here is what I found:
```json
{"examples": [{"input": {"message": "hello"}, "output": "Echo: hello", "description": "basic"}],
 "relatedTools": [], "category": "Communication"}
```"#,
    );

    let first = bridge.usage("echo").await.unwrap();
    let second = bridge.usage("echo").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.examples[0].output, json!("Echo: hello"));
    assert_eq!(advisor.call_count(), 1);

    assert!(matches!(
        bridge.usage("nope").await,
        Err(BridgeError::ToolNotFound(_))
    ));
}

#[tokio::test]
async fn history_keeps_the_newest_thousand() {
    let (bridge, _) = echo_bridge().await;

    for n in 0..1001 {
        bridge
            .record(
                format!("intent {n}"),
                ToolCall::new("echo", json!({"message": n.to_string()})),
                json!(format!("Echo: {n}")),
                Feedback::Neutral,
            )
            .await;
    }

    let history = bridge.history().await;
    assert_eq!(history.len(), 1000);
    assert_eq!(history.first().unwrap().user_intent, "intent 1");
    assert_eq!(history.last().unwrap().user_intent, "intent 1000");
}

#[tokio::test(start_paused = true)]
async fn refresher_picks_up_new_tools_until_cancelled() {
    let listings = Arc::new(AtomicUsize::new(0));
    let counter = listings.clone();
    let handler = move |method: &str, params: &Value| {
        if method == "tools/list" {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let tools: Vec<Value> = (0..n)
                .map(|i| json!({"name": format!("tool_{i}"), "inputSchema": {"type": "object"}}))
                .collect();
            return Reply::Result(json!({ "tools": tools }));
        }
        echo_handler(method, params)
    };
    let client = Arc::new(connect_scripted(Duration::from_secs(5), handler).await);
    let bridge = Arc::new(ToolBridge::new(
        client,
        Arc::new(MockAdvisor::new()),
        BridgeSettings::default(),
    ));
    bridge.refresh_tools().await.unwrap();
    assert_eq!(bridge.cached_tool_count().await, 1);

    let cancel = CancellationToken::new();
    let task = spawn_refresher(bridge.clone(), Duration::from_secs(60), cancel.clone());

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(bridge.cached_tool_count().await, 2);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(bridge.cached_tool_count().await, 3);

    cancel.cancel();
    task.await.unwrap();
    let after_cancel = listings.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(listings.load(Ordering::SeqCst), after_cancel);
}
