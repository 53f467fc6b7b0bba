//! Command handlers: connect, run one bridge operation, print JSON.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::bridge::{ExecuteRequest, ToolBridge, ToolFilter};
use crate::config::MitmConfig;
use crate::error::{BridgeError, Result};
use crate::mcp::MCPClient;
use crate::provider::create_advisor;

use super::{Cli, Commands, DiscoverArgs, ExecuteArgs};

/// Install the stderr log subscriber. `RUST_LOG` wins over `log_level`.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mitm={log_level}")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run one CLI invocation end to end.
pub async fn run(cli: Cli) -> Result<()> {
    let config = MitmConfig::load(cli.config.as_deref())?;
    init_tracing(&config.log_level);

    // Validate user input before paying for a server launch.
    let execute_params = match &cli.command {
        Commands::Execute(args) => Some(parse_params(args)?),
        _ => None,
    };

    let client = Arc::new(MCPClient::connect(&config.server).await?);
    if let Some(info) = client.server_info().and_then(|init| init.server_info) {
        info!(server = %info.name, version = %info.version, "connected");
    }

    let advisor = create_advisor(&config.advisor)?;
    debug!(advisor = advisor.provider_name(), "advisor ready");
    let bridge = ToolBridge::new(client.clone(), advisor, config.bridge.clone());

    let outcome = dispatch(&bridge, cli.command, execute_params).await;
    client.disconnect().await;
    outcome
}

async fn dispatch(bridge: &ToolBridge, command: Commands, params: Option<Value>) -> Result<()> {
    bridge.refresh_tools().await?;

    match command {
        Commands::Discover(args) => print_json(&bridge.discover(&filter_from(args, bridge)).await?),
        Commands::Usage(args) => print_json(&bridge.usage(&args.tool).await?),
        Commands::Execute(args) => {
            let mut request = ExecuteRequest::new(args.tool, params.unwrap_or(Value::Null));
            if let Some(intent) = args.intent {
                request = request.with_intent(intent);
            }
            print_json(&bridge.execute(request).await)
        }
        Commands::Search(args) => print_json(
            &bridge
                .search(&args.query, args.limit, args.min_confidence)
                .await?,
        ),
    }
}

fn filter_from(args: DiscoverArgs, bridge: &ToolBridge) -> ToolFilter {
    ToolFilter {
        query: args.query,
        category: args.category,
        limit: Some(args.limit.unwrap_or(bridge.settings().page_size)),
        offset: args.offset,
    }
}

fn parse_params(args: &ExecuteArgs) -> Result<Value> {
    let value: Value = serde_json::from_str(&args.params)
        .map_err(|e| BridgeError::InvalidArgument(format!("--params is not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(BridgeError::InvalidArgument(
            "--params must be a JSON object".into(),
        ));
    }
    Ok(value)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
