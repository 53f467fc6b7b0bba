//! mitm: Model in the Middle.
//!
//! A bridge that sits in front of one MCP tool server. It launches the server,
//! speaks newline-delimited JSON-RPC to it over stdio, caches the tools it
//! exposes, and layers advisor-generated usage guidance, parameter
//! optimization and interaction history on top.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use mitm::prelude::*;
//!
//! # async fn example() -> mitm::error::Result<()> {
//! let config = MitmConfig::load(None)?;
//! let client = Arc::new(MCPClient::connect(&config.server).await?);
//! let advisor = create_advisor(&config.advisor)?;
//! let bridge = ToolBridge::new(client.clone(), advisor, config.bridge.clone());
//!
//! bridge.refresh_tools().await?;
//! let outcome = bridge
//!     .execute(ExecuteRequest::new("echo", serde_json::json!({ "message": "hi" })))
//!     .await;
//! println!("{}", serde_json::to_string_pretty(&outcome)?);
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod mcp;
pub mod prelude;
pub mod provider;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
