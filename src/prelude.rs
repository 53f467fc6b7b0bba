//! Convenience re-exports for common use.

pub use crate::bridge::{
    DiscoveredTool, ExecuteRequest, ExecutionResult, Feedback, InteractionRecord, ToolBridge,
    ToolCall, ToolFilter, ToolSearchResult, ToolTransport, UsageInfo,
};
pub use crate::config::{AdvisoryConfig, BridgeSettings, MitmConfig, ServerConfig};
pub use crate::error::{BridgeError, Result};
pub use crate::mcp::{MCPClient, ToolCallResult, ToolDescriptor};
pub use crate::provider::{create_advisor, AdvisoryProvider};
