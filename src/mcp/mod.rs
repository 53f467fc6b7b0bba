//! Model Context Protocol (MCP) client over a child process's stdio.

pub mod client;
pub mod framing;
pub mod pending;
pub mod protocol;
pub mod schema;
pub mod transport;

pub use client::{MCPClient, MCPConnectionState};
pub use protocol::InitializeResult;
pub use schema::{ToolCallResult, ToolContent, ToolDescriptor};
pub use transport::StdioTransport;
