//! JSON-RPC 2.0 envelopes used on the MCP stdio wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BridgeError, Result};

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Outgoing request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.into(),
            params,
        }
    }
}

/// Outgoing notification (no id, no response).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params,
        }
    }
}

/// Error object carried by an error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A classified inbound frame.
#[derive(Debug)]
pub enum Incoming {
    /// A response to one of our requests; `outcome` is the result or the remote error.
    Response { id: u64, outcome: Result<Value> },
    /// A request or notification initiated by the server.
    ServerMessage { method: String, id: Option<Value> },
}

/// Parse one line into an [`Incoming`] frame.
///
/// Fails with [`BridgeError::Protocol`] for anything that cannot be correlated:
/// non-JSON output, non-objects, or responses without an integer id.
pub fn parse_incoming(line: &str) -> Result<Incoming> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| BridgeError::Protocol(format!("frame is not JSON: {e}")))?;
    let Value::Object(mut frame) = value else {
        return Err(BridgeError::Protocol("frame is not a JSON object".into()));
    };

    if let Some(method) = frame.get("method").and_then(Value::as_str) {
        return Ok(Incoming::ServerMessage {
            method: method.to_string(),
            id: frame.remove("id"),
        });
    }

    let id = frame
        .get("id")
        .and_then(Value::as_u64)
        .ok_or_else(|| BridgeError::Protocol("response without an integer id".into()))?;

    let outcome = match frame.remove("error") {
        Some(Value::Null) | None => match frame.remove("result") {
            Some(result) => Ok(result),
            None => Err(BridgeError::Protocol(format!(
                "response {id} carries neither result nor error"
            ))),
        },
        Some(error) => match serde_json::from_value::<JsonRpcError>(error) {
            Ok(error) => Err(BridgeError::remote(error.code, error.message)),
            Err(e) => Err(BridgeError::Protocol(format!(
                "response {id} has a malformed error object: {e}"
            ))),
        },
    };

    Ok(Incoming::Response { id, outcome })
}

/// Parameters for the `initialize` handshake.
pub fn initialize_params(client_name: &str, client_version: &str) -> Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "clientInfo": {
            "name": client_name,
            "version": client_version,
        }
    })
}

/// Identity reported by the server during the handshake.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    #[serde(default)]
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default)]
    pub server_info: Option<Implementation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Implementation {
    pub name: String,
    #[serde(default)]
    pub version: String,
}
