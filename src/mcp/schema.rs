//! MCP tool descriptors and call results.

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BridgeError, Result};

/// A tool exposed by an MCP server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object" })
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Names listed under the schema's `required` array.
    pub fn required_fields(&self) -> Vec<String> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `(property, description)` pairs from the schema's `properties` object.
    pub fn property_descriptions(&self) -> Vec<(String, String)> {
        self.input_schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, prop)| {
                        let description = prop
                            .get("description")
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        (name.clone(), description.to_string())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// `tools/list` result page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    pub tools: Vec<ToolDescriptor>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// One item of a tool result. Only `type` is required on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    Text {
        #[serde(default)]
        text: String,
    },
    Image {
        #[serde(default)]
        data: String,
        #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    Audio {
        #[serde(default)]
        data: String,
        #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    Resource {
        #[serde(default)]
        resource: Value,
    },
    #[serde(other)]
    Unsupported,
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Decode the base64 payload of binary content.
    pub fn decode_data(&self) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Image { data, .. } | Self::Audio { data, .. } => base64::engine::general_purpose::STANDARD
                .decode(data)
                .map(Some)
                .map_err(|e| BridgeError::Protocol(format!("invalid base64 content: {e}"))),
            _ => Ok(None),
        }
    }
}

/// `tools/call` result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<ToolContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolCallResult {
    /// All text items joined by newlines, if there are any.
    pub fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self.content.iter().filter_map(ToolContent::as_text).collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    pub fn into_value_or_text(self) -> Value {
        if let Some(structured) = self.structured_content.clone() {
            return structured;
        }
        if let Some(text) = self.text() {
            return Value::String(text);
        }
        serde_json::to_value(self.content).unwrap_or(Value::Null)
    }
}
