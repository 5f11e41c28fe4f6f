//! JSON-RPC 2.0 envelopes and the MCP method payload shapes.
//!
//! The server speaks MCP (Model Context Protocol) framed as JSON-RPC 2.0,
//! protocol revision [`PROTOCOL_VERSION`]. The same types serve both
//! transports: each SSE `message` event and each stdio line carries exactly
//! one serialized envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC framing version.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision advertised in the `initialize` result.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Reserved JSON-RPC 2.0 error codes.
pub mod error_codes {
    /// Invalid JSON was received by the server.
    pub const PARSE_ERROR: i64 = -32700;
    /// The JSON sent is not a valid request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// The method does not exist or is not available.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Incoming JSON-RPC request or notification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Framing version; always `"2.0"`.
    pub jsonrpc: String,
    /// Request identifier. Absent for notifications, which are never answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Method name (e.g. `tools/call`).
    pub method: String,
    /// Optional parameters object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Whether this is a notification (no `id`, so no response is produced).
    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Outgoing JSON-RPC response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Framing version; always `"2.0"`.
    pub jsonrpc: String,
    /// Echoed request identifier (`null` when the request id was unreadable).
    pub id: Value,
    /// Result payload (present on success).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload (present on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// Structured error object inside a [`JsonRpcResponse`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// One of the [`error_codes`] constants.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Build a success response.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    #[must_use]
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Build the parse-error response for a body that never yielded an id.
    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::error(Value::Null, error_codes::PARSE_ERROR, message)
    }
}

/// Result of the `initialize` handshake.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// MCP protocol revision the server speaks.
    pub protocol_version: String,
    /// Capability advertisement (`{"tools": {}}`).
    pub capabilities: ServerCapabilities,
    /// Implementation name and version.
    pub server_info: ServerInfo,
}

/// Capability advertisement in the `initialize` result.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tool support marker (empty object on the wire).
    pub tools: ToolsCapability,
}

/// Marker for tool support; carries no fields.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToolsCapability {}

/// Implementation identity in the `initialize` result.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

/// One entry in the `tools/list` result.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Tool name as addressed by `tools/call`.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub input_schema: Value,
}

/// Parameters of a `tools/call` request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallParams {
    /// Target tool name.
    pub name: String,
    /// Tool arguments (defaults to an empty object).
    #[serde(default)]
    pub arguments: Value,
}

/// Result of a `tools/call` request.
///
/// A failed tool run is still a *successful* JSON-RPC response: the failure
/// is carried as `isError: true` with the message in the text content, so it
/// reaches the caller as a normal reply on its stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Content blocks making up the result.
    pub content: Vec<ToolContent>,
    /// Set to `true` when the tool run failed; omitted on success.
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolCallResult {
    /// Build a successful single-text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: None,
        }
    }

    /// Build a failed result carrying `Error: <message>` as its text.
    #[must_use]
    pub fn error_text(message: impl std::fmt::Display) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: format!("Error: {message}"),
            }],
            is_error: Some(true),
        }
    }
}

/// One content block inside a [`ToolCallResult`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    /// Plain text.
    #[serde(rename = "text")]
    Text {
        /// The text payload.
        text: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
