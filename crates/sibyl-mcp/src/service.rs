//! JSON-RPC dispatch for the MCP methods.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use sibyl_core::constants;
use sibyl_core::protocol::{
    error_codes, InitializeResult, JsonRpcRequest, JsonRpcResponse, ServerCapabilities,
    ServerInfo, ToolCallParams, PROTOCOL_VERSION,
};
use sibyl_llm::AnswerClient;

use crate::tools::{QueryTool, SearchTool, Tool, ToolError};

/// The protocol core: one instance serves every session.
///
/// Stateless with respect to transport and sessions; the caller owns message
/// ordering and reply delivery.
pub struct McpService {
    /// Registered tools, in `tools/list` order.
    tools: Vec<Arc<dyn Tool>>,
}

impl McpService {
    /// Build the service with the standard tool set over one answer client.
    #[must_use]
    pub fn new(client: Arc<dyn AnswerClient>) -> Self {
        Self {
            tools: vec![
                Arc::new(QueryTool::new(client.clone())),
                Arc::new(SearchTool::new(client)),
            ],
        }
    }

    /// Handle one raw message string. `None` means no reply is owed
    /// (the message was a notification).
    pub async fn handle_message(&self, raw: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(raw) {
            Ok(req) => req,
            Err(e) => {
                warn!(error = %e, "unparseable protocol message");
                return Some(JsonRpcResponse::parse_error(format!(
                    "Failed to parse request: {e}"
                )));
            }
        };
        self.handle_request(request).await
    }

    /// Handle one parsed request or notification.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            self.handle_notification(&request);
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);
        debug!(method = %request.method, "dispatching request");

        let result = match request.method.as_str() {
            "initialize" => Self::handle_initialize(),
            "ping" => Ok(json!({})),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params).await,
            other => Err((
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err((code, message)) => JsonRpcResponse::error(id, code, message),
        })
    }

    /// Notifications produce no response; only `initialized` is meaningful.
    fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" => {
                debug!("client completed initialization");
            }
            other => {
                debug!(method = %other, "ignoring unknown notification");
            }
        }
    }

    fn handle_initialize() -> Result<Value, (i64, String)> {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_owned(),
            capabilities: ServerCapabilities::default(),
            server_info: ServerInfo {
                name: constants::NAME.to_owned(),
                version: constants::VERSION.to_owned(),
            },
        };
        serde_json::to_value(result)
            .map_err(|e| (error_codes::INTERNAL_ERROR, format!("Serialization error: {e}")))
    }

    fn handle_tools_list(&self) -> Result<Value, (i64, String)> {
        let tools: Vec<_> = self.tools.iter().map(|t| t.descriptor()).collect();
        Ok(json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, (i64, String)> {
        let params = params.ok_or((error_codes::INVALID_PARAMS, "Missing params".to_owned()))?;
        let call: ToolCallParams = serde_json::from_value(params).map_err(|e| {
            (
                error_codes::INVALID_PARAMS,
                format!("Invalid tool call params: {e}"),
            )
        })?;

        let Some(tool) = self.tools.iter().find(|t| t.name() == call.name) else {
            return Err((
                error_codes::INVALID_PARAMS,
                format!("Unknown tool: {}", call.name),
            ));
        };

        let result = match tool.call(call.arguments).await {
            Ok(result) => result,
            Err(ToolError::InvalidArgs(message)) => {
                return Err((error_codes::INVALID_PARAMS, message));
            }
        };
        serde_json::to_value(result)
            .map_err(|e| (error_codes::INTERNAL_ERROR, format!("Serialization error: {e}")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
