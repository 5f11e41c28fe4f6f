//! The two answer tools exposed over MCP.
//!
//! `perplexity-query` forwards a free-form prompt (with an optional
//! caller-supplied system message); `perplexity-search` wraps the prompt in a
//! fixed web-search instruction. Both delegate to the [`AnswerClient`] seam.
//!
//! Upstream failures never escape as protocol errors: they come back as
//! `isError` results carrying `Error: <message>`, and an empty completion
//! becomes the tool's fallback text, delivered as a normal reply.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use sibyl_core::protocol::{ToolCallResult, ToolDescriptor};
use sibyl_llm::{AnswerClient, AnswerError, AnswerRequest, AnswerResult, SonarModel};

/// System instruction used by `perplexity-search`.
const WEB_SEARCH_SYSTEM: &str = "You are a helpful web search assistant. \
     Search the web for current information and provide concise answers with citations.";

/// Fallback text when a query completion comes back empty.
const QUERY_EMPTY_FALLBACK: &str = "No response received from Perplexity API";

/// Fallback text when a search completion comes back empty.
const SEARCH_EMPTY_FALLBACK: &str = "No search results received from Perplexity API";

/// How much of a prompt is echoed into logs.
const LOG_PREVIEW_CHARS: usize = 50;

/// A tool invocable through `tools/call`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name as addressed by `tools/call`.
    fn name(&self) -> &'static str;

    /// Descriptor advertised by `tools/list`.
    fn descriptor(&self) -> ToolDescriptor;

    /// Run the tool. `Err` is reserved for argument rejection; a failed run
    /// is an `Ok` result with `isError` set.
    async fn call(&self, arguments: Value) -> Result<ToolCallResult, ToolError>;
}

/// Tool invocation rejected before any upstream work happened.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Arguments did not match the tool's schema.
    #[error("{0}")]
    InvalidArgs(String),
}

/// Arguments of `perplexity-query`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryArgs {
    prompt: String,
    #[serde(default)]
    model: SonarModel,
    system_prompt: Option<String>,
}

/// Arguments of `perplexity-search`.
#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    model: SonarModel,
}

/// `perplexity-query`: send a prompt upstream and return the answer.
pub struct QueryTool {
    client: Arc<dyn AnswerClient>,
}

impl QueryTool {
    /// Create the tool over an answer client.
    #[must_use]
    pub fn new(client: Arc<dyn AnswerClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &'static str {
        "perplexity-query"
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_owned(),
            description: "Send a query to Perplexity API and get a response".to_owned(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "The query to send to Perplexity"
                    },
                    "model": {
                        "type": "string",
                        "enum": ["sonar-pro", "sonar-reasoning-pro"],
                        "default": "sonar-pro",
                        "description": "The model to use"
                    },
                    "systemPrompt": {
                        "type": "string",
                        "description": "Optional system prompt to set context"
                    }
                },
                "required": ["prompt"]
            }),
        }
    }

    async fn call(&self, arguments: Value) -> Result<ToolCallResult, ToolError> {
        let args: QueryArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArgs(format!("Invalid perplexity-query arguments: {e}")))?;
        info!(prompt = %preview(&args.prompt), model = %args.model, "executing perplexity-query");

        let request = AnswerRequest {
            model: args.model,
            system: args.system_prompt,
            prompt: args.prompt,
        };
        Ok(answer_to_result(
            self.client.answer(&request).await,
            QUERY_EMPTY_FALLBACK,
        ))
    }
}

/// `perplexity-search`: web search with a fixed system instruction.
pub struct SearchTool {
    client: Arc<dyn AnswerClient>,
}

impl SearchTool {
    /// Create the tool over an answer client.
    #[must_use]
    pub fn new(client: Arc<dyn AnswerClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &'static str {
        "perplexity-search"
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_owned(),
            description: "Perform a web search using Perplexity API".to_owned(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query"
                    },
                    "model": {
                        "type": "string",
                        "enum": ["sonar-pro", "sonar-reasoning-pro"],
                        "default": "sonar-pro",
                        "description": "The model to use"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, arguments: Value) -> Result<ToolCallResult, ToolError> {
        let args: SearchArgs = serde_json::from_value(arguments).map_err(|e| {
            ToolError::InvalidArgs(format!("Invalid perplexity-search arguments: {e}"))
        })?;
        info!(query = %preview(&args.query), model = %args.model, "executing perplexity-search");

        let request = AnswerRequest {
            model: args.model,
            system: Some(WEB_SEARCH_SYSTEM.to_owned()),
            prompt: args.query,
        };
        Ok(answer_to_result(
            self.client.answer(&request).await,
            SEARCH_EMPTY_FALLBACK,
        ))
    }
}

/// Map an upstream outcome onto a tool result.
fn answer_to_result(outcome: AnswerResult<String>, empty_fallback: &str) -> ToolCallResult {
    match outcome {
        Ok(text) => ToolCallResult::text(text),
        Err(AnswerError::EmptyCompletion) => ToolCallResult::text(empty_fallback),
        Err(e) => {
            error!(category = e.category(), error = %e, "tool execution failed");
            ToolCallResult::error_text(e)
        }
    }
}

/// First [`LOG_PREVIEW_CHARS`] characters of a prompt, for log lines.
fn preview(text: &str) -> String {
    if text.chars().count() <= LOG_PREVIEW_CHARS {
        text.to_owned()
    } else {
        let head: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
        format!("{head}...")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
