//! # sibyl-core
//!
//! Wire-format types and shared vocabulary for the sibyl MCP server.
//!
//! This crate provides what every other sibyl crate depends on:
//!
//! - **Protocol types**: JSON-RPC 2.0 envelopes plus the MCP initialize /
//!   tools/list / tools/call shapes, with their reserved error codes
//! - **Session IDs**: `SessionId`, a monotonic never-reused identifier for
//!   one open client stream
//! - **Constants**: package name/version used in `serverInfo`

#![deny(unsafe_code)]

pub mod constants;
pub mod ids;
pub mod protocol;

pub use ids::SessionId;
pub use protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolCallParams, ToolCallResult, ToolContent,
    ToolDescriptor,
};
