//! # sibyl-mcp
//!
//! The protocol core: interprets one MCP message and produces one reply.
//!
//! [`McpService`] owns the JSON-RPC dispatch (`initialize`, `ping`,
//! `tools/list`, `tools/call`, notifications) and the tool registry. Both
//! transports feed it raw message strings and deliver whatever it returns;
//! it holds no transport or session state, so a single instance serves every
//! session concurrently.

#![deny(unsafe_code)]

pub mod service;
pub mod tools;

pub use service::McpService;
pub use tools::{Tool, ToolError};
