//! # sibyl-server
//!
//! Axum SSE transport and session management for the answer server.
//!
//! - HTTP endpoints: `GET /sse` (stream open), `POST /messages` (control
//!   channel), `GET /health` (liveness)
//! - Session registry: monotonic ids, lifecycle observers, most-recent
//!   fallback routing
//! - Per-session worker task draining a bounded inbound queue, so replies
//!   leave each stream in submission order
//! - API-key auth (header or query) and a sliding-window rate limiter in
//!   front of every route
//! - stdio transport as a degenerate single-session alternative
//! - `CancellationToken`-based shutdown coordinator shared by the listener,
//!   the streams, and the session workers

#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod messages;
pub mod rate_limit;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod sse;
pub mod stdio;

pub use config::ServerConfig;
pub use error::TransportError;
pub use rate_limit::RateLimiter;
pub use server::{AppState, SibylServer};
pub use session::{SessionEvent, SessionHandle, SessionRegistry};
pub use shutdown::ShutdownCoordinator;
