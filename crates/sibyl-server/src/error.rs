//! Request-rejection taxonomy for the HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use sibyl_core::SessionId;

/// Why the transport refused a request before it reached a session.
///
/// Every variant maps to a status code and a JSON `{"error": ...}` body;
/// `Display` is the wire-visible message.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Missing or wrong API key.
    #[error("Unauthorized: Invalid API key")]
    AuthFailure,
    /// Client exhausted its request budget for the current window.
    #[error("Too many requests, please try again later.")]
    RateLimited,
    /// A message arrived while no stream was connected.
    #[error("No active SSE connection found")]
    NoActiveSession,
    /// A message named a session that is not registered.
    #[error("Unknown session: {0}")]
    UnknownSession(String),
    /// The session exists but its inbound queue is full.
    #[error("Session {0} is not accepting messages")]
    Backpressure(SessionId),
}

impl TransportError {
    /// The HTTP status this rejection is reported with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::AuthFailure => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::NoActiveSession | Self::UnknownSession(_) => StatusCode::BAD_REQUEST,
            Self::Backpressure(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
