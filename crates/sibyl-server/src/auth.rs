//! API-key gate for the HTTP surface.
//!
//! One static shared secret; a request may present it in the `x-api-key`
//! header or, for clients that cannot set headers (browser `EventSource`),
//! the `api_key` query parameter.

use axum::http::HeaderMap;
use tracing::warn;

use crate::error::TransportError;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// The key a request presented, if any.
///
/// The header wins when it carries a non-empty, decodable value; otherwise
/// the query parameter is consulted.
#[must_use]
pub fn presented_key<'a>(headers: &'a HeaderMap, query_key: Option<&'a str>) -> Option<&'a str> {
    let header = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty());
    header.or(query_key)
}

/// Check the presented key against the configured secret by exact match.
///
/// Must be called before any session or registry mutation; a rejected
/// request leaves no trace beyond this log line.
pub fn authorize(
    headers: &HeaderMap,
    query_key: Option<&str>,
    secret: &str,
) -> Result<(), TransportError> {
    match presented_key(headers, query_key) {
        Some(key) if key == secret => Ok(()),
        presented => {
            warn!(
                key_presented = presented.is_some(),
                "authentication failed"
            );
            Err(TransportError::AuthFailure)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
