//! Liveness snapshot for `GET /health`.

use std::time::Instant;

use serde::Serialize;

/// Health payload. Field names are part of the wire contract.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` while the process is serving.
    pub status: &'static str,
    /// Number of registered sessions.
    pub active_connections: usize,
    /// Seconds since the server started.
    pub uptime_secs: u64,
}

/// Build the current health snapshot. Read-only; never fails.
#[must_use]
pub fn health_check(start: Instant, active_connections: usize) -> HealthResponse {
    HealthResponse {
        status: "ok",
        active_connections,
        uptime_secs: start.elapsed().as_secs(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_ok() {
        let resp = health_check(Instant::now(), 0);
        assert_eq!(resp.status, "ok");
        assert_eq!(resp.active_connections, 0);
    }

    #[test]
    fn reports_the_session_count_it_was_given() {
        let resp = health_check(Instant::now(), 7);
        assert_eq!(resp.active_connections, 7);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let resp = health_check(Instant::now(), 2);
        let json = serde_json::to_value(&resp).expect("serialize");
        assert_eq!(json["status"], "ok");
        assert_eq!(json["activeConnections"], 2);
        assert!(json["uptimeSecs"].is_u64());
    }
}
