//! `POST /messages`: the client-to-server control channel.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;
use tracing::debug;

use sibyl_core::SessionId;

use crate::auth;
use crate::error::TransportError;
use crate::server::AppState;
use crate::session::handle::SubmitError;

/// Query parameters accepted by `POST /messages`.
#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    /// Session token, as announced by the stream's `endpoint` event.
    pub session: Option<String>,
    /// API key, for clients that cannot set request headers.
    pub api_key: Option<String>,
}

/// Route one control message to a session.
///
/// With a `session` token the lookup is keyed; without one the message goes
/// to the most recently opened session, which is only sound for a single
/// connected client. The `202` only acknowledges queueing — the protocol
/// reply arrives asynchronously on the session's stream.
pub async fn messages_handler(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
    headers: HeaderMap,
    body: String,
) -> Result<(StatusCode, &'static str), TransportError> {
    auth::authorize(&headers, query.api_key.as_deref(), &state.config.api_key)?;

    let session = match query.session.as_deref() {
        Some(token) => {
            let id: SessionId = token
                .parse()
                .map_err(|_| TransportError::UnknownSession(token.to_owned()))?;
            state
                .registry
                .get(id)
                .ok_or_else(|| TransportError::UnknownSession(token.to_owned()))?
        }
        None => state
            .registry
            .newest()
            .ok_or(TransportError::NoActiveSession)?,
    };

    debug!(session = %session.id, bytes = body.len(), "control message accepted");

    match session.submit(body) {
        Ok(()) => Ok((StatusCode::ACCEPTED, "Accepted")),
        Err(SubmitError::QueueFull) => Err(TransportError::Backpressure(session.id)),
        Err(SubmitError::Closed) => Err(TransportError::UnknownSession(session.id.to_string())),
    }
}

// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use sibyl_llm::{AnswerClient, AnswerRequest, AnswerResult};
    use sibyl_mcp::McpService;

    use crate::config::ServerConfig;
    use crate::session::handle::SessionHandle;
    use crate::session::registry::SessionRegistry;
    use crate::shutdown::ShutdownCoordinator;

    struct CannedClient;

    #[async_trait]
    impl AnswerClient for CannedClient {
        async fn answer(&self, _request: &AnswerRequest) -> AnswerResult<String> {
            Ok("canned".to_owned())
        }
    }

    fn make_state() -> AppState {
        AppState {
            config: Arc::new(ServerConfig {
                api_key: "k".into(),
                ..ServerConfig::default()
            }),
            registry: Arc::new(SessionRegistry::new()),
            service: Arc::new(McpService::new(Arc::new(CannedClient))),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    fn query(session: Option<&str>) -> Query<MessagesQuery> {
        Query(MessagesQuery {
            session: session.map(str::to_owned),
            api_key: Some("k".into()),
        })
    }

    #[tokio::test]
    async fn full_inbound_queue_is_rejected_with_503() {
        let state = make_state();
        let id = state.registry.allocate_id();
        let (out_tx, _out_rx) = mpsc::channel(1);
        // Depth-one queue with no worker draining it: the second message
        // must be refused, not buffered.
        let (in_tx, _in_rx) = mpsc::channel(1);
        state
            .registry
            .register(Arc::new(SessionHandle::new(id, out_tx, in_tx)));
        let token = id.to_string();

        let (status, body) = messages_handler(
            State(state.clone()),
            query(Some(&token)),
            HeaderMap::new(),
            "{}".to_owned(),
        )
        .await
        .expect("first message fits the queue");
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, "Accepted");

        let second = messages_handler(
            State(state),
            query(Some(&token)),
            HeaderMap::new(),
            "{}".to_owned(),
        )
        .await;
        let err = second.expect_err("queue is full");
        assert!(matches!(err, TransportError::Backpressure(got) if got == id));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn closed_worker_reads_as_unknown_session() {
        let state = make_state();
        let id = state.registry.allocate_id();
        let (out_tx, _out_rx) = mpsc::channel(1);
        let (in_tx, in_rx) = mpsc::channel(1);
        state
            .registry
            .register(Arc::new(SessionHandle::new(id, out_tx, in_tx)));
        drop(in_rx);

        let result = messages_handler(
            State(state),
            query(Some(&id.to_string())),
            HeaderMap::new(),
            "{}".to_owned(),
        )
        .await;
        let err = result.expect_err("worker is gone");
        assert!(matches!(err, TransportError::UnknownSession(_)));
    }
}
