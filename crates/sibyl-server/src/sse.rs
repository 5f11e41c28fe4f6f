//! `GET /sse`: opens the server-to-client stream for one session.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use sibyl_core::SessionId;

use crate::auth;
use crate::error::TransportError;
use crate::server::AppState;
use crate::session::handle::SessionHandle;
use crate::session::registry::SessionRegistry;
use crate::session::worker;

/// Query parameters accepted by `GET /sse`.
#[derive(Debug, Deserialize)]
pub struct SseQuery {
    /// API key, for clients that cannot set request headers.
    pub api_key: Option<String>,
}

/// Open a stream: allocate a session, register it, start its worker, and
/// announce the control endpoint as the first event.
///
/// Everything after the announcement is a `message` event carrying one
/// protocol reply. The stream ends on client disconnect or server
/// shutdown; either way the drop of the stream deregisters the session.
pub async fn sse_handler(
    State(state): State<AppState>,
    Query(query): Query<SseQuery>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, TransportError> {
    auth::authorize(&headers, query.api_key.as_deref(), &state.config.api_key)?;

    let id = state.registry.allocate_id();
    let depth = state.config.session_queue_depth;
    let (out_tx, out_rx) = mpsc::channel(depth);
    let (in_tx, in_rx) = mpsc::channel(depth);

    let session = Arc::new(SessionHandle::new(id, out_tx, in_tx));
    state.registry.register(session.clone());
    let guard = StreamGuard {
        registry: state.registry.clone(),
        id,
    };

    // Detached: the worker exits via the shutdown token or stream closure.
    let _worker = tokio::spawn(worker::run(
        session,
        in_rx,
        state.service.clone(),
        state.shutdown.token(),
    ));

    let endpoint = format!("/messages?session={id}");
    debug!(session = %id, %endpoint, "announcing control endpoint");

    let announce = tokio_stream::once(Ok::<_, Infallible>(
        Event::default().event("endpoint").data(endpoint),
    ));
    let replies = ReceiverStream::new(out_rx)
        .map(|payload: Arc<String>| Ok(Event::default().event("message").data(payload.as_str())));

    let stream = GuardedStream {
        inner: announce.chain(replies),
        _guard: guard,
    }
    .take_until(state.shutdown.token().cancelled_owned());

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Deregisters the session when the stream is dropped.
///
/// Hyper drops the response body on client disconnect, transport error, and
/// normal closure alike, so all three teardown triggers funnel through here
/// exactly once.
struct StreamGuard {
    registry: Arc<SessionRegistry>,
    id: SessionId,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

/// Ties a [`StreamGuard`] to the lifetime of the event stream.
struct GuardedStream<S> {
    inner: S,
    _guard: StreamGuard,
}

impl<S: Stream + Unpin> Stream for GuardedStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll_next(cx)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
