//! Per-session worker: drains the inbound queue in arrival order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use sibyl_mcp::McpService;

use super::handle::SessionHandle;

/// Process one session's inbound messages until the stream closes or the
/// server shuts down.
///
/// Messages are consumed strictly one at a time, which is what gives a
/// session its ordering guarantee: replies leave the stream in the order
/// the requests arrived. A reply whose stream has meanwhile closed is
/// discarded, never redirected to another session.
pub async fn run(
    session: Arc<SessionHandle>,
    mut inbound: mpsc::Receiver<String>,
    service: Arc<McpService>,
    shutdown: CancellationToken,
) {
    loop {
        let body = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            () = session.stream_closed() => break,
            message = inbound.recv() => match message {
                Some(body) => body,
                None => break,
            },
        };

        let Some(response) = service.handle_message(&body).await else {
            continue;
        };
        let payload = match serde_json::to_string(&response) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(session = %session.id, error = %e, "failed to serialize reply");
                continue;
            }
        };
        if !session.send(Arc::new(payload)) {
            debug!(session = %session.id, "discarding reply for a closed stream");
        }
    }
    debug!(session = %session.id, "session worker exited");
}

// ─────────────────────────────────────────────────────────────────────────────
