//! Handle to one connected session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use sibyl_core::SessionId;

/// Why a message could not be queued for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// The inbound queue is at capacity.
    QueueFull,
    /// The worker is gone; the session is closing.
    Closed,
}

/// The registry-visible face of one open stream.
///
/// Owns the send side of both per-session queues: `outbound` feeds the SSE
/// stream, `inbound` feeds the session worker. Both are bounded, so a stuck
/// client turns into dropped frames and `QueueFull` rejections instead of
/// unbounded memory growth.
pub struct SessionHandle {
    /// Session identifier, unique for the lifetime of the process.
    pub id: SessionId,
    outbound: mpsc::Sender<Arc<String>>,
    inbound: mpsc::Sender<String>,
    dropped_frames: AtomicU64,
}

impl SessionHandle {
    /// Create a handle around the send sides of a session's queues.
    pub fn new(
        id: SessionId,
        outbound: mpsc::Sender<Arc<String>>,
        inbound: mpsc::Sender<String>,
    ) -> Self {
        Self {
            id,
            outbound,
            inbound,
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Queue one frame for the stream. Returns `false` when the stream is
    /// gone or backed up; the frame is dropped either way.
    pub fn send(&self, payload: Arc<String>) -> bool {
        match self.outbound.try_send(payload) {
            Ok(()) => true,
            Err(e) => {
                let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
                warn!(session = %self.id, error = %e, "dropping outbound frame");
                false
            }
        }
    }

    /// Queue one raw control message for the session worker.
    pub fn submit(&self, body: String) -> Result<(), SubmitError> {
        self.inbound.try_send(body).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubmitError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
        })
    }

    /// Resolves once the stream side has been dropped.
    pub async fn stream_closed(&self) {
        self.outbound.closed().await;
    }

    /// Whether the stream side is still attached.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }

    /// Frames dropped because the stream was closed or backed up.
    #[must_use]
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
