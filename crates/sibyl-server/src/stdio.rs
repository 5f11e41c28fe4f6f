//! Line-delimited stdio transport.
//!
//! The degenerate form of the session model: exactly one implicit session
//! for the lifetime of the process, no auth, no rate limiting, no registry.
//! Replies are written in arrival order, one JSON object per line.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use sibyl_mcp::McpService;

/// Serve the protocol over stdin/stdout until EOF.
///
/// All diagnostics go to stderr; stdout stays a clean protocol channel.
pub async fn run(service: Arc<McpService>) -> io::Result<()> {
    info!("stdio transport ready");
    serve(service, tokio::io::stdin(), tokio::io::stdout()).await
}

async fn serve<R, W>(service: Arc<McpService>, input: R, mut output: W) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(input).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(response) = service.handle_message(line).await else {
            continue;
        };
        let payload = match serde_json::to_string(&response) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "failed to serialize reply");
                continue;
            }
        };
        output.write_all(payload.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }
    info!("stdin closed; stdio transport exiting");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
