//! # sibyl
//!
//! Server binary — wires the Perplexity answer client and the MCP protocol
//! core to one of the two transports: the multi-session SSE server (default)
//! or the stdio pipe (`--stdio`).

#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use sibyl_llm::{PerplexityClient, PerplexityConfig};
use sibyl_mcp::McpService;
use sibyl_server::shutdown::DEFAULT_DRAIN_TIMEOUT;
use sibyl_server::{stdio, ServerConfig, SibylServer};

/// Environment variable holding the upstream Perplexity credential.
const PERPLEXITY_KEY_ENV: &str = "PERPLEXITY_API_KEY";

/// Perplexity-backed MCP server.
#[derive(Parser, Debug)]
#[command(name = "sibyl", about = "Perplexity-backed MCP server")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind (overrides the PORT environment variable; 0 auto-assigns).
    #[arg(long)]
    port: Option<u16>,

    /// Speak the protocol over stdin/stdout instead of serving HTTP.
    #[arg(long)]
    stdio: bool,
}

/// Initialize the tracing subscriber with stderr output only.
///
/// stdout belongs to the protocol in stdio mode, so diagnostics never go
/// near it in either mode.
fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Resolve the upstream credential. Required in every mode: without it no
/// tool call can succeed, so a missing key fails startup rather than every
/// request.
fn upstream_key(value: Option<String>) -> Result<String> {
    match value {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => bail!("{PERPLEXITY_KEY_ENV} is not set (add it to .env or the environment)"),
    }
}

/// Fold CLI arguments over the environment-derived server config.
fn resolve_server_config(args: &Cli, mut config: ServerConfig) -> ServerConfig {
    config.host = args.host.clone();
    if let Some(port) = args.port {
        config.port = port;
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_file = dotenvy::dotenv().ok();
    init_logging();
    if let Some(path) = &env_file {
        tracing::debug!(path = %path.display(), "loaded environment from .env");
    }

    let args = Cli::parse();
    let key = upstream_key(std::env::var(PERPLEXITY_KEY_ENV).ok())?;

    let client = Arc::new(PerplexityClient::new(PerplexityConfig::new(key)));
    let service = Arc::new(McpService::new(client));

    if args.stdio {
        tracing::info!("starting stdio transport");
        stdio::run(service).await.context("stdio transport failed")?;
        return Ok(());
    }

    let config = resolve_server_config(&args, ServerConfig::from_env());
    if config.uses_default_api_key() {
        tracing::warn!(
            "MCP_API_KEY is unset; using the shipped default key — set a real secret before exposing this server"
        );
    }

    let server = SibylServer::new(config, service);
    let (addr, serve_task) = server.listen().await.context("failed to bind listener")?;
    tracing::info!("sibyl listening on http://{addr} (stream at /sse, control at /messages)");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    tracing::info!("shutting down");
    server
        .shutdown()
        .drain(vec![serve_task], DEFAULT_DRAIN_TIMEOUT)
        .await;
    tracing::info!("shutdown complete");
    Ok(())
}
