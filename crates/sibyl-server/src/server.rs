//! `SibylServer` — Axum assembly of the SSE transport surface.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::middleware;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use sibyl_mcp::McpService;

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::messages;
use crate::rate_limit::{self, RateLimiter};
use crate::session::registry::{SessionEvent, SessionRegistry};
use crate::shutdown::ShutdownCoordinator;
use crate::sse;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Transport configuration.
    pub config: Arc<ServerConfig>,
    /// Live sessions.
    pub registry: Arc<SessionRegistry>,
    /// The protocol core shared by every session.
    pub service: Arc<McpService>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
}

/// The HTTP transport server.
pub struct SibylServer {
    config: Arc<ServerConfig>,
    service: Arc<McpService>,
    registry: Arc<SessionRegistry>,
    rate_limiter: Arc<RateLimiter>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl SibylServer {
    /// Create a server around one protocol core.
    ///
    /// Registers the open/close logging observer on the fresh registry;
    /// further observers can be added before the listener starts.
    pub fn new(config: ServerConfig, service: Arc<McpService>) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_max,
            config.rate_limit_window,
        ));
        let registry = Arc::new(SessionRegistry::new());
        registry.observe(Box::new(|event| match event {
            SessionEvent::Opened(id) => info!(session = %id, "session opened"),
            SessionEvent::Closed(id) => info!(session = %id, "session closed"),
        }));
        Self {
            config: Arc::new(config),
            service,
            registry,
            rate_limiter,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the router with all routes and layers.
    ///
    /// Request flow: trace, CORS (answers preflights), rate limiter, then
    /// the route handlers, which do their own auth.
    pub fn router(&self) -> Router {
        let state = AppState {
            config: self.config.clone(),
            registry: self.registry.clone(),
            service: self.service.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/sse", get(sse::sse_handler))
            .route("/messages", post(messages::messages_handler))
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(middleware::from_fn_with_state(
                self.rate_limiter.clone(),
                rate_limit::rate_limit_middleware,
            ))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the listener and serve until the shutdown coordinator fires.
    ///
    /// Returns the bound address (port 0 resolves to the ephemeral port)
    /// and the serve task for the caller to drain on shutdown.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "transport listening");

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let token = self.shutdown.token();
        let task = tokio::spawn(async move {
            let serve =
                axum::serve(listener, app).with_graceful_shutdown(async move {
                    token.cancelled().await;
                });
            if let Err(e) = serve.await {
                error!(error = %e, "server terminated with an error");
            }
        });
        Ok((addr, task))
    }

    /// The session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The request limiter.
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }
}

/// `GET /health` — registry size and uptime; never fails.
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let active = state.registry.active_count();
    Json(health::health_check(state.start_time, active))
}

// ─────────────────────────────────────────────────────────────────────────────
