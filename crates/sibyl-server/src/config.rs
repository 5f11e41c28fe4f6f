//! Server configuration, resolved once at startup.

use std::time::Duration;

use tracing::warn;

/// Environment variable naming the transport API key.
pub const API_KEY_ENV: &str = "MCP_API_KEY";
/// Environment variable overriding the listen port.
pub const PORT_ENV: &str = "PORT";
/// Environment variable overriding the per-client request budget.
pub const RATE_LIMIT_MAX_ENV: &str = "SIBYL_RATE_LIMIT_MAX";
/// Environment variable overriding the rate-limit window, in seconds.
pub const RATE_LIMIT_WINDOW_ENV: &str = "SIBYL_RATE_LIMIT_WINDOW_SECS";

/// Shipped placeholder key. The server warns loudly when it is still in use.
pub const DEFAULT_API_KEY: &str = "changeme-secure-key-123";

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port to bind. Port 0 asks the OS for an ephemeral port.
    pub port: u16,
    /// Shared secret every `/sse` and `/messages` request must present.
    pub api_key: String,
    /// Requests allowed per client within one rate-limit window.
    pub rate_limit_max: usize,
    /// Length of the rate-limit window.
    pub rate_limit_window: Duration,
    /// Capacity of each session's inbound and outbound queues.
    pub session_queue_depth: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 3002,
            api_key: DEFAULT_API_KEY.to_owned(),
            rate_limit_max: 100,
            rate_limit_window: Duration::from_secs(15 * 60),
            session_queue_depth: 64,
        }
    }
}

impl ServerConfig {
    /// Resolve the configuration from process environment variables.
    ///
    /// Unset variables keep their defaults; unparseable values are logged
    /// and skipped rather than treated as fatal.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(key) = non_empty(lookup(API_KEY_ENV)) {
            config.api_key = key;
        }
        if let Some(port) = parse(PORT_ENV, lookup(PORT_ENV)) {
            config.port = port;
        }
        if let Some(max) = parse(RATE_LIMIT_MAX_ENV, lookup(RATE_LIMIT_MAX_ENV)) {
            config.rate_limit_max = max;
        }
        if let Some(secs) = parse::<u64>(RATE_LIMIT_WINDOW_ENV, lookup(RATE_LIMIT_WINDOW_ENV)) {
            config.rate_limit_window = Duration::from_secs(secs);
        }
        config
    }

    /// Whether the shipped placeholder key is still in use.
    #[must_use]
    pub fn uses_default_api_key(&self) -> bool {
        self.api_key == DEFAULT_API_KEY
    }

    /// Address string suitable for `TcpListener::bind`.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse<T: std::str::FromStr>(name: &str, value: Option<String>) -> Option<T> {
    let raw = non_empty(value)?;
    match raw.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
