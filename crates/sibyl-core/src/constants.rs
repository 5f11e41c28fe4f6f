//! Package-level constants.

/// Current version of the sibyl server (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name advertised in the MCP `initialize` handshake.
pub const NAME: &str = "sibyl";
