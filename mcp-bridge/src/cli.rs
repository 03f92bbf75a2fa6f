//! Command-line / environment configuration.
//!
//! Every setting can be given as a flag or through the environment variable
//! of the same name (`--timeout-ms` / `TIMEOUT_MS`); flags win. The parsed
//! arguments are turned into a validated [`BridgeConfig`] before anything
//! else starts.
//!
//! These types live outside `main.rs` so integration tests can parse them.

use std::time::Duration;

use clap::{Parser, ValueEnum};

use mcp_bridge_core::config::{
    BridgeConfig, DEFAULT_MAX_LINE_BYTES, DEFAULT_MAX_QUEUE, DEFAULT_MAX_RESPONSE_BYTES,
    DEFAULT_NAME, DEFAULT_TIMEOUT_MS,
};
use mcp_bridge_core::error::ConfigError;
use mcp_bridge_core::retry::{BackoffPolicy, DEFAULT_INITIAL_BACKOFF_MS, DEFAULT_MAX_BACKOFF_MS};

/// Bridge a stdio JSON-RPC client to a remote streamable-HTTP MCP server.
///
/// Reads newline-delimited JSON-RPC messages from stdin, POSTs each one to
/// URI and writes the responses to stdout, one per line. Diagnostics go to
/// stderr.
#[derive(Parser, Debug, Clone)]
#[command(name = "mcp-bridge", version)]
pub struct BridgeArgs {
    /// Remote MCP endpoint (absolute http or https URL).
    #[arg(long, env = "URI")]
    pub uri: String,

    /// Sent as `Authorization: Bearer <token>`.
    #[arg(long, env = "BEARER_TOKEN", hide_env_values = true)]
    pub bearer_token: Option<String>,

    /// Label used in diagnostics.
    #[arg(long, env = "NAME", default_value = DEFAULT_NAME)]
    pub name: String,

    /// Per-request timeout in milliseconds, including reading the body.
    #[arg(long, env = "TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,

    /// Connect timeout in milliseconds [default: TIMEOUT_MS].
    #[arg(long, env = "CONNECT_TIMEOUT_MS")]
    pub connect_timeout_ms: Option<u64>,

    /// Capacity of the inbound queue; reading stdin pauses while it is full.
    #[arg(long, env = "MAX_QUEUE", default_value_t = DEFAULT_MAX_QUEUE)]
    pub max_queue: usize,

    /// Maximum size of a response body or of one event-stream event.
    #[arg(long, env = "MAX_RESPONSE_BYTES", default_value_t = DEFAULT_MAX_RESPONSE_BYTES)]
    pub max_response_bytes: usize,

    /// Maximum size of one stdin line; longer lines are dropped.
    #[arg(long, env = "MAX_LINE_BYTES", default_value_t = DEFAULT_MAX_LINE_BYTES)]
    pub max_line_bytes: usize,

    /// Delay before the first retry of a network failure, in milliseconds.
    #[arg(long, env = "INITIAL_BACKOFF_MS", default_value_t = DEFAULT_INITIAL_BACKOFF_MS)]
    pub initial_backoff_ms: u64,

    /// Upper bound for the delay between retries, in milliseconds.
    #[arg(long, env = "MAX_BACKOFF_MS", default_value_t = DEFAULT_MAX_BACKOFF_MS)]
    pub max_backoff_ms: u64,

    /// Log filter (`info`, `debug`, `mcp_bridge=trace`, ...) [default: RUST_LOG, then info].
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

/// Diagnostic output format on stderr.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl BridgeArgs {
    /// Build and validate the bridge configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a value is out of range; see
    /// [`BridgeConfig::validate`].
    pub fn to_config(&self) -> Result<BridgeConfig, ConfigError> {
        let timeout = Duration::from_millis(self.timeout_ms);
        let config = BridgeConfig {
            uri: self.uri.trim().to_string(),
            bearer_token: self
                .bearer_token
                .as_ref()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            name: self.name.clone(),
            timeout,
            connect_timeout: self
                .connect_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(timeout),
            max_queue: self.max_queue,
            max_response_bytes: self.max_response_bytes,
            max_line_bytes: self.max_line_bytes,
            backoff: BackoffPolicy {
                initial: Duration::from_millis(self.initial_backoff_ms),
                max: Duration::from_millis(self.max_backoff_ms),
            },
        };
        config.validate()?;
        Ok(config)
    }
}
