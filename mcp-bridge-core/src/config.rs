//! Process-wide bridge configuration.
//!
//! Built once at startup (from CLI flags / environment in the `mcp-bridge`
//! binary) and read-only afterwards. Every component receives the pieces it
//! needs by reference or clone.

use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;
use crate::retry::BackoffPolicy;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Default capacity of the inbound message queue.
pub const DEFAULT_MAX_QUEUE: usize = 10_000;

/// Default cap on a response body or a single SSE event (10 MB).
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

/// Default cap on a single inbound stdin line (10 MB).
pub const DEFAULT_MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

/// Label used in diagnostics when `NAME` is not set.
pub const DEFAULT_NAME: &str = "mcp-bridge";

/// Validated bridge configuration.
#[derive(Clone)]
pub struct BridgeConfig {
    /// Remote JSON-RPC endpoint (absolute http/https URL).
    pub uri: String,
    /// Sent as `Authorization: Bearer <token>` when present.
    pub bearer_token: Option<String>,
    /// Label for diagnostics only.
    pub name: String,
    /// Whole-request timeout, including reading the response body.
    pub timeout: Duration,
    /// TCP connect + TLS handshake timeout.
    pub connect_timeout: Duration,
    /// Capacity of the bounded inbound queue.
    pub max_queue: usize,
    /// Maximum size of a response body or of a single SSE event.
    pub max_response_bytes: usize,
    /// Maximum size of a single inbound line.
    pub max_line_bytes: usize,
    /// Retry schedule for network-class failures.
    pub backoff: BackoffPolicy,
}

impl BridgeConfig {
    /// Create a config for `uri` with every other setting at its default.
    pub fn with_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            bearer_token: None,
            name: DEFAULT_NAME.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_queue: DEFAULT_MAX_QUEUE,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Check the configuration for values the bridge cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the URI is missing or not an absolute
    /// http(s) URL, when a size, capacity or timeout is zero, or when the
    /// initial backoff exceeds the maximum backoff.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.uri.trim().is_empty() {
            return Err(ConfigError::MissingUri);
        }

        let url = reqwest::Url::parse(&self.uri).map_err(|e| ConfigError::InvalidUri {
            uri: self.uri.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUri {
                uri: self.uri.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        non_zero("TIMEOUT_MS", self.timeout.as_millis())?;
        non_zero("CONNECT_TIMEOUT_MS", self.connect_timeout.as_millis())?;
        non_zero("MAX_QUEUE", self.max_queue as u128)?;
        non_zero("MAX_RESPONSE_BYTES", self.max_response_bytes as u128)?;
        non_zero("MAX_LINE_BYTES", self.max_line_bytes as u128)?;
        non_zero("INITIAL_BACKOFF_MS", self.backoff.initial.as_millis())?;

        if self.backoff.initial > self.backoff.max {
            return Err(ConfigError::InvalidValue {
                name: "MAX_BACKOFF_MS",
                reason: format!(
                    "must be at least INITIAL_BACKOFF_MS ({}ms), got {}ms",
                    self.backoff.initial.as_millis(),
                    self.backoff.max.as_millis()
                ),
            });
        }

        Ok(())
    }
}

fn non_zero(name: &'static str, value: u128) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

// The bearer token must never reach the logs.
impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("uri", &self.uri)
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "<redacted>"),
            )
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("max_queue", &self.max_queue)
            .field("max_response_bytes", &self.max_response_bytes)
            .field("max_line_bytes", &self.max_line_bytes)
            .field("backoff", &self.backoff)
            .finish()
    }
}
