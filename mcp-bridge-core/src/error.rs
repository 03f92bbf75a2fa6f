//! Error types shared by the bridge components.
//!
//! `SseError` covers framing failures while decoding an event stream.
//! `TransportError` covers everything that can go wrong while exchanging one
//! message with the remote endpoint, and knows which failures are worth
//! retrying. `ConfigError` covers invalid startup configuration.

// ─────────────────────────────────────────────────────────────────────────────
// SSE Decode Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors produced by the SSE decoder.
///
/// All variants are decode faults: the response was received but could not be
/// turned into messages. None of them are retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SseError {
    /// A line of the event stream is not valid UTF-8.
    #[error("event stream line {line} is not valid UTF-8")]
    InvalidUtf8 {
        /// 1-based line number within the stream.
        line: usize,
    },

    /// A single event (or a single unterminated line) grew past the limit.
    #[error("event exceeds maximum size of {max_bytes} bytes")]
    EventTooLarge {
        /// The configured maximum event size in bytes.
        max_bytes: usize,
    },
}

/// Error yielded by [`crate::sse::decode_stream`].
///
/// Keeps failures of the underlying byte source apart from decode failures so
/// the caller can classify them independently.
#[derive(Debug, thiserror::Error)]
pub enum SseStreamError<E> {
    /// The byte source itself failed (e.g. the HTTP body read timed out).
    #[error("event stream source failed: {0}")]
    Source(E),

    /// The bytes could not be decoded into events.
    #[error(transparent)]
    Decode(#[from] SseError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors from a single exchange with the remote endpoint.
///
/// Network-class variants (`Connect`, `Timeout`, `Request`) happen below the
/// application layer and are retried by [`crate::retry::RetryController`].
/// Every other variant means a response arrived but could not be used.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection refused or reset, DNS failure, or TLS handshake failure.
    #[error("failed to connect to {uri}: {reason}")]
    Connect {
        /// The remote endpoint.
        uri: String,
        /// Underlying error text.
        reason: String,
    },

    /// No response headers arrived within the configured timeout.
    #[error("request to {uri} timed out after {timeout_ms}ms")]
    Timeout {
        /// The remote endpoint.
        uri: String,
        /// The configured request timeout.
        timeout_ms: u64,
    },

    /// The request could not be sent (interrupted before a response arrived).
    #[error("request to {uri} failed: {reason}")]
    Request {
        /// The remote endpoint.
        uri: String,
        /// Underlying error text.
        reason: String,
    },

    /// The response body could not be read after the status line arrived.
    #[error("failed to read response body: {reason}")]
    Body {
        /// Underlying error text.
        reason: String,
    },

    /// The request timeout fired while the response body was still being
    /// read. The remote already accepted the message, so it is not resent.
    #[error("response body from {uri} still incomplete after {timeout_ms}ms")]
    BodyTimeout {
        /// The remote endpoint.
        uri: String,
        /// The configured request timeout.
        timeout_ms: u64,
    },

    /// The response body is larger than the configured limit.
    #[error("response body exceeds maximum size of {max_bytes} bytes")]
    ResponseTooLarge {
        /// The configured maximum response size in bytes.
        max_bytes: usize,
    },

    /// The response body is not valid UTF-8.
    #[error("response body is not valid UTF-8")]
    InvalidUtf8,

    /// The event stream could not be decoded.
    #[error("malformed event stream: {0}")]
    Sse(#[from] SseError),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {reason}")]
    Client {
        /// Underlying error text.
        reason: String,
    },
}

impl TransportError {
    /// Whether this failure happened below the application layer and the
    /// message may be sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Timeout { .. } | Self::Request { .. }
        )
    }

    /// Short machine-readable label used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Timeout { .. } => "timeout",
            Self::Request { .. } => "request",
            Self::Body { .. } => "body",
            Self::BodyTimeout { .. } => "body_timeout",
            Self::ResponseTooLarge { .. } => "response_too_large",
            Self::InvalidUtf8 => "invalid_utf8",
            Self::Sse(_) => "malformed_sse",
            Self::Client { .. } => "client",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Invalid startup configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The remote endpoint is empty.
    #[error("URI is required")]
    MissingUri,

    /// The remote endpoint is not an absolute http(s) URL.
    #[error("URI '{uri}' is invalid: {reason}")]
    InvalidUri {
        /// The rejected value.
        uri: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A numeric setting is zero or otherwise out of range.
    #[error("{name} is invalid: {reason}")]
    InvalidValue {
        /// Environment variable / flag name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_errors_are_retryable() {
        let connect = TransportError::Connect {
            uri: "http://x".to_string(),
            reason: "refused".to_string(),
        };
        let timeout = TransportError::Timeout {
            uri: "http://x".to_string(),
            timeout_ms: 10,
        };
        let request = TransportError::Request {
            uri: "http://x".to_string(),
            reason: "reset".to_string(),
        };
        assert!(connect.is_retryable());
        assert!(timeout.is_retryable());
        assert!(request.is_retryable());
    }

    #[test]
    fn test_post_response_errors_are_not_retryable() {
        let errors = [
            TransportError::Body {
                reason: "eof".to_string(),
            },
            TransportError::BodyTimeout {
                uri: "http://x".to_string(),
                timeout_ms: 10,
            },
            TransportError::ResponseTooLarge { max_bytes: 1 },
            TransportError::InvalidUtf8,
            TransportError::Sse(SseError::InvalidUtf8 { line: 3 }),
            TransportError::Client {
                reason: "tls".to_string(),
            },
        ];
        for e in errors {
            assert!(!e.is_retryable(), "{} should not be retryable", e.kind());
        }
    }

    #[test]
    fn test_sse_error_display() {
        let e = TransportError::from(SseError::EventTooLarge { max_bytes: 64 });
        assert_eq!(
            e.to_string(),
            "malformed event stream: event exceeds maximum size of 64 bytes"
        );
    }
}
