//! HTTP implementation of [`RemoteTransport`].
//!
//! One POST per inbound message. The response is turned into outbound
//! messages according to its status and content type:
//!
//! | Response                         | Outbound messages              |
//! |----------------------------------|--------------------------------|
//! | 202 / 204                        | none                           |
//! | 2xx `text/event-stream`          | one per decoded event, in order|
//! | any other status, non-empty body | the body, once                 |
//! | any other status, empty body     | none                           |
//!
//! Network-class failures (connect, timeout, interrupted request) come back as
//! retryable [`TransportError`] variants; everything that goes wrong after the
//! status line arrived is terminal for the message, including the request
//! timeout firing while a slow body or a long event stream is still open.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use super::RemoteTransport;
use crate::config::BridgeConfig;
use crate::error::{SseStreamError, TransportError};
use crate::sse::decode_stream;

/// `Accept` header sent with every request.
pub const ACCEPT_VALUE: &str = "application/json, text/event-stream";

const EVENT_STREAM: &str = "text/event-stream";

/// Sends messages to the configured endpoint with a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    uri: String,
    timeout: Duration,
    max_response_bytes: usize,
}

impl HttpTransport {
    /// Build the client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Client`] if the bearer token is not a valid
    /// header value or the TLS backend cannot be initialized.
    pub fn new(config: &BridgeConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
        if let Some(token) = &config.bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                TransportError::Client {
                    reason: "BEARER_TOKEN contains characters not allowed in a header".to_string(),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("mcp-bridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Client {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            uri: config.uri.clone(),
            timeout: config.timeout,
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// The endpoint requests are sent to.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Read a non-streaming body with a size limit.
    ///
    /// Rejects early on `Content-Length`, then enforces the limit while
    /// reading so chunked responses cannot grow without bound.
    async fn read_body_limited(
        &self,
        mut response: reqwest::Response,
    ) -> Result<Vec<u8>, TransportError> {
        let max_size = self.max_response_bytes;

        if let Some(content_length) = response.content_length() {
            if content_length > max_size as u64 {
                warn!(
                    content_length,
                    max_response_bytes = max_size,
                    "Response exceeds size limit (Content-Length)"
                );
                return Err(TransportError::ResponseTooLarge {
                    max_bytes: max_size,
                });
            }
        }

        let mut buf = Vec::with_capacity(
            response
                .content_length()
                .map(|cl| cl as usize)
                .unwrap_or(8192)
                .min(max_size),
        );

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.classify_body_error(e))?
        {
            if buf.len() + chunk.len() > max_size {
                warn!(
                    accumulated = buf.len(),
                    chunk_size = chunk.len(),
                    max_response_bytes = max_size,
                    "Response exceeds size limit during streaming"
                );
                return Err(TransportError::ResponseTooLarge {
                    max_bytes: max_size,
                });
            }
            buf.extend_from_slice(&chunk);
        }

        Ok(buf)
    }

    /// Decode an event-stream body, collecting every event before returning
    /// so a decode fault never leaves partial output behind.
    async fn read_event_stream(
        &self,
        response: reqwest::Response,
    ) -> Result<Vec<String>, TransportError> {
        let events = decode_stream(response.bytes_stream(), self.max_response_bytes);
        futures_util::pin_mut!(events);

        let mut messages = Vec::new();
        while let Some(event) = events.next().await {
            match event {
                Ok(message) => messages.push(message),
                Err(SseStreamError::Source(e)) => return Err(self.classify_body_error(e)),
                Err(SseStreamError::Decode(e)) => return Err(TransportError::Sse(e)),
            }
        }
        Ok(messages)
    }

    /// Map an error raised before the response headers arrived onto the
    /// transport taxonomy. Only these can be retryable.
    fn classify_error(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout {
                uri: self.uri.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else if error.is_connect() {
            TransportError::Connect {
                uri: self.uri.clone(),
                reason: error_chain(&error),
            }
        } else if error.is_request() {
            TransportError::Request {
                uri: self.uri.clone(),
                reason: error_chain(&error),
            }
        } else {
            TransportError::Body {
                reason: error_chain(&error),
            }
        }
    }

    /// Map an error raised while reading the body. The remote has already
    /// seen the message, so none of these are retryable; resending an event
    /// stream that outlived the timeout would only replay it.
    fn classify_body_error(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::BodyTimeout {
                uri: self.uri.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            TransportError::Body {
                reason: error_chain(&error),
            }
        }
    }
}

#[async_trait]
impl RemoteTransport for HttpTransport {
    #[tracing::instrument(skip(self, message), fields(bytes = message.len()))]
    async fn send(&self, message: &str) -> Result<Vec<String>, TransportError> {
        let response = self
            .client
            .post(&self.uri)
            .body(message.to_owned())
            .send()
            .await
            .map_err(|e| self.classify_error(e))?;

        let status = response.status();
        debug!(status = status.as_u16(), "Received response");

        if status == StatusCode::ACCEPTED || status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }

        if status.is_success() && is_event_stream(response.headers()) {
            return self.read_event_stream(response).await;
        }

        let body = self.read_body_limited(response).await?;
        let body = String::from_utf8(body).map_err(|_| TransportError::InvalidUtf8)?;
        let body = body.trim_end_matches(['\r', '\n']);

        if status.is_client_error() || status.is_server_error() {
            if body.trim().is_empty() {
                warn!(
                    status = status.as_u16(),
                    "Remote returned an error status with an empty body, nothing to forward"
                );
                return Ok(Vec::new());
            }
            warn!(
                status = status.as_u16(),
                "Remote returned an error status, forwarding body"
            );
        }

        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![body.to_string()])
    }
}

fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains(EVENT_STREAM))
}

/// Render an error with its sources; reqwest's top-level message alone rarely
/// names the actual cause.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
