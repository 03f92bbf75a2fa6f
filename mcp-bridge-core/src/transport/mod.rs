//! Remote side of the bridge.
//!
//! [`RemoteTransport`] is the seam between the bridge loop and the network;
//! [`HttpTransport`] is the production implementation. Tests substitute
//! in-memory transports.

mod http;

pub use http::{ACCEPT_VALUE, HttpTransport};

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportError;

/// Exchanges one message with the remote endpoint.
///
/// A call sends exactly one request and resolves to the outbound messages it
/// produced, in order. Calls are never issued concurrently by the bridge.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Send one inbound message and collect the resulting outbound messages.
    async fn send(&self, message: &str) -> Result<Vec<String>, TransportError>;
}

#[async_trait]
impl<T: RemoteTransport + ?Sized> RemoteTransport for Arc<T> {
    async fn send(&self, message: &str) -> Result<Vec<String>, TransportError> {
        (**self).send(message).await
    }
}
