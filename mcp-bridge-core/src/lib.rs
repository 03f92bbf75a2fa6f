//! mcp-bridge core, the transport half of a stdio ↔ HTTP JSON-RPC bridge.
//!
//! This library knows how to deliver one JSON-RPC message to a remote
//! streamable-HTTP endpoint and turn the response into outbound messages:
//! SSE decoding, HTTP exchange, failure classification and the retry/backoff
//! loop. The local stdio side (line reading, queueing, output) lives in the
//! `mcp-bridge` binary crate.

pub mod config;
pub mod error;
pub mod retry;
pub mod sse;
pub mod transport;
