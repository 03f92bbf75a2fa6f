//! mcp-bridge: expose a remote streamable-HTTP MCP server to a local client
//! that only speaks newline-delimited JSON-RPC over stdio.
//!
//! The binary wires [`cli`] configuration, [`logging`] and the
//! [`bridge::run_bridge`] loop together; the HTTP side comes from
//! `mcp-bridge-core`.

pub mod bridge;
pub mod cli;
pub mod error;
pub mod logging;
