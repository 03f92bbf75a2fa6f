//! Error types for the stdio side of the bridge.
//!
//! `FramingError` covers failures while splitting stdin into lines.
//! `BridgeError` covers everything that ends the bridge process early and maps
//! each failure onto a process exit code.

use mcp_bridge_core::error::{ConfigError, TransportError};

/// Errors produced while reading one inbound line.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    /// A single line exceeds the configured maximum size.
    ///
    /// The rest of the line has already been drained from the reader.
    #[error("line exceeds maximum size of {max_bytes} bytes")]
    LineTooLarge {
        /// The configured maximum line size in bytes.
        max_bytes: usize,
    },

    /// The underlying reader failed.
    #[error("I/O error: {0}")]
    Io(std::io::Error),
}

/// Failures that stop the bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The remote transport could not be constructed.
    #[error("failed to initialize remote transport: {0}")]
    Transport(#[from] TransportError),

    /// Reading stdin failed.
    #[error("failed to read stdin: {0}")]
    Stdin(#[source] std::io::Error),

    /// Writing stdout failed (including a closed pipe).
    #[error("failed to write stdout: {0}")]
    Stdout(#[source] std::io::Error),

    /// The line reader task panicked or was cancelled.
    #[error("line reader task failed: {reason}")]
    ReaderTask {
        /// Join error text.
        reason: String,
    },
}

impl BridgeError {
    /// Process exit code for this failure: 2 for anything that is a startup
    /// configuration problem, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Transport(_) => 2,
            Self::Stdin(_) | Self::Stdout(_) | Self::ReaderTask { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(BridgeError::from(ConfigError::MissingUri).exit_code(), 2);
        assert_eq!(
            BridgeError::from(TransportError::Client {
                reason: "bad token".to_string()
            })
            .exit_code(),
            2
        );
        let broken_pipe = std::io::Error::from(std::io::ErrorKind::BrokenPipe);
        assert_eq!(BridgeError::Stdout(broken_pipe).exit_code(), 1);
        let eio = std::io::Error::other("eio");
        assert_eq!(BridgeError::Stdin(eio).exit_code(), 1);
    }

    #[test]
    fn test_config_error_display() {
        let e = BridgeError::from(ConfigError::MissingUri);
        assert_eq!(e.to_string(), "invalid configuration: URI is required");
    }
}
