//! The stdio side of the bridge.
//!
//! Two tasks share one bounded queue:
//!
//! ```text
//! stdin ──► reader ──► [queue, capacity C] ──► pump ──► remote ──► stdout
//! ```
//!
//! The reader runs as a spawned task; the pump runs on the caller's task.
//! [`run_bridge`] returns once the input is exhausted and the queue drained,
//! once shutdown was requested and the in-flight message settled, or as soon
//! as stdin or stdout fails.

pub mod output;
pub mod pump;
pub mod queue;
pub mod reader;

use std::pin::pin;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio_util::sync::CancellationToken;

use mcp_bridge_core::config::{BridgeConfig, DEFAULT_MAX_LINE_BYTES, DEFAULT_MAX_QUEUE};
use mcp_bridge_core::retry::{BackoffPolicy, RetryController};
use mcp_bridge_core::transport::RemoteTransport;

use crate::error::BridgeError;
use pump::{Pump, PumpStats};
use reader::{ReaderStats, read_lines};

/// Settings for one bridge run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Capacity of the inbound queue.
    pub max_queue: usize,
    /// Maximum size of one inbound line.
    pub max_line_bytes: usize,
    /// Retry schedule for network failures.
    pub backoff: BackoffPolicy,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            max_queue: DEFAULT_MAX_QUEUE,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl From<&BridgeConfig> for BridgeOptions {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            max_queue: config.max_queue,
            max_line_bytes: config.max_line_bytes,
            backoff: config.backoff,
        }
    }
}

/// What happened during a bridge run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeSummary {
    /// Line reader counters.
    pub reader: ReaderStats,
    /// Bridge loop counters.
    pub pump: PumpStats,
}

impl BridgeSummary {
    /// 0 when every accepted message was handled, 1 when shutdown left work
    /// behind.
    pub fn exit_code(&self) -> i32 {
        if self.pump.abandoned > 0
            || self.pump.dropped_on_shutdown > 0
            || self.reader.dropped_on_shutdown > 0
        {
            1
        } else {
            0
        }
    }

    /// Emit the end-of-run summary.
    pub fn log(&self) {
        tracing::info!(
            received = self.reader.enqueued,
            delivered = self.pump.delivered,
            outputs = self.pump.outputs,
            failed = self.pump.failed,
            abandoned = self.pump.abandoned,
            dropped_on_shutdown = self.pump.dropped_on_shutdown,
            unqueued_on_shutdown = self.reader.dropped_on_shutdown,
            dropped_invalid_utf8 = self.reader.dropped_invalid_utf8,
            dropped_too_large = self.reader.dropped_too_large,
            "bridge stopped"
        );
    }
}

/// Bridge `input` to `output` through `transport`.
///
/// # Errors
///
/// Returns [`BridgeError::Stdin`] or [`BridgeError::Stdout`] on a local I/O
/// failure; the message in flight at that moment is abandoned.
pub async fn run_bridge<R, W, T>(
    input: R,
    output: W,
    transport: T,
    options: BridgeOptions,
    shutdown: CancellationToken,
) -> Result<BridgeSummary, BridgeError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
    T: RemoteTransport,
{
    let (tx, rx) = queue::message_queue(options.max_queue);

    let mut reader_task = tokio::spawn(read_lines(
        BufReader::new(input),
        tx,
        options.max_line_bytes,
        shutdown.clone(),
    ));

    let pump = Pump::new(RetryController::new(transport, options.backoff), output);
    let mut pump_run = pin!(pump.run(rx, &shutdown));

    let mut reader_stats = None;
    let pump_result = loop {
        tokio::select! {
            result = &mut pump_run => break result,
            joined = &mut reader_task, if reader_stats.is_none() => {
                match flatten_join(joined) {
                    Ok(stats) => reader_stats = Some(stats),
                    Err(e) => return Err(e),
                }
            }
        }
    };

    let pump_stats = match pump_result {
        Ok(stats) => stats,
        Err(e) => {
            reader_task.abort();
            return Err(e);
        }
    };

    // The pump only stops once the reader dropped its sender or shutdown was
    // requested; in both cases the reader is finished or about to be.
    let reader_stats = match reader_stats {
        Some(stats) => stats,
        None => flatten_join(reader_task.await)?,
    };

    Ok(BridgeSummary {
        reader: reader_stats,
        pump: pump_stats,
    })
}

fn flatten_join(
    joined: Result<Result<ReaderStats, BridgeError>, tokio::task::JoinError>,
) -> Result<ReaderStats, BridgeError> {
    joined.map_err(|e| BridgeError::ReaderTask {
        reason: e.to_string(),
    })?
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::task::{Context, Poll};
    use std::time::Duration;

    use async_trait::async_trait;
    use mcp_bridge_core::error::TransportError;
    use tokio::io::{AsyncWriteExt, ReadBuf};

    use super::*;

    /// Echoes every message back, wrapped in a result envelope.
    #[derive(Default)]
    struct EchoTransport {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RemoteTransport for EchoTransport {
        async fn send(&self, message: &str) -> Result<Vec<String>, TransportError> {
            self.seen.lock().unwrap().push(message.to_string());
            Ok(vec![format!(r#"{{"echo":{message}}}"#)])
        }
    }

    /// Never answers successfully.
    struct DownTransport;

    #[async_trait]
    impl RemoteTransport for DownTransport {
        async fn send(&self, _message: &str) -> Result<Vec<String>, TransportError> {
            Err(TransportError::Connect {
                uri: "http://127.0.0.1:1/mcp".to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    /// Reader whose every read fails.
    struct FailingReader;

    impl AsyncRead for FailingReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::other("stdin exploded")))
        }
    }

    #[tokio::test]
    async fn test_bridges_until_input_closes() {
        let input: &'static [u8] = b"{\"id\":1}\n\n{\"id\":2}\n";
        let mut out = Vec::new();

        let summary = run_bridge(
            input,
            &mut out,
            EchoTransport::default(),
            BridgeOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"echo\":{\"id\":1}}\n{\"echo\":{\"id\":2}}\n"
        );
        assert_eq!(summary.reader.enqueued, 2);
        assert_eq!(summary.reader.skipped_blank, 1);
        assert_eq!(summary.pump.delivered, 2);
        assert_eq!(summary.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_small_queue_preserves_order() {
        let input: String = (0..50).map(|i| format!("{{\"id\":{i}}}\n")).collect();
        let input: &'static [u8] = Box::leak(input.into_bytes().into_boxed_slice());
        let mut out = Vec::new();
        let options = BridgeOptions {
            max_queue: 1,
            ..BridgeOptions::default()
        };

        run_bridge(
            input,
            &mut out,
            EchoTransport::default(),
            options,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let expected: String = (0..50)
            .map(|i| format!("{{\"echo\":{{\"id\":{i}}}}}\n"))
            .collect();
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_stdin_failure_is_fatal() {
        let mut out = Vec::new();
        let err = run_bridge(
            FailingReader,
            &mut out,
            EchoTransport::default(),
            BridgeOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BridgeError::Stdin(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_with_open_input() {
        let (mut client, server) = tokio::io::duplex(1024);
        client.write_all(b"{\"id\":1}\n{\"id\":2}\n").await.unwrap();

        let shutdown = CancellationToken::new();
        let canceller = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                shutdown.cancel();
            })
        };

        let mut out = Vec::new();
        let summary = run_bridge(
            server,
            &mut out,
            DownTransport,
            BridgeOptions::default(),
            shutdown,
        )
        .await
        .unwrap();
        canceller.await.unwrap();

        assert!(out.is_empty());
        assert_eq!(summary.pump.abandoned, 1);
        assert_eq!(summary.pump.dropped_on_shutdown, 1);
        assert_eq!(summary.exit_code(), 1);
        drop(client);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_with_full_queue_counts_held_line() {
        let (mut client, server) = tokio::io::duplex(1024);
        client
            .write_all(b"{\"id\":1}\n{\"id\":2}\n{\"id\":3}\n")
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        let canceller = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                shutdown.cancel();
            })
        };

        let options = BridgeOptions {
            max_queue: 1,
            ..BridgeOptions::default()
        };
        let summary = run_bridge(server, Vec::new(), DownTransport, options, shutdown)
            .await
            .unwrap();
        canceller.await.unwrap();

        // 1 is retried, 2 waits in the queue, 3 is held by the blocked reader.
        assert_eq!(summary.pump.abandoned, 1);
        assert_eq!(summary.pump.dropped_on_shutdown, 1);
        assert_eq!(summary.reader.dropped_on_shutdown, 1);
        assert_eq!(summary.exit_code(), 1);
        drop(client);
    }

    #[test]
    fn test_reader_drop_alone_fails_the_run() {
        let mut summary = BridgeSummary::default();
        assert_eq!(summary.exit_code(), 0);
        summary.reader.dropped_on_shutdown = 1;
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn test_options_from_config() {
        let mut config = BridgeConfig::with_uri("http://localhost:3000/mcp");
        config.max_queue = 3;
        config.max_line_bytes = 99;
        let options = BridgeOptions::from(&config);
        assert_eq!(options.max_queue, 3);
        assert_eq!(options.max_line_bytes, 99);
        assert_eq!(options.backoff, BackoffPolicy::default());
    }
}
