//! Bridge loop: queue → remote → stdout.
//!
//! Pops one message at a time, hands it to the retry controller and writes
//! the outbound messages it produced in order. The next message is only
//! popped once the previous one has been fully handled, so responses reach
//! stdout in input order and at most one request is in flight.

use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use mcp_bridge_core::retry::{Delivery, RetryController};
use mcp_bridge_core::transport::RemoteTransport;

use super::output::OutputWriter;
use super::queue::{QueueReceiver, QueuedMessage};
use crate::error::BridgeError;

/// Counters reported by the bridge loop when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Messages the remote answered (including with an empty response).
    pub delivered: u64,
    /// Outbound lines written to stdout.
    pub outputs: u64,
    /// Messages that failed with a non-retryable error.
    pub failed: u64,
    /// Messages given up on during shutdown while waiting to be retried.
    pub abandoned: u64,
    /// Messages still queued when shutdown stopped the loop.
    pub dropped_on_shutdown: u64,
}

/// Drives messages from the queue through the remote transport to stdout.
#[derive(Debug)]
pub struct Pump<T, W> {
    controller: RetryController<T>,
    output: OutputWriter<W>,
    stats: PumpStats,
}

impl<T, W> Pump<T, W>
where
    T: RemoteTransport,
    W: AsyncWrite + Unpin,
{
    /// Create a loop sending through `controller` and writing to `output`.
    pub fn new(controller: RetryController<T>, output: W) -> Self {
        Self {
            controller,
            output: OutputWriter::new(output),
            stats: PumpStats::default(),
        }
    }

    /// Run until the queue is closed and drained, or shutdown is requested.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Stdout`] when writing an outbound message fails.
    /// Remote failures never end the loop.
    pub async fn run(
        mut self,
        mut queue: QueueReceiver,
        shutdown: &CancellationToken,
    ) -> Result<PumpStats, BridgeError> {
        loop {
            if shutdown.is_cancelled() {
                self.stats.dropped_on_shutdown += discard_pending(&mut queue);
                if self.stats.dropped_on_shutdown > 0 {
                    tracing::warn!(
                        dropped = self.stats.dropped_on_shutdown,
                        "shutdown requested, dropping queued messages"
                    );
                }
                break;
            }

            let message = tokio::select! {
                biased;
                _ = shutdown.cancelled() => continue,
                message = queue.recv() => match message {
                    Some(message) => message,
                    None => {
                        tracing::debug!("queue closed and drained");
                        break;
                    }
                },
            };

            let span = tracing::info_span!("message", seq = message.seq);
            self.handle(message, shutdown).instrument(span).await?;
        }

        Ok(self.stats)
    }

    async fn handle(
        &mut self,
        message: QueuedMessage,
        shutdown: &CancellationToken,
    ) -> Result<(), BridgeError> {
        tracing::debug!(
            queue_wait_ms = message.enqueued_at.elapsed().as_millis() as u64,
            bytes = message.payload.len(),
            "sending message"
        );

        match self.controller.deliver(&message.payload, shutdown).await {
            Delivery::Delivered { messages, attempts } => {
                self.stats.delivered += 1;
                for outbound in &messages {
                    self.output
                        .write_message(outbound)
                        .await
                        .map_err(BridgeError::Stdout)?;
                    self.stats.outputs += 1;
                }
                tracing::debug!(attempts, outputs = messages.len(), "message handled");
            }
            Delivery::Failed { error, attempts } => {
                self.stats.failed += 1;
                tracing::error!(
                    attempts,
                    error_kind = error.kind(),
                    error = %error,
                    "message failed, no response forwarded"
                );
            }
            Delivery::Abandoned {
                last_error,
                attempts,
            } => {
                self.stats.abandoned += 1;
                tracing::warn!(
                    attempts,
                    last_error = %last_error,
                    "shutdown requested during retry, abandoning message"
                );
            }
        }
        Ok(())
    }
}

/// Close the queue and count what was still in it.
fn discard_pending(queue: &mut QueueReceiver) -> u64 {
    queue.close();
    let mut dropped = 0;
    while queue.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}
