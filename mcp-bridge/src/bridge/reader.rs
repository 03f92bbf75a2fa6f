//! Line reader: stdin → bounded queue.
//!
//! Splits the input into `\n`-terminated lines (a trailing `\r` is dropped),
//! skips blank lines and drops lines that are not valid UTF-8 or exceed the
//! size limit. Every other line is pushed onto the queue, waiting for space
//! when the queue is full.

use std::time::Duration;

use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;

use super::queue::{QueueSender, QueuedMessage};
use crate::error::{BridgeError, FramingError};

/// Upper bound on draining the remainder of an oversized line.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Counters reported by the line reader when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Lines pushed onto the queue.
    pub enqueued: u64,
    /// Empty or whitespace-only lines skipped.
    pub skipped_blank: u64,
    /// Lines dropped because they were not valid UTF-8.
    pub dropped_invalid_utf8: u64,
    /// Lines dropped because they exceeded the size limit.
    pub dropped_too_large: u64,
    /// Lines already read but never queued because the bridge was stopping.
    pub dropped_on_shutdown: u64,
}

impl ReaderStats {
    /// Lines dropped as local faults.
    pub fn dropped(&self) -> u64 {
        self.dropped_invalid_utf8 + self.dropped_too_large
    }
}

/// Read lines until end of input, shutdown, or a read error.
///
/// Returning drops `queue`, which tells the bridge loop that no more messages
/// will arrive once the queue is drained.
///
/// # Errors
///
/// Returns [`BridgeError::Stdin`] when the underlying reader fails. Encoding
/// problems and oversized lines are not errors: the line is dropped and
/// reading continues.
pub async fn read_lines<R>(
    mut reader: R,
    queue: QueueSender,
    max_line_bytes: usize,
    shutdown: CancellationToken,
) -> Result<ReaderStats, BridgeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = ReaderStats::default();
    let mut raw_buf = Vec::new();
    let mut seq = 0u64;

    loop {
        raw_buf.clear();

        let bytes_read = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::debug!("line reader: shutdown requested");
                break;
            }
            result = bounded_read_line(&mut reader, &mut raw_buf, max_line_bytes) => {
                match result {
                    Ok(n) => n,
                    Err(FramingError::LineTooLarge { max_bytes }) => {
                        stats.dropped_too_large += 1;
                        tracing::warn!(max_bytes, "inbound line exceeded size limit, dropping");
                        continue;
                    }
                    Err(FramingError::Io(e)) => {
                        tracing::error!(error = %e, "failed to read stdin");
                        return Err(BridgeError::Stdin(e));
                    }
                }
            }
        };

        if bytes_read == 0 {
            tracing::debug!(enqueued = stats.enqueued, "stdin closed");
            break;
        }

        strip_line_terminator(&mut raw_buf);

        // Lossy conversion would smuggle U+FFFD into the JSON payload.
        let line = match String::from_utf8(std::mem::take(&mut raw_buf)) {
            Ok(line) => line,
            Err(e) => {
                stats.dropped_invalid_utf8 += 1;
                tracing::warn!(
                    len = e.as_bytes().len(),
                    valid_up_to = e.utf8_error().valid_up_to(),
                    "inbound line is not valid UTF-8, dropping"
                );
                continue;
            }
        };

        if line.trim().is_empty() {
            stats.skipped_blank += 1;
            continue;
        }

        seq += 1;
        let message = QueuedMessage::new(seq, line);

        let sent = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                stats.dropped_on_shutdown += 1;
                tracing::warn!(seq, "shutdown while waiting for queue space, dropping line");
                break;
            }
            sent = queue.send(message) => sent,
        };
        if sent.is_err() {
            stats.dropped_on_shutdown += 1;
            tracing::debug!(seq, "bridge loop stopped, line reader exiting");
            break;
        }
        stats.enqueued += 1;
    }

    Ok(stats)
}

fn strip_line_terminator(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bounded Line Reading
// ─────────────────────────────────────────────────────────────────────────────

/// Read a single line, enforcing a byte limit.
///
/// Bytes are accumulated raw so multi-byte characters split across internal
/// buffer boundaries survive; the caller validates UTF-8 on the full line.
/// An oversized line is drained up to its newline so the next read starts on
/// a fresh line.
///
/// # Returns
///
/// - `Ok(n)` where `n > 0`: a line (including its `\n`, if any) is in `buf`
/// - `Ok(0)`: end of input
/// - `Err(FramingError::LineTooLarge)`: the line exceeded `max_bytes`
/// - `Err(FramingError::Io)`: the reader failed
async fn bounded_read_line<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_bytes: usize,
) -> Result<usize, FramingError>
where
    R: AsyncBufRead + Unpin,
{
    use tokio::io::AsyncBufReadExt;

    // The limit applies to the content; the terminator does not count.
    let limit = max_bytes.saturating_add(2);
    let mut total = 0usize;
    loop {
        let available = reader.fill_buf().await.map_err(FramingError::Io)?;

        if available.is_empty() {
            if total > max_bytes {
                return Err(FramingError::LineTooLarge { max_bytes });
            }
            return Ok(total);
        }

        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let to_consume = pos + 1;
                if content_len(buf, &available[..to_consume]) > max_bytes {
                    reader.consume(to_consume);
                    return Err(FramingError::LineTooLarge { max_bytes });
                }

                buf.extend_from_slice(&available[..to_consume]);
                total += to_consume;
                reader.consume(to_consume);
                return Ok(total);
            }
            None => {
                let len = available.len();
                if total + len > limit {
                    reader.consume(len);
                    drain_until_newline(reader).await?;
                    return Err(FramingError::LineTooLarge { max_bytes });
                }

                buf.extend_from_slice(available);
                total += len;
                reader.consume(len);
            }
        }
    }
}

/// Length of `buf + tail` without the line terminator.
fn content_len(buf: &[u8], tail: &[u8]) -> usize {
    let mut len = buf.len() + tail.len();
    let mut from_end = buf.iter().chain(tail).rev();
    if from_end.next() == Some(&b'\n') {
        len -= 1;
        if from_end.next() == Some(&b'\r') {
            len -= 1;
        }
    }
    len
}

/// Skip the rest of an oversized line, up to and including its newline.
async fn drain_until_newline<R>(reader: &mut R) -> Result<(), FramingError>
where
    R: AsyncBufRead + Unpin,
{
    use tokio::io::AsyncBufReadExt;

    let drain = async {
        loop {
            let available = reader.fill_buf().await.map_err(FramingError::Io)?;
            if available.is_empty() {
                return Ok(());
            }
            if let Some(pos) = available.iter().position(|&b| b == b'\n') {
                reader.consume(pos + 1);
                return Ok(());
            }
            let len = available.len();
            reader.consume(len);
        }
    };

    match tokio::time::timeout(DRAIN_TIMEOUT, drain).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("draining oversized line timed out after 30s");
            Ok(())
        }
    }
}
