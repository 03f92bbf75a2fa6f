//! Writes outbound messages to stdout, one per line.

use std::borrow::Cow;

use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Line-oriented writer for outbound messages.
///
/// Every message is written together with its `\n` and flushed, so a peer
/// reading line by line never sees a partial message.
#[derive(Debug)]
pub struct OutputWriter<W> {
    inner: W,
    line: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> OutputWriter<W> {
    /// Wrap `inner`.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            line: Vec::with_capacity(8192),
        }
    }

    /// Write `message` as exactly one line.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error (for example a closed pipe). The
    /// caller treats it as fatal.
    pub async fn write_message(&mut self, message: &str) -> std::io::Result<()> {
        let message = single_line(message);
        self.line.clear();
        self.line.extend_from_slice(message.as_bytes());
        self.line.push(b'\n');
        self.inner.write_all(&self.line).await?;
        self.inner.flush().await
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Spaces and tabs next to a line break.
const LINE_PADDING: [char; 2] = [' ', '\t'];

/// Collapse a multi-line message onto one line without rewriting it.
///
/// A JSON text cannot hold a raw CR or LF inside a string literal, so every
/// line break (and the indentation around it) sits between tokens and can be
/// dropped; numbers, escapes and key order reach the peer byte for byte.
/// Anything that is not JSON gets its line breaks replaced by single spaces
/// and a warning.
pub fn single_line(message: &str) -> Cow<'_, str> {
    if !message.contains(['\n', '\r']) {
        return Cow::Borrowed(message);
    }

    let separator = match serde_json::from_str::<serde_json::Value>(message) {
        Ok(_) => "",
        Err(e) => {
            tracing::warn!(
                error = %e,
                bytes = message.len(),
                "outbound message spans several lines and is not JSON, joining with spaces"
            );
            " "
        }
    };

    let segments: Vec<&str> = message.split(['\n', '\r']).collect();
    let last = segments.len() - 1;
    let mut joined = String::with_capacity(message.len());
    for (i, mut segment) in segments.into_iter().enumerate() {
        if i > 0 {
            segment = segment.trim_start_matches(LINE_PADDING);
        }
        if i < last {
            segment = segment.trim_end_matches(LINE_PADDING);
        }
        if segment.is_empty() {
            continue;
        }
        if !joined.is_empty() {
            joined.push_str(separator);
        }
        joined.push_str(segment);
    }
    Cow::Owned(joined)
}
