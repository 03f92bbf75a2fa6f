//! Server-Sent-Events decoding.
//!
//! Turns an SSE byte stream into the JSON-RPC messages carried in its `data:`
//! fields. The decoder knows nothing about HTTP: it is fed raw chunks and
//! yields finished events, so it can be driven from a response body, a fixture
//! file, or a test vector alike.
//!
//! Framing rules:
//! - lines end with `\n`, an optional preceding `\r` is dropped
//! - `data:` lines are accumulated (prefix and one leading space stripped) and
//!   joined with `\n`
//! - a blank line finalizes the accumulated text as one message if non-empty
//! - `event:`, `id:`, `retry:`, unknown fields and `:` comments are ignored
//! - `data: [DONE]` sentinels are ignored
//! - at end of stream a pending, non-empty accumulator becomes a final message

use bytes::BytesMut;
use futures_util::{Stream, StreamExt, stream};

use crate::config::DEFAULT_MAX_RESPONSE_BYTES;
use crate::error::{SseError, SseStreamError};

/// Data value some servers send to mark the end of a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Incremental SSE decoder.
///
/// Push chunks with [`SseDecoder::push`], pull finished events with
/// [`SseDecoder::next_event`], and call [`SseDecoder::finish`] once the byte
/// source is exhausted.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: BytesMut,
    /// Prefix of `buffer` already known to hold no `\n`.
    scanned: usize,
    data: Option<String>,
    lines_seen: usize,
    max_event_bytes: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RESPONSE_BYTES)
    }
}

impl SseDecoder {
    /// Create a decoder that rejects events (or unterminated lines) larger
    /// than `max_event_bytes`.
    pub fn new(max_event_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            scanned: 0,
            data: None,
            lines_seen: 0,
            max_event_bytes,
        }
    }

    /// Append raw bytes from the source.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Return the next finished event, or `None` if more bytes are needed.
    ///
    /// # Errors
    ///
    /// Returns [`SseError::InvalidUtf8`] for a line that is not UTF-8 and
    /// [`SseError::EventTooLarge`] when an event or a pending line exceeds the
    /// size limit.
    pub fn next_event(&mut self) -> Result<Option<String>, SseError> {
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let pos = self.scanned + offset;
            self.scanned = 0;
            let mut line = self.buffer.split_to(pos + 1);
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            if let Some(event) = self.process_line(&line)? {
                return Ok(Some(event));
            }
        }
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_event_bytes {
            return Err(SseError::EventTooLarge {
                max_bytes: self.max_event_bytes,
            });
        }
        Ok(None)
    }

    /// Flush the decoder at end of stream.
    ///
    /// An unterminated trailing line is processed as if it were terminated,
    /// then any pending event is returned. A stream that closes without its
    /// final blank line still yields its last event.
    ///
    /// # Errors
    ///
    /// Same as [`SseDecoder::next_event`].
    pub fn finish(&mut self) -> Result<Option<String>, SseError> {
        if !self.buffer.is_empty() {
            self.scanned = 0;
            let mut line = self.buffer.split();
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            if let Some(event) = self.process_line(&line)? {
                return Ok(Some(event));
            }
        }
        Ok(self.take_event())
    }

    fn process_line(&mut self, raw: &[u8]) -> Result<Option<String>, SseError> {
        self.lines_seen += 1;
        let line = std::str::from_utf8(raw).map_err(|_| SseError::InvalidUtf8 {
            line: self.lines_seen,
        })?;

        if line.is_empty() {
            return Ok(self.take_event());
        }
        if line.starts_with(':') {
            return Ok(None);
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field != "data" || value == DONE_SENTINEL {
            return Ok(None);
        }

        match self.data.as_mut() {
            Some(data) => {
                data.push('\n');
                data.push_str(value);
            }
            None => self.data = Some(value.to_string()),
        }

        if self.data.as_ref().is_some_and(|d| d.len() > self.max_event_bytes) {
            return Err(SseError::EventTooLarge {
                max_bytes: self.max_event_bytes,
            });
        }
        Ok(None)
    }

    fn take_event(&mut self) -> Option<String> {
        self.data.take().filter(|data| !data.is_empty())
    }
}

/// Decode a stream of byte chunks into a lazy stream of SSE messages.
///
/// The returned stream ends after the source ends (flushing any trailing
/// event) or after the first error, whichever comes first.
pub fn decode_stream<S, B, E>(
    source: S,
    max_event_bytes: usize,
) -> impl Stream<Item = Result<String, SseStreamError<E>>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    let state = DecodeState {
        source: Box::pin(source),
        decoder: SseDecoder::new(max_event_bytes),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }

        loop {
            match state.decoder.next_event() {
                Ok(Some(event)) => return Some((Ok(event), state)),
                Ok(None) => {}
                Err(e) => {
                    state.done = true;
                    return Some((Err(SseStreamError::Decode(e)), state));
                }
            }

            match state.source.next().await {
                Some(Ok(chunk)) => state.decoder.push(chunk.as_ref()),
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(SseStreamError::Source(e)), state));
                }
                None => {
                    state.done = true;
                    return match state.decoder.finish() {
                        Ok(Some(event)) => Some((Ok(event), state)),
                        Ok(None) => None,
                        Err(e) => Some((Err(SseStreamError::Decode(e)), state)),
                    };
                }
            }
        }
    })
}

struct DecodeState<S> {
    source: std::pin::Pin<Box<S>>,
    decoder: SseDecoder,
    done: bool,
}
