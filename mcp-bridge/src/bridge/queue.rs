//! Bounded inbound queue between the line reader and the bridge loop.
//!
//! A plain bounded `mpsc` channel: the reader is the only sender and the
//! bridge loop the only receiver. A full queue suspends the reader's `send`,
//! which is the only backpressure the bridge applies to stdin.

use tokio::sync::mpsc;
use tokio::time::Instant;

/// One inbound line waiting to be sent to the remote.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    /// 1-based position in the input stream (blank and dropped lines excluded).
    pub seq: u64,
    /// The raw line, terminator stripped.
    pub payload: String,
    /// When the reader handed the message to the queue.
    pub enqueued_at: Instant,
}

impl QueuedMessage {
    /// Stamp `payload` with `seq` and the current time.
    pub fn new(seq: u64, payload: String) -> Self {
        Self {
            seq,
            payload,
            enqueued_at: Instant::now(),
        }
    }
}

/// Sending half, owned by the line reader.
pub type QueueSender = mpsc::Sender<QueuedMessage>;

/// Receiving half, owned by the bridge loop.
pub type QueueReceiver = mpsc::Receiver<QueuedMessage>;

/// Create a queue holding at most `capacity` messages.
///
/// # Panics
///
/// Panics if `capacity` is zero; configuration validation rejects that value
/// before the queue is built.
pub fn message_queue(capacity: usize) -> (QueueSender, QueueReceiver) {
    mpsc::channel(capacity)
}
