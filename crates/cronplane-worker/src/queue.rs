use std::time::Duration;

use async_trait::async_trait;

use cronplane_core::Result;

/// Messages received per poll; the queue may return fewer.
pub const RECEIVE_BATCH: usize = 10;
/// Long-poll wait for the first message of a batch.
pub const RECEIVE_WAIT: Duration = Duration::from_secs(5);

/// One received message. `id` is the receipt handle used to acknowledge.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub id: String,
    pub body: String,
}

/// At-least-once message queue, SQS-shaped: received messages become
/// invisible for a visibility window and reappear unless acknowledged.
#[async_trait]
pub trait EventQueue: Send + Sync {
    /// Receive up to `max` messages, waiting up to `wait` for the first.
    /// An empty vec means the long poll elapsed with nothing to do.
    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<QueueMessage>>;

    /// Acknowledge (delete) a received message.
    async fn ack(&self, message_id: &str) -> Result<()>;
}
