//! In-memory queue binding with visibility-timeout redelivery.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use cronplane_core::Result;

use crate::queue::{EventQueue, QueueMessage};

const DEFAULT_VISIBILITY: Duration = Duration::from_secs(30);

struct QueueState {
    ready: VecDeque<QueueMessage>,
    /// message id -> (message, instant at which it becomes visible again).
    in_flight: HashMap<String, (QueueMessage, Instant)>,
}

/// Single-process [`EventQueue`]. Doubles as the test double: received
/// messages sit in-flight until acked or until the visibility window
/// elapses, at which point they are redelivered.
pub struct MemoryQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    visibility: Duration,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::with_visibility(DEFAULT_VISIBILITY)
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_visibility(visibility: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState {
                ready: VecDeque::new(),
                in_flight: HashMap::new(),
            }),
            notify: Notify::new(),
            visibility,
        }
    }

    /// Enqueue a message body. Used by tests and by local trigger wiring.
    pub fn send(&self, body: impl Into<String>) {
        let message = QueueMessage {
            id: Uuid::new_v4().to_string(),
            body: body.into(),
        };
        self.state.lock().unwrap().ready.push_back(message);
        self.notify.notify_waiters();
    }

    /// Messages neither delivered nor acked yet.
    pub fn ready_len(&self) -> usize {
        self.promote_expired();
        self.state.lock().unwrap().ready.len()
    }

    /// Messages delivered but not yet acked.
    pub fn in_flight_len(&self) -> usize {
        self.promote_expired();
        self.state.lock().unwrap().in_flight.len()
    }

    /// Move in-flight messages whose visibility window elapsed back to
    /// the ready queue.
    fn promote_expired(&self) {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap();
        let expired: Vec<String> = state
            .in_flight
            .iter()
            .filter(|(_, (_, visible_at))| *visible_at <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            if let Some((message, _)) = state.in_flight.remove(&id) {
                state.ready.push_back(message);
            }
        }
    }

    fn take_batch(&self, max: usize) -> Vec<QueueMessage> {
        self.promote_expired();
        let visible_at = Instant::now() + self.visibility;
        let mut state = self.state.lock().unwrap();
        let mut batch = Vec::new();
        while batch.len() < max {
            let Some(message) = state.ready.pop_front() else {
                break;
            };
            state
                .in_flight
                .insert(message.id.clone(), (message.clone(), visible_at));
            batch.push(message);
        }
        batch
    }
}

#[async_trait]
impl EventQueue for MemoryQueue {
    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<QueueMessage>> {
        let batch = self.take_batch(max);
        if !batch.is_empty() {
            return Ok(batch);
        }
        // Long poll: wait for a send, then try once more.
        let _ = tokio::time::timeout(wait, self.notify.notified()).await;
        Ok(self.take_batch(max))
    }

    async fn ack(&self, message_id: &str) -> Result<()> {
        self.state.lock().unwrap().in_flight.remove(message_id);
        Ok(())
    }
}
