//! `cronplane-worker` — the single-leader event ingestion pipeline.
//!
//! Replicas all run a [`Worker`]; the leader lease decides which one
//! actually polls the queue. The leader pulls task-state-change
//! envelopes in batches of ten, handles them sequentially (decode →
//! classify → persist → dispatch → ack), and leaves failed messages
//! unacknowledged so the queue redelivers them. At-least-once delivery
//! plus the execution store's monotonic version guard adds up to
//! exactly-once *effect*.

pub mod envelope;
pub mod handler;
pub mod memory_queue;
pub mod persister;
pub mod queue;
pub mod worker;

pub use envelope::Envelope;
pub use handler::MessageHandler;
pub use memory_queue::MemoryQueue;
pub use persister::ExecutionPersister;
pub use queue::{EventQueue, QueueMessage};
pub use worker::Worker;
