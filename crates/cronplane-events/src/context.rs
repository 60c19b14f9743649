use cronplane_core::Task;

/// Immutable message handed to every listener of a fired event.
///
/// Listeners receive a shared reference and must treat the context as
/// read-only; the worker reuses the same context across the derived event
/// and the unconditional state-changed event.
#[derive(Debug, Clone)]
pub struct EventContext {
    /// Cron name with the resource prefix already stripped.
    pub cron_name: String,
    /// The task snapshot as decoded from the queue message.
    pub task: Task,
}

impl EventContext {
    pub fn new(cron_name: impl Into<String>, task: Task) -> Self {
        Self {
            cron_name: cron_name.into(),
            task,
        }
    }
}
