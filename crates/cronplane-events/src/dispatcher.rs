use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;

use cronplane_core::Result;

use crate::EventContext;

/// A subscriber to a named event.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Stable name used in logs when a listener fails.
    fn name(&self) -> &str;

    async fn handle(&self, ctx: &EventContext) -> Result<()>;
}

/// Registry mapping event names to ordered listener chains.
///
/// Registration normally happens once at startup; `fire` snapshots the
/// chain under the read lock and then invokes listeners in registration
/// order, stopping at the first error.
#[derive(Default)]
pub struct Dispatcher {
    listeners: RwLock<HashMap<String, Vec<Arc<dyn Listener>>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `listener` to the chain for `event`.
    pub fn register(&self, event: &str, listener: Arc<dyn Listener>) {
        debug!(event = %event, listener = %listener.name(), "listener registered");
        self.listeners
            .write()
            .unwrap()
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }

    /// Invoke every listener registered for `event`, in order. The first
    /// failure aborts the chain and is returned; an event nobody listens
    /// to is a no-op.
    pub async fn fire(&self, event: &str, ctx: &EventContext) -> Result<()> {
        let chain: Vec<Arc<dyn Listener>> = self
            .listeners
            .read()
            .unwrap()
            .get(event)
            .cloned()
            .unwrap_or_default();

        for listener in chain {
            listener.handle(ctx).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use cronplane_core::{Error, Task};

    fn context() -> EventContext {
        EventContext::new(
            "report",
            Task {
                task_id: "t-1".into(),
                containers: vec![],
                last_status: "RUNNING".into(),
                desired_status: "RUNNING".into(),
                started_at: None,
                stopped_at: None,
                stopped_reason: None,
                version: 1,
            },
        )
    }

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    #[async_trait]
    impl Listener for Recorder {
        fn name(&self) -> &str {
            self.label
        }

        async fn handle(&self, _ctx: &EventContext) -> Result<()> {
            self.log.lock().unwrap().push(self.label);
            if self.fail {
                return Err(Error::Internal("listener exploded".into()));
            }
            Ok(())
        }
    }

    fn recorder(
        label: &'static str,
        log: &Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    ) -> Arc<dyn Listener> {
        Arc::new(Recorder {
            label,
            log: Arc::clone(log),
            fail,
        })
    }

    #[tokio::test]
    async fn listeners_run_in_registration_order() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register("ev", recorder("first", &log, false));
        dispatcher.register("ev", recorder("second", &log, false));
        dispatcher.register("ev", recorder("third", &log, false));

        dispatcher.fire("ev", &context()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn first_failure_aborts_the_chain() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register("ev", recorder("ok", &log, false));
        dispatcher.register("ev", recorder("boom", &log, true));
        dispatcher.register("ev", recorder("never", &log, false));

        let err = dispatcher.fire("ev", &context()).await.unwrap_err();
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert_eq!(*log.lock().unwrap(), ["ok", "boom"]);
    }

    #[tokio::test]
    async fn unknown_event_is_a_no_op() {
        let dispatcher = Dispatcher::new();
        dispatcher.fire("nobody-listens", &context()).await.unwrap();
    }

    #[tokio::test]
    async fn chains_are_per_event_name() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register("a", recorder("on-a", &log, false));
        dispatcher.register("b", recorder("on-b", &log, false));

        dispatcher.fire("a", &context()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), ["on-a"]);
    }
}
