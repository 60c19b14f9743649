use std::sync::Arc;

use async_trait::async_trait;

use cronplane_core::Result;
use cronplane_events::{Dispatcher, EventContext, Listener, CRON_EXECUTION_STATE_CHANGED};
use cronplane_store::ExecutionStore;

/// The canonical listener: writes every observation through the
/// execution store. Registered on the unconditional state-changed event
/// so the history is complete even when no derived event fires.
pub struct ExecutionPersister {
    store: Arc<dyn ExecutionStore>,
}

impl ExecutionPersister {
    pub fn new(store: Arc<dyn ExecutionStore>) -> Self {
        Self { store }
    }

    pub fn register(store: Arc<dyn ExecutionStore>, dispatcher: &Dispatcher) {
        dispatcher.register(CRON_EXECUTION_STATE_CHANGED, Arc::new(Self::new(store)));
    }
}

#[async_trait]
impl Listener for ExecutionPersister {
    fn name(&self) -> &str {
        "execution-persister"
    }

    async fn handle(&self, ctx: &EventContext) -> Result<()> {
        self.store.update(&ctx.cron_name, &ctx.task).await
    }
}
