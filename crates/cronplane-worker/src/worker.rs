use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use cronplane_core::{Error, Result};
use cronplane_lock::LockManager;

use crate::handler::MessageHandler;
use crate::queue::{EventQueue, RECEIVE_BATCH, RECEIVE_WAIT};

/// The replicated worker. Every replica runs one of these; the leader
/// lease decides which replica polls the queue. A follower retries
/// acquisition once per refresh interval. The leader refreshes on the
/// same cadence with a TTL of twice the interval, so one missed refresh
/// never drops the lease.
pub struct Worker {
    lock: Arc<dyn LockManager>,
    queue: Arc<dyn EventQueue>,
    handler: Arc<MessageHandler>,
    lock_name: String,
    refresh_interval: Duration,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(
        lock: Arc<dyn LockManager>,
        queue: Arc<dyn EventQueue>,
        handler: Arc<MessageHandler>,
        lock_name: impl Into<String>,
        refresh_interval: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            lock,
            queue,
            handler,
            lock_name: lock_name.into(),
            refresh_interval,
            poll_interval,
        }
    }

    fn lease_ttl(&self) -> Duration {
        self.refresh_interval * 2
    }

    /// Run until `shutdown` flips to true or the lease can no longer be
    /// held. Refresh failures and queue receive failures surface as
    /// errors so the supervisor can restart the worker.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            if *shutdown.borrow() {
                return Ok(());
            }
            match self.lock.acquire(&self.lock_name, self.lease_ttl()).await {
                Ok(()) => {
                    info!(lock = %self.lock_name, "leader lease acquired");
                    let outcome = self.lead(&mut shutdown).await;
                    if let Err(e) = self.lock.release(&self.lock_name).await {
                        warn!(error = %e, "leader lease release failed");
                    }
                    outcome?;
                    if *shutdown.borrow() {
                        return Ok(());
                    }
                }
                Err(Error::LockTaken) => {}
                Err(e) => return Err(e),
            }
            tokio::select! {
                _ = shutdown.changed() => {}
                _ = tokio::time::sleep(self.refresh_interval) => {}
            }
        }
    }

    /// Leader mode: poll in a spawned task, refresh the lease here.
    /// Returns Ok on shutdown, Err when the lease or the queue failed.
    async fn lead(&self, shutdown: &mut watch::Receiver<bool>) -> Result<()> {
        let (poll_stop_tx, poll_stop_rx) = watch::channel(false);
        let (err_tx, mut err_rx) = mpsc::channel::<Error>(1);
        let poller = tokio::spawn(poll_loop(
            Arc::clone(&self.queue),
            Arc::clone(&self.handler),
            self.poll_interval,
            poll_stop_rx,
            err_tx,
        ));

        let outcome = loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break Ok(());
                    }
                }
                failure = err_rx.recv() => {
                    break Err(failure.unwrap_or_else(|| {
                        Error::Internal("poll loop ended without reporting".into())
                    }));
                }
                _ = tokio::time::sleep(self.refresh_interval) => {
                    if let Err(e) = self.lock.refresh(&self.lock_name, self.lease_ttl()).await {
                        warn!(error = %e, "leader lease refresh failed, stepping down");
                        break Err(e);
                    }
                }
            }
        };

        let _ = poll_stop_tx.send(true);
        let _ = poller.await;
        info!(lock = %self.lock_name, "leader stepped down");
        outcome
    }
}

/// The leader's queue loop: receive a batch, handle each message in
/// order, ack only the ones whose listeners all succeeded. Unacked
/// messages come back after the visibility window.
async fn poll_loop(
    queue: Arc<dyn EventQueue>,
    handler: Arc<MessageHandler>,
    poll_interval: Duration,
    mut stop: watch::Receiver<bool>,
    errors: mpsc::Sender<Error>,
) {
    loop {
        if *stop.borrow() {
            return;
        }
        let batch = tokio::select! {
            _ = stop.changed() => return,
            received = queue.receive(RECEIVE_BATCH, RECEIVE_WAIT) => match received {
                Ok(batch) => batch,
                Err(e) => {
                    let _ = errors.send(e).await;
                    return;
                }
            }
        };
        for message in batch {
            match handler.handle(&message.body).await {
                Ok(()) => {
                    if let Err(e) = queue.ack(&message.id).await {
                        warn!(message_id = %message.id, error = %e, "ack failed");
                    }
                }
                Err(e) => {
                    // Left on the queue for redelivery.
                    warn!(message_id = %message.id, error = %e, "message handling failed");
                }
            }
            if *stop.borrow() {
                return;
            }
        }
        tokio::select! {
            _ = stop.changed() => {}
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use cronplane_core::types::{Capacity, ContainerSpec, Logging, Notifications};
    use cronplane_core::{Cron, CronDescription};
    use cronplane_events::Dispatcher;
    use cronplane_heartbeat::{register_heartbeat_listeners, HeartbeatApi, MonitorRules};
    use cronplane_lock::MemoryLockManager;
    use cronplane_store::{CronStore, ExecutionStore, MemoryCronStore, MemoryExecutionStore};

    use crate::memory_queue::MemoryQueue;
    use crate::persister::ExecutionPersister;

    const TICK: Duration = Duration::from_millis(20);

    #[derive(Default)]
    struct RecordingApi {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HeartbeatApi for RecordingApi {
        async fn create_monitor(&self, _cron_name: &str, _rules: &MonitorRules) -> Result<String> {
            Ok("mon-test".into())
        }
        async fn delete_monitor(&self, _monitor_id: &str) -> Result<()> {
            Ok(())
        }
        async fn report_run(&self, monitor_id: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("run:{monitor_id}"));
            Ok(())
        }
        async fn report_success(&self, monitor_id: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("success:{monitor_id}"));
            Ok(())
        }
        async fn report_fail(&self, monitor_id: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("fail:{monitor_id}"));
            Ok(())
        }
    }

    fn cron(name: &str, monitor_id: &str) -> Cron {
        Cron {
            name: name.into(),
            description: CronDescription {
                name: name.into(),
                schedule: "rate(1 day)".into(),
                timeout: None,
                container: ContainerSpec {
                    image: "example/report:1".into(),
                    arguments: vec![],
                    environment: Default::default(),
                    capacity: Capacity { cpu: 256, memory: 512 },
                    logging: Logging::default(),
                },
                notifications: Some(Notifications {
                    no_run_threshold: Some(3600),
                    ran_longer_than_threshold: None,
                    pagerduty_key: Some("pd-key".into()),
                    slack_channel: None,
                }),
            },
            rule_name: format!("cron--{name}"),
            rule_arn: format!("arn:rule/{name}"),
            task_family: format!("cron--{name}"),
            latest_task_revision: 1,
            monitor_id: Some(monitor_id.into()),
        }
    }

    fn started_message(task_id: &str) -> String {
        json!({
            "detail-type": "ECS Task State Change",
            "detail": {
                "taskId": task_id,
                "containers": [{"name": "cron--daily-report", "exitCode": null}],
                "lastStatus": "RUNNING",
                "desiredStatus": "RUNNING",
                "version": 1,
            }
        })
        .to_string()
    }

    struct WiredWorker {
        worker: Arc<Worker>,
        queue: Arc<MemoryQueue>,
        executions: Arc<MemoryExecutionStore>,
        api: Arc<RecordingApi>,
    }

    async fn wire(queue_visibility: Duration) -> WiredWorker {
        let executions = Arc::new(MemoryExecutionStore::new());
        let crons = Arc::new(MemoryCronStore::new());
        crons.put(&cron("daily-report", "mon-9")).await.unwrap();
        let api = Arc::new(RecordingApi::default());

        let dispatcher = Arc::new(Dispatcher::new());
        ExecutionPersister::register(
            executions.clone() as Arc<dyn ExecutionStore>,
            &dispatcher,
        );
        register_heartbeat_listeners(
            &dispatcher,
            api.clone() as Arc<dyn HeartbeatApi>,
            crons as Arc<dyn CronStore>,
        );

        let queue = Arc::new(MemoryQueue::with_visibility(queue_visibility));
        let worker = Arc::new(Worker::new(
            Arc::new(MemoryLockManager::new()),
            queue.clone(),
            Arc::new(MessageHandler::new(dispatcher, "cron--")),
            "cron-event-worker",
            TICK,
            Duration::from_millis(1),
        ));
        WiredWorker { worker, queue, executions, api }
    }

    #[tokio::test]
    async fn started_task_is_persisted_pinged_and_acked() {
        let wired = wire(Duration::from_secs(30)).await;
        wired.queue.send(started_message("t-100"));

        let (stop_tx, stop_rx) = watch::channel(false);
        let worker = wired.worker.clone();
        let running = tokio::spawn(async move { worker.run(stop_rx).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = stop_tx.send(true);
        running.await.unwrap().unwrap();

        let history = wired.executions.last_n("daily-report", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].task_id, "t-100");
        assert_eq!(*wired.api.calls.lock().unwrap(), ["run:mon-9"]);
        assert_eq!(wired.queue.ready_len(), 0);
        assert_eq!(wired.queue.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn undecodable_message_is_acked_away() {
        let wired = wire(Duration::from_secs(30)).await;
        wired.queue.send("{ not json");

        let (stop_tx, stop_rx) = watch::channel(false);
        let worker = wired.worker.clone();
        let running = tokio::spawn(async move { worker.run(stop_rx).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = stop_tx.send(true);
        running.await.unwrap().unwrap();

        assert_eq!(wired.queue.ready_len(), 0);
        assert_eq!(wired.queue.in_flight_len(), 0);
    }

    /// A listener that fails a fixed number of times before succeeding,
    /// standing in for a flaky store.
    struct Flaky {
        failures_left: AtomicUsize,
        handled: AtomicUsize,
    }

    #[async_trait]
    impl cronplane_events::Listener for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }
        async fn handle(&self, _ctx: &cronplane_events::EventContext) -> Result<()> {
            self.handled.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(Error::TransientBackend("flaky".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_message_is_redelivered_until_it_succeeds() {
        let dispatcher = Arc::new(Dispatcher::new());
        let flaky = Arc::new(Flaky {
            failures_left: AtomicUsize::new(2),
            handled: AtomicUsize::new(0),
        });
        dispatcher.register(cronplane_events::CRON_EXECUTION_STATE_CHANGED, flaky.clone());

        let queue = Arc::new(MemoryQueue::with_visibility(Duration::from_millis(10)));
        queue.send(started_message("t-1"));
        let worker = Arc::new(Worker::new(
            Arc::new(MemoryLockManager::new()),
            queue.clone(),
            Arc::new(MessageHandler::new(dispatcher, "cron--")),
            "cron-event-worker",
            TICK,
            Duration::from_millis(1),
        ));

        let (stop_tx, stop_rx) = watch::channel(false);
        let spawned = worker.clone();
        let running = tokio::spawn(async move { spawned.run(stop_rx).await });

        tokio::time::sleep(Duration::from_millis(300)).await;
        let _ = stop_tx.send(true);
        running.await.unwrap().unwrap();

        assert!(flaky.handled.load(Ordering::SeqCst) >= 3);
        assert_eq!(queue.ready_len(), 0);
        assert_eq!(queue.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn second_worker_stays_follower_until_leader_releases() {
        let lock = Arc::new(MemoryLockManager::new());
        let dispatcher = Arc::new(Dispatcher::new());
        let handler = Arc::new(MessageHandler::new(dispatcher, "cron--"));
        let queue_a = Arc::new(MemoryQueue::new());
        let queue_b = Arc::new(MemoryQueue::new());

        let leader = Arc::new(Worker::new(
            lock.clone(),
            queue_a.clone(),
            handler.clone(),
            "cron-event-worker",
            TICK,
            Duration::from_millis(1),
        ));
        let follower = Arc::new(Worker::new(
            lock,
            queue_b.clone(),
            handler,
            "cron-event-worker",
            TICK,
            Duration::from_millis(1),
        ));

        let (leader_stop, leader_stop_rx) = watch::channel(false);
        let spawned = leader.clone();
        let leading = tokio::spawn(async move { spawned.run(leader_stop_rx).await });
        tokio::time::sleep(Duration::from_millis(30)).await;

        let (follower_stop, follower_stop_rx) = watch::channel(false);
        let spawned = follower.clone();
        let following = tokio::spawn(async move { spawned.run(follower_stop_rx).await });

        // Only the leader drains its queue while it holds the lease.
        queue_a.send(started_message("t-a"));
        queue_b.send(started_message("t-b"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(queue_a.ready_len() + queue_a.in_flight_len(), 0);
        assert_eq!(queue_b.ready_len(), 1);

        // Leader steps down; the follower takes over and drains its own.
        let _ = leader_stop.send(true);
        leading.await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(queue_b.ready_len() + queue_b.in_flight_len(), 0);

        let _ = follower_stop.send(true);
        following.await.unwrap().unwrap();
    }

    /// Lock manager whose refresh starts failing on demand.
    struct RevocableLock {
        inner: MemoryLockManager,
        refresh_fails: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl cronplane_lock::LockManager for RevocableLock {
        async fn acquire(&self, name: &str, ttl: Duration) -> Result<()> {
            self.inner.acquire(name, ttl).await
        }
        async fn refresh(&self, name: &str, ttl: Duration) -> Result<()> {
            if self.refresh_fails.load(Ordering::SeqCst) {
                return Err(Error::NotFound("lease gone".into()));
            }
            self.inner.refresh(name, ttl).await
        }
        async fn release(&self, name: &str) -> Result<()> {
            self.inner.release(name).await
        }
    }

    #[tokio::test]
    async fn refresh_failure_surfaces_and_stops_the_worker() {
        let lock = Arc::new(RevocableLock {
            inner: MemoryLockManager::new(),
            refresh_fails: std::sync::atomic::AtomicBool::new(false),
        });
        let dispatcher = Arc::new(Dispatcher::new());
        let worker = Arc::new(Worker::new(
            lock.clone(),
            Arc::new(MemoryQueue::new()),
            Arc::new(MessageHandler::new(dispatcher, "cron--")),
            "cron-event-worker",
            TICK,
            Duration::from_millis(1),
        ));

        let (_stop_tx, stop_rx) = watch::channel(false);
        let spawned = worker.clone();
        let running = tokio::spawn(async move { spawned.run(stop_rx).await });
        tokio::time::sleep(Duration::from_millis(30)).await;

        lock.refresh_fails.store(true, Ordering::SeqCst);
        let err = running.await.unwrap().unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
