use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::watch;
use tracing::{error, info, warn};

use cronplane_core::config::CronplaneConfig;
use cronplane_core::creds::CredentialCache;
use cronplane_events::Dispatcher;
use cronplane_heartbeat::{
    register_heartbeat_listeners, CronitorClient, DisabledHeartbeat, HeartbeatApi,
};
use cronplane_lifecycle::LifecycleService;
use cronplane_lock::{LockManager, SqliteLockManager};
use cronplane_platform::{ContainerPlatform, InMemoryPlatform};
use cronplane_store::{
    CronStore, ExecutionStore, SqliteCronStore, SqliteExecutionStore,
};
use cronplane_worker::{EventQueue, ExecutionPersister, MemoryQueue, MessageHandler, Worker};

mod app;
mod creds;
mod http;

/// Leader lease shared by every replica of this process.
const WORKER_LOCK_NAME: &str = "cron-event-worker";
/// Cadence of the expired-execution sweep.
const TTL_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cronplane=info,cronplane_gateway=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("CRONPLANE_CONFIG").ok();
    let config = CronplaneConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({e}), using defaults");
        CronplaneConfig::default()
    });
    info!(version = env!("CARGO_PKG_VERSION"), "cronplane starting");

    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");
    {
        let db = Connection::open(&db_path)?;
        db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        cronplane_store::db::init_db(&db)?;
        cronplane_lock::db::init_db(&db)?;
    }
    info!("database migrations complete");

    // Each subsystem gets its own connection for thread safety.
    let open = |path: &str| -> anyhow::Result<Arc<Mutex<Connection>>> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Arc::new(Mutex::new(conn)))
    };
    let executions: Arc<dyn ExecutionStore> = Arc::new(SqliteExecutionStore::new(open(&db_path)?));
    let crons: Arc<dyn CronStore> = Arc::new(SqliteCronStore::new(open(&db_path)?));
    let lock: Arc<dyn LockManager> = Arc::new(SqliteLockManager::new(open(&db_path)?));
    let sweeper_conn = open(&db_path)?;

    let heartbeat: Arc<dyn HeartbeatApi> =
        match (&config.cronitor.api_key, &config.cronitor.auth_key) {
            (Some(api_key), Some(auth_key)) => {
                Arc::new(CronitorClient::new(api_key.clone(), auth_key.clone()))
            }
            _ => {
                info!("heartbeat credentials absent, alerting disabled");
                Arc::new(DisabledHeartbeat)
            }
        };

    let dispatcher = Arc::new(Dispatcher::new());
    ExecutionPersister::register(Arc::clone(&executions), &dispatcher);
    register_heartbeat_listeners(&dispatcher, Arc::clone(&heartbeat), Arc::clone(&crons));

    let queue: Arc<MemoryQueue> = Arc::new(MemoryQueue::new());
    let handler = Arc::new(MessageHandler::new(
        Arc::clone(&dispatcher),
        config.platform.cron_name_prefix.clone(),
    ));
    let worker = Arc::new(Worker::new(
        Arc::clone(&lock),
        Arc::clone(&queue) as Arc<dyn EventQueue>,
        handler,
        WORKER_LOCK_NAME,
        Duration::from_secs(config.worker.lock_refresh_interval_secs),
        Duration::from_secs(config.worker.queue_poll_interval_secs),
    ));

    let platform: Arc<dyn ContainerPlatform> = Arc::new(InMemoryPlatform::new());
    let lifecycle = LifecycleService::new(
        platform,
        Arc::clone(&crons),
        Arc::clone(&executions),
        Arc::clone(&heartbeat),
        config.platform.cron_name_prefix.clone(),
        config.platform.datacenter.clone(),
        config.platform.cluster.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if let (Some(address), Some(role_id)) =
        (config.vault.address.clone(), config.vault.role_id.clone())
    {
        let cache = Arc::new(CredentialCache::new(Arc::new(creds::VaultTokenSource::new(
            address, role_id,
        ))));
        tokio::spawn(cache.run(shutdown_rx.clone()));
    }

    tokio::spawn(cronplane_store::db::run_ttl_sweeper(
        sweeper_conn,
        TTL_SWEEP_INTERVAL,
        shutdown_rx.clone(),
    ));

    let worker_rx = shutdown_rx.clone();
    let worker_task = tokio::spawn(async move {
        if let Err(e) = worker.run(worker_rx).await {
            error!(error = %e, "event worker terminated");
            // A supervisor restarts the whole process.
            std::process::exit(1);
        }
    });

    let state = Arc::new(app::AppState {
        config: config.clone(),
        lifecycle,
        http: reqwest::Client::new(),
    });
    let router = app::build_router(state);

    let addr = listen_addr(&config.gateway.addr);
    info!(%addr, "gateway listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let grace = Duration::from_secs(config.gateway.shutdown_timeout_secs);
    if tokio::time::timeout(grace, worker_task).await.is_err() {
        warn!("worker did not stop within the shutdown window");
    }
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

/// `:8000` means every interface.
fn listen_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
