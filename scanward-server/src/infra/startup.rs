use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use scanward_core::{
    application::AppUnitOfWork,
    database::{MemoryStore, PostgresDatabase},
    queue::{
        InMemoryJobQueue, InMemoryWorkerRegistry, JobQueue, PostgresJobQueue,
        PostgresWorkerRegistry, WorkerRegistry,
    },
    runner::ScanRunner,
    worker::WorkerPool,
};

use crate::infra::{app_state::AppState, config::Config};

/// Connect to PostgreSQL and apply pending migrations.
pub async fn connect_postgres(config: &Config) -> anyhow::Result<PostgresDatabase> {
    let url = config
        .database
        .url
        .as_deref()
        .context("database.url (DATABASE_URL) is not configured")?;

    let postgres = PostgresDatabase::connect(url, config.database.max_connections)
        .await
        .context("failed to connect to PostgreSQL")?;
    postgres
        .migrate()
        .await
        .context("database migration failed")?;

    let stats = postgres.pool_stats();
    info!(
        pool.size = stats.size,
        pool.max = stats.max_size,
        "connected to PostgreSQL and applied migrations"
    );
    Ok(postgres)
}

/// Wire repositories, the job queue and the worker registry for the
/// configured backend. Without a database URL everything lives in process
/// memory, which only works when the HTTP server and the workers share the
/// process.
pub async fn build_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    if config.uses_postgres() {
        let postgres = Arc::new(connect_postgres(&config).await?);
        let pool = postgres.pool().clone();
        let jobs: Arc<dyn JobQueue> = Arc::new(PostgresJobQueue::new(pool.clone()));
        let workers: Arc<dyn WorkerRegistry> = Arc::new(PostgresWorkerRegistry::new(pool));

        let state = AppState::new(AppUnitOfWork::from_postgres(&postgres), jobs, workers, config)
            .with_postgres(postgres);
        Ok(state)
    } else {
        warn!("DATABASE_URL not set; using the in-memory store, data is lost on exit");
        Ok(in_memory_state(config))
    }
}

pub fn in_memory_state(config: Arc<Config>) -> AppState {
    let store = MemoryStore::new();
    AppState::new(
        AppUnitOfWork::in_memory(&store),
        Arc::new(InMemoryJobQueue::default()),
        Arc::new(InMemoryWorkerRegistry::new()),
        config,
    )
}

/// Start the worker pool against the state's queue and registry.
pub fn start_workers(state: &AppState, shutdown: CancellationToken) -> WorkerPool {
    let config = state.config();
    let runner = ScanRunner::new(state.uow().clone(), config.runner_settings());
    info!(
        concurrency = config.worker.concurrency,
        check_sleep_time = config.runner.check_sleep_time,
        exception_rate = config.runner.check_exception_rate,
        success_rate = config.runner.check_success_rate,
        "starting scan workers"
    );

    WorkerPool::start(
        runner,
        Arc::clone(&state.jobs),
        Arc::clone(&state.workers),
        config.worker_settings(),
        shutdown,
    )
}
