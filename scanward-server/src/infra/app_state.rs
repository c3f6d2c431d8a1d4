use std::{fmt, sync::Arc, time::Duration};

use scanward_core::{
    CoreError,
    application::AppUnitOfWork,
    database::PostgresDatabase,
    queue::{JobQueue, WorkerRegistry},
};

use crate::infra::{config::Config, errors::AppError};

/// Shared handler state. Cloned per request; everything behind it is `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub unit_of_work: Arc<AppUnitOfWork>,
    pub jobs: Arc<dyn JobQueue>,
    pub workers: Arc<dyn WorkerRegistry>,
    pub config: Arc<Config>,
    /// Present when running against PostgreSQL.
    pub postgres: Option<Arc<PostgresDatabase>>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("unit_of_work", &self.unit_of_work)
            .field("postgres", &self.postgres.is_some())
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        unit_of_work: AppUnitOfWork,
        jobs: Arc<dyn JobQueue>,
        workers: Arc<dyn WorkerRegistry>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            unit_of_work: Arc::new(unit_of_work),
            jobs,
            workers,
            config,
            postgres: None,
        }
    }

    pub fn with_postgres(mut self, postgres: Arc<PostgresDatabase>) -> Self {
        self.postgres = Some(postgres);
        self
    }

    pub fn uow(&self) -> &AppUnitOfWork {
        &self.unit_of_work
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn page_size(&self) -> u32 {
        self.config.pagination.page_size
    }

    pub fn heartbeat_window(&self) -> Duration {
        self.config.heartbeat_window()
    }

    /// Error mapper honouring `dev_mode`, for use with `map_err`.
    pub fn errors(&self) -> impl Fn(CoreError) -> AppError + use<> {
        let dev_mode = self.config.dev_mode;
        move |err| AppError::from_core(err, dev_mode)
    }
}
