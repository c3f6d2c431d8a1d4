use std::{path::PathBuf, time::Duration};

use scanward_core::{runner::RunnerSettings, worker::WorkerSettings};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_CHECK_SLEEP_TIME: f64 = 3.0;
pub const DEFAULT_CHECK_EXCEPTION_RATE: f64 = 0.05;
pub const DEFAULT_CHECK_SUCCESS_RATE: f64 = 0.8;
pub const DEFAULT_WORKER_CONCURRENCY: usize = 1;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HEARTBEAT_WINDOW_SECS: u64 = 30;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub runner: RunnerConfig,
    pub worker: WorkerConfig,
    pub health: HealthConfig,
    pub pagination: PaginationConfig,
    pub cors: CorsConfig,
    /// Exposes internal error detail in API responses.
    pub dev_mode: bool,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// `None` selects the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
}

/// Simulated check execution knobs, in the units operators configure them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunnerConfig {
    /// Seconds slept before each check.
    pub check_sleep_time: f64,
    pub check_exception_rate: f64,
    pub check_success_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    pub concurrency: usize,
    pub poll_interval_ms: u64,
    pub heartbeat_interval_secs: u64,
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthConfig {
    pub heartbeat_window_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationConfig {
    pub page_size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorsConfig {
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
}

/// Where the configuration came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: DEFAULT_MAX_CONNECTIONS,
            },
            runner: RunnerConfig {
                check_sleep_time: DEFAULT_CHECK_SLEEP_TIME,
                check_exception_rate: DEFAULT_CHECK_EXCEPTION_RATE,
                check_success_rate: DEFAULT_CHECK_SUCCESS_RATE,
            },
            worker: WorkerConfig {
                concurrency: DEFAULT_WORKER_CONCURRENCY,
                poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
                heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            health: HealthConfig {
                heartbeat_window_secs: DEFAULT_HEARTBEAT_WINDOW_SECS,
            },
            pagination: PaginationConfig {
                page_size: DEFAULT_PAGE_SIZE,
            },
            cors: CorsConfig::default(),
            dev_mode: false,
            metadata: ConfigMetadata::default(),
        }
    }
}

impl Config {
    /// Runner settings derived from [`RunnerConfig`]. The loader has already
    /// rejected negative or non-finite sleep times.
    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            check_delay: Duration::try_from_secs_f64(self.runner.check_sleep_time)
                .unwrap_or(Duration::ZERO),
            exception_rate: self.runner.check_exception_rate,
            success_rate: self.runner.check_success_rate,
        }
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            concurrency: self.worker.concurrency,
            poll_interval: Duration::from_millis(self.worker.poll_interval_ms),
            heartbeat_interval: Duration::from_secs(self.worker.heartbeat_interval_secs),
            shutdown_timeout: Duration::from_secs(self.worker.shutdown_timeout_secs),
        }
    }

    pub fn heartbeat_window(&self) -> Duration {
        Duration::from_secs(self.health.heartbeat_window_secs)
    }

    pub fn uses_postgres(&self) -> bool {
        self.database.url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_settings_convert_seconds() {
        let mut config = Config::default();
        config.runner.check_sleep_time = 0.25;

        let settings = config.runner_settings();
        assert_eq!(settings.check_delay, Duration::from_millis(250));
        assert_eq!(settings.exception_rate, DEFAULT_CHECK_EXCEPTION_RATE);
        assert_eq!(settings.success_rate, DEFAULT_CHECK_SUCCESS_RATE);
    }

    #[test]
    fn defaults_use_the_in_memory_store() {
        let config = Config::default();
        assert!(!config.uses_postgres());
        assert_eq!(config.worker_settings(), WorkerSettings::default());
        assert_eq!(config.heartbeat_window(), Duration::from_secs(30));
    }
}
