use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

use scanward_core::database::PageRequest;

use super::{
    models::{
        Config, ConfigMetadata, CorsConfig, DatabaseConfig, HealthConfig, PaginationConfig,
        RunnerConfig, ServerConfig, WorkerConfig, DEFAULT_CHECK_EXCEPTION_RATE,
        DEFAULT_CHECK_SLEEP_TIME, DEFAULT_CHECK_SUCCESS_RATE, DEFAULT_HEARTBEAT_INTERVAL_SECS,
        DEFAULT_HEARTBEAT_WINDOW_SECS, DEFAULT_HOST, DEFAULT_MAX_CONNECTIONS, DEFAULT_PAGE_SIZE,
        DEFAULT_POLL_INTERVAL_MS, DEFAULT_PORT, DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        DEFAULT_WORKER_CONCURRENCY,
    },
    sources::{EnvConfig, FileConfig},
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("scanward.toml"),
        PathBuf::from("config/scanward.toml"),
    ]
});

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file {path} does not exist")]
    MissingConfig { path: PathBuf },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to load .env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
    #[error("environment variable {name} has an invalid value {value:?}")]
    InvalidEnv { name: String, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push(&mut self, message: impl Into<String>) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint(&mut self, message: impl Into<String>, hint: impl Into<String>) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A loaded configuration plus the non-fatal problems found on the way.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

/// Composes defaults, an optional TOML file and the environment. Environment
/// values win over the file.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(ignore_missing)?,
            None => dotenvy::dotenv().map(|_| true).or_else(ignore_missing)?,
        };

        let mut load = self.load_with_env(EnvConfig::gather()?)?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Like [`ConfigLoader::load`] but with an explicit environment and no
    /// `.env` handling.
    pub fn load_with_env(&self, env: EnvConfig) -> Result<ConfigLoad, ConfigLoadError> {
        let (file, config_path) = self.load_file_config(&env)?;
        compose_config(file, env, config_path)
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env.config_path.clone());

        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            Some(path) => path,
            None => match DEFAULT_CONFIG_LOCATIONS.iter().find(|c| c.exists()) {
                Some(found) => found.clone(),
                None => return Ok((None, None)),
            },
        };

        let file = read_file_config(&path)?;
        Ok((Some(file), Some(path)))
    }
}

fn ignore_missing(err: dotenvy::Error) -> Result<bool, dotenvy::Error> {
    match err {
        dotenvy::Error::Io(_) => Ok(false),
        _ => Err(err),
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn compose_config(
    file: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
) -> Result<ConfigLoad, ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();
    if file.is_none() {
        warnings.push_with_hint(
            "No scanward.toml detected; using environment variables and defaults",
            "Pass --config or set SCANWARD_CONFIG to point at a configuration file",
        );
    }

    let FileConfig {
        server: file_server,
        database: file_database,
        runner: file_runner,
        worker: file_worker,
        health: file_health,
        pagination: file_pagination,
        cors: file_cors,
        dev_mode: file_dev_mode,
    } = file.unwrap_or_default();

    let server = ServerConfig {
        host: env
            .server_host
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: env.server_port.or(file_server.port).unwrap_or(DEFAULT_PORT),
    };

    let database = DatabaseConfig {
        url: env.database_url.or(file_database.url),
        max_connections: env
            .database_max_connections
            .or(file_database.max_connections)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS),
    };

    let runner = RunnerConfig {
        check_sleep_time: env
            .check_sleep_time
            .or(file_runner.check_sleep_time)
            .unwrap_or(DEFAULT_CHECK_SLEEP_TIME),
        check_exception_rate: env
            .check_exception_rate
            .or(file_runner.check_exception_rate)
            .unwrap_or(DEFAULT_CHECK_EXCEPTION_RATE),
        check_success_rate: env
            .check_success_rate
            .or(file_runner.check_success_rate)
            .unwrap_or(DEFAULT_CHECK_SUCCESS_RATE),
    };

    let worker = WorkerConfig {
        concurrency: env
            .worker_concurrency
            .or(file_worker.concurrency)
            .unwrap_or(DEFAULT_WORKER_CONCURRENCY),
        poll_interval_ms: env
            .worker_poll_interval_ms
            .or(file_worker.poll_interval_ms)
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
        heartbeat_interval_secs: env
            .worker_heartbeat_interval_secs
            .or(file_worker.heartbeat_interval_secs)
            .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_SECS),
        shutdown_timeout_secs: file_worker
            .shutdown_timeout_secs
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
    };

    let health = HealthConfig {
        heartbeat_window_secs: env
            .heartbeat_window_secs
            .or(file_health.heartbeat_window_secs)
            .unwrap_or(DEFAULT_HEARTBEAT_WINDOW_SECS),
    };

    let pagination = PaginationConfig {
        page_size: env
            .page_size
            .or(file_pagination.page_size)
            .unwrap_or(DEFAULT_PAGE_SIZE),
    };

    let cors = CorsConfig {
        allowed_origins: env
            .cors_allowed_origins
            .or(file_cors.allowed_origins)
            .unwrap_or_default(),
    };

    let config = Config {
        server,
        database,
        runner,
        worker,
        health,
        pagination,
        cors,
        dev_mode: env.dev_mode.or(file_dev_mode).unwrap_or(false),
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded: false,
        },
    };

    validate(&config, &mut warnings)?;
    Ok(ConfigLoad { config, warnings })
}

fn validate(config: &Config, warnings: &mut ConfigWarnings) -> Result<(), ConfigLoadError> {
    let runner = &config.runner;
    if !runner.check_sleep_time.is_finite() || runner.check_sleep_time < 0.0 {
        return Err(ConfigLoadError::Invalid(format!(
            "runner.check_sleep_time must be a non-negative number of seconds (got {})",
            runner.check_sleep_time
        )));
    }
    config
        .runner_settings()
        .validate()
        .map_err(|err| ConfigLoadError::Invalid(err.to_string()))?;

    if config.worker.concurrency == 0 {
        return Err(ConfigLoadError::Invalid(
            "worker.concurrency must be at least 1".into(),
        ));
    }
    if config.worker.heartbeat_interval_secs >= config.health.heartbeat_window_secs {
        warnings.push(format!(
            "worker.heartbeat_interval_secs ({}) is not below health.heartbeat_window_secs ({}); \
             the health endpoint may flap",
            config.worker.heartbeat_interval_secs, config.health.heartbeat_window_secs
        ));
    }

    let page_size = config.pagination.page_size;
    if page_size == 0 || page_size > PageRequest::MAX_LIMIT {
        return Err(ConfigLoadError::Invalid(format!(
            "pagination.page_size must lie in 1..={} (got {page_size})",
            PageRequest::MAX_LIMIT
        )));
    }

    if let Some(url) = &config.database.url
        && !(url.starts_with("postgres://") || url.starts_with("postgresql://"))
    {
        return Err(ConfigLoadError::Invalid(
            "database.url must start with postgres:// or postgresql://".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let load = compose_config(None, EnvConfig::default(), None).unwrap();
        assert_eq!(load.config.server.port, DEFAULT_PORT);
        assert_eq!(load.config.database.url, None);
        assert_eq!(load.config.pagination.page_size, 10);
        assert!(!load.warnings.is_empty());
    }

    #[test]
    fn environment_wins_over_file() {
        let file = write_config(
            r#"
dev_mode = true

[server]
port = 9000
host = "127.0.0.1"

[runner]
check_sleep_time = 1.5
check_success_rate = 0.5
"#,
        );

        let env = EnvConfig {
            server_port: Some(9100),
            check_success_rate: Some(0.9),
            ..EnvConfig::default()
        };
        let load = ConfigLoader::new()
            .with_config_path(file.path())
            .load_with_env(env)
            .unwrap();

        let config = load.config;
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.runner.check_sleep_time, 1.5);
        assert_eq!(config.runner.check_success_rate, 0.9);
        assert!(config.dev_mode);
        assert_eq!(config.metadata.config_path.as_deref(), Some(file.path()));
        assert!(load.warnings.is_empty());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::new()
            .with_config_path(dir.path().join("absent.toml"))
            .load_with_env(EnvConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let file = write_config("[server\nport = ");
        let err = ConfigLoader::new()
            .with_config_path(file.path())
            .load_with_env(EnvConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConfigLoadError::Parse { .. }));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let cases = [
            EnvConfig {
                check_exception_rate: Some(1.5),
                ..EnvConfig::default()
            },
            EnvConfig {
                check_sleep_time: Some(-1.0),
                ..EnvConfig::default()
            },
            EnvConfig {
                worker_concurrency: Some(0),
                ..EnvConfig::default()
            },
            EnvConfig {
                page_size: Some(500),
                ..EnvConfig::default()
            },
            EnvConfig {
                database_url: Some("mysql://localhost/db".into()),
                ..EnvConfig::default()
            },
        ];

        for env in cases {
            let err = compose_config(None, env, None).unwrap_err();
            assert!(matches!(err, ConfigLoadError::Invalid(_)), "{err}");
        }
    }

    #[test]
    fn slow_heartbeat_is_a_warning() {
        let env = EnvConfig {
            worker_heartbeat_interval_secs: Some(60),
            ..EnvConfig::default()
        };
        let load = compose_config(Some(FileConfig::default()), env, None).unwrap();
        assert_eq!(load.warnings.items.len(), 1);
        assert!(load.warnings.items[0].message.contains("flap"));
    }
}
