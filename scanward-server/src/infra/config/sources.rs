use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr};

use super::loader::ConfigLoadError;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub database: FileDatabaseConfig,
    #[serde(default)]
    pub runner: FileRunnerConfig,
    #[serde(default)]
    pub worker: FileWorkerConfig,
    #[serde(default)]
    pub health: FileHealthConfig,
    #[serde(default)]
    pub pagination: FilePaginationConfig,
    #[serde(default)]
    pub cors: FileCorsConfig,
    pub dev_mode: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileRunnerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_sleep_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_exception_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_success_rate: Option<f64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileWorkerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutdown_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileHealthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_window_secs: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FilePaginationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCorsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<Vec<String>>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub database_url: Option<String>,
    pub database_max_connections: Option<u32>,
    pub check_sleep_time: Option<f64>,
    pub check_exception_rate: Option<f64>,
    pub check_success_rate: Option<f64>,
    pub worker_concurrency: Option<usize>,
    pub worker_poll_interval_ms: Option<u64>,
    pub worker_heartbeat_interval_secs: Option<u64>,
    pub heartbeat_window_secs: Option<u64>,
    pub page_size: Option<u32>,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub dev_mode: Option<bool>,
}

impl EnvConfig {
    /// Read the process environment.
    pub fn gather() -> Result<Self, ConfigLoadError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read values through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            config_path: get("SCANWARD_CONFIG").map(PathBuf::from),
            server_host: get("SERVER_HOST"),
            server_port: parse_var(&get, "SERVER_PORT")?,
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_var(&get, "DB_MAX_CONNECTIONS")?,
            check_sleep_time: parse_var(&get, "CHECK_SLEEP_TIME")?,
            check_exception_rate: parse_var(&get, "CHECK_EXCEPTION_RATE")?,
            check_success_rate: parse_var(&get, "CHECK_SUCCESS_RATE")?,
            worker_concurrency: parse_var(&get, "WORKER_CONCURRENCY")?,
            worker_poll_interval_ms: parse_var(&get, "WORKER_POLL_INTERVAL_MS")?,
            worker_heartbeat_interval_secs: parse_var(&get, "WORKER_HEARTBEAT_INTERVAL_SECS")?,
            heartbeat_window_secs: parse_var(&get, "HEALTH_HEARTBEAT_WINDOW_SECS")?,
            page_size: parse_var(&get, "PAGE_SIZE")?,
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS").map(|raw| split_list(&raw)),
            dev_mode: get("DEV_MODE").map(|raw| parse_bool(&raw)),
        })
    }
}

fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>, ConfigLoadError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigLoadError::InvalidEnv {
                name: key.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
