pub mod loader;
pub mod models;
pub mod sources;

pub use loader::{
    ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions, ConfigWarning, ConfigWarnings,
};
pub use models::{
    Config, ConfigMetadata, CorsConfig, DatabaseConfig, HealthConfig, PaginationConfig,
    RunnerConfig, ServerConfig, WorkerConfig,
};
