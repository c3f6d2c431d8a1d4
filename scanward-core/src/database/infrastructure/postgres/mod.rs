//! PostgreSQL infrastructure adapters implementing the database ports.

pub(crate) mod errors;
pub mod repositories;

pub use repositories::checks::PostgresCheckRepository;
pub use repositories::findings::PostgresFindingRepository;
pub use repositories::providers::PostgresProviderRepository;
pub use repositories::scans::PostgresScanRepository;
