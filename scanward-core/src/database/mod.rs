pub mod infrastructure;
pub mod ports;
pub mod postgres;

pub use infrastructure::MemoryStore;
pub use ports::PageRequest;
pub use postgres::{PoolStats, PostgresDatabase};
