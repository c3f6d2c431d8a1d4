//! PostgreSQL-backed repository implementations.

pub mod checks;
pub mod findings;
pub mod providers;
pub mod scans;
