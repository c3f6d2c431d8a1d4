//! Storage adapters implementing the database ports.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
