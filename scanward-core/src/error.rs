use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A referenced record (provider, check, scan, finding) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness or integrity violation, e.g. a duplicate name within a
    /// provider or a second finding for the same `(scan, check)` pair.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Cross-entity validation failure, e.g. a finding whose check and scan
    /// belong to different providers.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Malformed client input (blank names, oversize fields).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{kind} {id} not found"))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
