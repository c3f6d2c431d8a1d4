use crate::error::CoreError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

/// Classify a sqlx failure by SQLSTATE. `context` names the operation and
/// prefixes the message.
pub(crate) fn map_db_err(context: &str, err: sqlx::Error) -> CoreError {
    if let Some(db_err) = err.as_database_error() {
        let constraint = db_err.constraint().unwrap_or("unknown constraint");
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                return CoreError::Conflict(format!(
                    "{context}: duplicate value violates {constraint}"
                ));
            }
            Some(FOREIGN_KEY_VIOLATION) => {
                return CoreError::NotFound(format!(
                    "{context}: referenced record does not exist ({constraint})"
                ));
            }
            Some(CHECK_VIOLATION) => {
                return CoreError::Validation(format!(
                    "{context}: value rejected by {constraint}"
                ));
            }
            _ => {}
        }
    }
    CoreError::Internal(format!("{context}: {err}"))
}

pub(crate) fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

pub(crate) fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
