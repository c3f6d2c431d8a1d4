use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use scanward_core::CoreError;

pub type AppResult<T> = Result<T, AppError>;

/// Error surfaced to API clients as `{"error": {"message", "status", "detail"?}}`.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub detail: Option<String>,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            detail: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Map a core error. Internal failures are logged in full; their text
    /// reaches the client only when `expose_detail` is set.
    pub fn from_core(err: CoreError, expose_detail: bool) -> Self {
        match err {
            CoreError::NotFound(msg) => Self::not_found(msg),
            CoreError::Conflict(msg) => Self::conflict(msg),
            CoreError::Validation(msg) => Self::unprocessable(msg),
            CoreError::InvalidInput(msg) => Self::bad_request(msg),
            CoreError::Serialization(_) | CoreError::Internal(_) => {
                tracing::error!(error = %err, "request failed with an internal error");
                let base = Self::internal("Internal server error");
                if expose_detail {
                    base.with_detail(err.to_string())
                } else {
                    base
                }
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut error = json!({
            "message": self.message,
            "status": self.status.as_u16(),
        });
        if let Some(detail) = self.detail {
            error["detail"] = json!(detail);
        }

        (self.status, Json(json!({ "error": error }))).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        Self::from_core(err, false)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::not_found(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_statuses() {
        let cases = [
            (CoreError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CoreError::Conflict("x".into()), StatusCode::CONFLICT),
            (CoreError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (CoreError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (CoreError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }

    #[test]
    fn internal_detail_only_in_dev_mode() {
        let hidden = AppError::from_core(CoreError::Internal("pool timed out".into()), false);
        assert_eq!(hidden.message, "Internal server error");
        assert!(hidden.detail.is_none());

        let shown = AppError::from_core(CoreError::Internal("pool timed out".into()), true);
        assert_eq!(shown.detail.as_deref(), Some("Internal error: pool timed out"));
    }

    #[test]
    fn client_errors_keep_their_message() {
        let err = AppError::from_core(CoreError::Conflict("name taken".into()), true);
        assert_eq!(err.message, "name taken");
        assert!(err.detail.is_none());
    }
}
