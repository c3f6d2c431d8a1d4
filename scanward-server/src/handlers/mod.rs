//! Axum handlers for the v1 API.

pub mod checks;
pub mod findings;
pub mod health;
pub mod providers;
pub mod scans;

use axum::extract::{FromRequest, FromRequestParts};

use crate::infra::errors::AppError;

/// `Path` whose rejection renders as a JSON 404.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// `Json` whose rejection renders as a JSON 400.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `Query` whose rejection renders as a JSON 400.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Fallback for methods a resource does not support.
pub async fn method_not_allowed() -> AppError {
    AppError::method_not_allowed()
}

fn required<T>(field: &str, value: Option<T>) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::bad_request(format!("{field} is required")))
}
