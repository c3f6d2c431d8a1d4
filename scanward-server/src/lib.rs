//! # Scanward Server
//!
//! HTTP API over providers, checks, scans and findings, plus the background
//! workers that execute scans.
//!
//! ## Architecture
//!
//! The server is built on Axum and uses:
//! - PostgreSQL (or an in-process store when no database is configured)
//! - a leased job queue feeding [`scanward_core::worker::WorkerPool`]
//! - worker heartbeats for the `/api/v1/health` endpoint

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Full application router with tracing and CORS applied.
pub fn create_app(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config().cors.allowed_origins);

    routes::create_api_router()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}
