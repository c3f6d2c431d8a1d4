use axum::{Router, routing::get};

use crate::{
    AppState,
    handlers::{checks, findings, health, method_not_allowed, providers, scans},
};

/// Create all v1 API routes
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(create_provider_routes())
        .merge(create_scan_routes())
}

fn create_provider_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/providers",
            get(providers::list_providers).post(providers::create_provider),
        )
        .route(
            "/providers/{id}",
            get(providers::get_provider)
                .put(providers::replace_provider)
                .patch(providers::patch_provider)
                .delete(providers::delete_provider),
        )
        .route(
            "/providers/{provider_id}/checks",
            get(checks::list_checks).post(checks::create_check),
        )
        .route(
            "/providers/{provider_id}/checks/{id}",
            get(checks::get_check)
                .put(checks::replace_check)
                .patch(checks::patch_check)
                .delete(checks::delete_check),
        )
}

fn create_scan_routes() -> Router<AppState> {
    Router::new()
        .route("/scans", get(scans::list_scans).post(scans::create_scan))
        .route(
            "/scans/{id}",
            get(scans::get_scan)
                .put(scans::replace_scan)
                .patch(scans::patch_scan)
                .delete(scans::delete_scan),
        )
        .route("/scans/{id}/status", get(scans::get_scan_status))
        // Findings are written by the runner only.
        .route(
            "/scans/{scan_id}/findings",
            get(findings::list_findings).fallback(method_not_allowed),
        )
        .route(
            "/scans/{scan_id}/findings/{id}",
            get(findings::get_finding)
                .put(findings::update_finding)
                .patch(findings::update_finding)
                .fallback(method_not_allowed),
        )
}

#[cfg(test)]
mod tests {
    use scanward_core::api::routes::{relative, v1};

    #[test]
    fn relative_paths_match_the_route_constants() {
        assert_eq!(relative(v1::HEALTH), "/health");
        assert_eq!(relative(v1::providers::ITEM), "/providers/{id}");
        assert_eq!(
            relative(v1::providers::checks::ITEM),
            "/providers/{provider_id}/checks/{id}"
        );
        assert_eq!(relative(v1::scans::STATUS), "/scans/{id}/status");
        assert_eq!(
            relative(v1::scans::findings::ITEM),
            "/scans/{scan_id}/findings/{id}"
        );
    }
}
