use std::sync::Arc;

use anyhow::{Result, anyhow};
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;

use scanward_core::{
    api::{
        routes::{fill, v1},
        types::{CheckResponse, ProviderResponse, ScanResponse},
    },
    domain::ProviderId,
    runner::ScanRunner,
    worker::ScanWorker,
};
use scanward_server::{
    AppState, create_app,
    infra::{config::Config, startup::in_memory_state},
};

// Code is used by test modules, but not in every one of them
#[allow(unused)]
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
}

/// Runner that never sleeps, never errors and passes every check.
#[allow(unused)]
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.runner.check_sleep_time = 0.0;
    config.runner.check_exception_rate = 0.0;
    config.runner.check_success_rate = 1.0;
    config
}

#[allow(unused)]
pub fn build_test_app() -> Result<TestApp> {
    build_test_app_with(test_config())
}

#[allow(unused)]
pub fn build_test_app_with(config: Config) -> Result<TestApp> {
    let state = in_memory_state(Arc::new(config));
    let server =
        TestServer::new(create_app(state.clone())).map_err(|err| anyhow!(err.to_string()))?;
    Ok(TestApp { server, state })
}

#[allow(unused)]
impl TestApp {
    pub async fn create_provider(&self, name: &str) -> ProviderResponse {
        let response = self
            .server
            .post(v1::providers::COLLECTION)
            .json(&json!({ "name": name }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    pub async fn create_check(&self, provider_id: ProviderId, name: &str) -> CheckResponse {
        let response = self
            .server
            .post(&provider_checks_path(provider_id))
            .json(&json!({ "name": name }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    pub async fn create_scan(&self, provider_id: ProviderId, name: &str) -> ScanResponse {
        let response = self
            .server
            .post(v1::scans::COLLECTION)
            .json(&json!({ "provider_id": provider_id, "name": name }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    /// Provider with the given checks.
    pub async fn seed_provider(&self, name: &str, checks: &[&str]) -> ProviderResponse {
        let provider = self.create_provider(name).await;
        for check in checks {
            self.create_check(provider.id, check).await;
        }
        provider
    }

    /// Process queued scan runs until the queue is empty.
    pub async fn drain_jobs(&self) -> Result<usize> {
        let runner = ScanRunner::new(
            self.state.uow().clone(),
            self.state.config().runner_settings(),
        );
        let worker = ScanWorker::new("test-worker", runner, Arc::clone(&self.state.jobs));

        let mut processed = 0;
        while worker.process_next().await? {
            processed += 1;
        }
        Ok(processed)
    }
}

#[allow(unused)]
pub fn provider_path(id: ProviderId) -> String {
    fill(v1::providers::ITEM, &[("id", id.to_string())])
}

#[allow(unused)]
pub fn provider_checks_path(provider_id: ProviderId) -> String {
    fill(
        v1::providers::checks::COLLECTION,
        &[("provider_id", provider_id.to_string())],
    )
}
