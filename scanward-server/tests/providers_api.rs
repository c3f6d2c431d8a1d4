use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{Value, json};

use scanward_core::{
    api::{
        routes::{fill, v1},
        types::{CheckResponse, Page, ProviderResponse},
    },
    domain::{CheckId, ProviderId},
};

mod support;
use support::{build_test_app, provider_checks_path, provider_path};

#[tokio::test]
async fn provider_lifecycle() -> Result<()> {
    let app = build_test_app()?;

    let created = app.create_provider("  AWS ").await;
    assert_eq!(created.name, "AWS");
    assert_eq!(created.checks_total, 0);
    assert_eq!(created.url, provider_path(created.id));
    assert_eq!(created.checks_url, provider_checks_path(created.id));

    let fetched: ProviderResponse = app.server.get(&provider_path(created.id)).await.json();
    assert_eq!(fetched, created);

    let renamed = app
        .server
        .patch(&provider_path(created.id))
        .json(&json!({ "name": "Amazon" }))
        .await;
    renamed.assert_status_ok();
    assert_eq!(renamed.json::<ProviderResponse>().name, "Amazon");

    app.server
        .delete(&provider_path(created.id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.server
        .get(&provider_path(created.id))
        .await
        .assert_status_not_found();
    Ok(())
}

#[tokio::test]
async fn duplicate_provider_name_conflicts() -> Result<()> {
    let app = build_test_app()?;
    app.create_provider("AWS").await;

    let response = app
        .server
        .post(v1::providers::COLLECTION)
        .json(&json!({ "name": "AWS" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let body: Value = response.json();
    assert_eq!(body["error"]["status"], 409);
    assert!(body["error"].get("detail").is_none());
    Ok(())
}

#[tokio::test]
async fn invalid_names_are_bad_requests() -> Result<()> {
    let app = build_test_app()?;

    for body in [
        json!({}),
        json!({ "name": "   " }),
        json!({ "name": "x".repeat(33) }),
    ] {
        app.server
            .post(v1::providers::COLLECTION)
            .json(&body)
            .await
            .assert_status_bad_request();
    }

    let provider = app.create_provider("AWS").await;
    app.server
        .put(&provider_path(provider.id))
        .json(&json!({}))
        .await
        .assert_status_bad_request();
    Ok(())
}

#[tokio::test]
async fn list_is_paginated_and_ordered_by_name() -> Result<()> {
    let app = build_test_app()?;
    app.seed_provider("GCP", &["iam_mfa"]).await;
    app.seed_provider("AWS", &["s3_public", "ec2_open_ports"]).await;
    app.seed_provider("Azure", &[]).await;

    let first: Page<ProviderResponse> = app
        .server
        .get(v1::providers::COLLECTION)
        .add_query_param("limit", 2)
        .await
        .json();
    assert_eq!(first.count, 3);
    assert_eq!(first.previous, None);
    assert_eq!(
        first.next.as_deref(),
        Some("/api/v1/providers?limit=2&offset=2")
    );
    let names: Vec<_> = first.results.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["AWS", "Azure"]);
    assert_eq!(first.results[0].checks_total, 2);

    let second: Page<ProviderResponse> = app
        .server
        .get(v1::providers::COLLECTION)
        .add_query_param("limit", 2)
        .add_query_param("offset", 2)
        .await
        .json();
    assert_eq!(second.next, None);
    assert_eq!(second.previous.as_deref(), Some("/api/v1/providers?limit=2"));
    assert_eq!(second.results.len(), 1);
    assert_eq!(second.results[0].checks_total, 1);

    app.server
        .get(v1::providers::COLLECTION)
        .add_query_param("limit", "many")
        .await
        .assert_status_bad_request();
    Ok(())
}

#[tokio::test]
async fn offset_beyond_the_collection_is_an_empty_page() -> Result<()> {
    let app = build_test_app()?;
    let aws = app.seed_provider("AWS", &["s3_public"]).await;

    for path in [
        v1::providers::COLLECTION.to_string(),
        provider_checks_path(aws.id),
        v1::scans::COLLECTION.to_string(),
    ] {
        let response = app
            .server
            .get(&path)
            .add_query_param("offset", u64::MAX)
            .await;
        response.assert_status_ok();
        let page: Page<Value> = response.json();
        assert!(page.results.is_empty());
        assert_eq!(page.next, None);
    }
    Ok(())
}

#[tokio::test]
async fn checks_are_scoped_to_their_provider() -> Result<()> {
    let app = build_test_app()?;
    let aws = app.create_provider("AWS").await;
    let gcp = app.create_provider("GCP").await;

    let check = app.create_check(aws.id, "s3_public").await;
    assert_eq!(check.provider_id, aws.id);
    assert_eq!(check.provider_url, provider_path(aws.id));

    // Same name under another provider is fine, under the same one it is not.
    app.create_check(gcp.id, "s3_public").await;
    app.server
        .post(&provider_checks_path(aws.id))
        .json(&json!({ "name": "s3_public" }))
        .await
        .assert_status(StatusCode::CONFLICT);

    let listed: Page<CheckResponse> = app.server.get(&provider_checks_path(aws.id)).await.json();
    assert_eq!(listed.count, 1);
    assert_eq!(listed.results[0].id, check.id);

    // A check is not reachable through a foreign provider.
    let foreign = fill(
        v1::providers::checks::ITEM,
        &[("provider_id", gcp.id.to_string()), ("id", check.id.to_string())],
    );
    app.server.get(&foreign).await.assert_status_not_found();

    let renamed: CheckResponse = app
        .server
        .put(&check.url)
        .json(&json!({ "name": "s3_bucket_public" }))
        .await
        .json();
    assert_eq!(renamed.name, "s3_bucket_public");

    app.server
        .delete(&check.url)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.server.get(&check.url).await.assert_status_not_found();
    Ok(())
}

#[tokio::test]
async fn missing_parents_and_bad_ids_are_not_found() -> Result<()> {
    let app = build_test_app()?;
    let ghost = ProviderId::new();

    app.server
        .get(&provider_checks_path(ghost))
        .await
        .assert_status_not_found();
    app.server
        .post(&provider_checks_path(ghost))
        .json(&json!({ "name": "s3_public" }))
        .await
        .assert_status_not_found();
    app.server
        .delete(&provider_path(ghost))
        .await
        .assert_status_not_found();

    let check = fill(
        v1::providers::checks::ITEM,
        &[("provider_id", ghost.to_string()), ("id", CheckId::new().to_string())],
    );
    app.server.get(&check).await.assert_status_not_found();

    app.server
        .get("/api/v1/providers/not-a-uuid")
        .await
        .assert_status_not_found();
    Ok(())
}
