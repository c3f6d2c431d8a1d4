use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

use scanward_core::{
    api::{
        routes::{fill, v1},
        types::{CheckResponse, NameRequest, Page, PageQuery},
    },
    domain::{
        CheckId, ProviderId,
        names::{CHECK_NAME_MAX_LEN, normalize_name},
    },
};

use super::{ApiJson, ApiPath, ApiQuery, required};
use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

async fn ensure_provider(state: &AppState, provider_id: ProviderId) -> AppResult<()> {
    match state
        .uow()
        .providers
        .get(provider_id)
        .await
        .map_err(state.errors())?
    {
        Some(_) => Ok(()),
        None => Err(AppError::not_found(format!(
            "provider {provider_id} not found"
        ))),
    }
}

fn check_not_found(provider_id: ProviderId, id: CheckId) -> AppError {
    AppError::not_found(format!("check {id} not found for provider {provider_id}"))
}

pub async fn list_checks(
    State(state): State<AppState>,
    ApiPath(provider_id): ApiPath<ProviderId>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Json<Page<CheckResponse>>> {
    ensure_provider(&state, provider_id).await?;

    let errors = state.errors();
    let page = query.resolve(state.page_size());
    let checks = &state.uow().checks;
    let count = checks
        .count_for_provider(provider_id)
        .await
        .map_err(&errors)?;
    let rows = checks
        .list_for_provider(provider_id, page)
        .await
        .map_err(&errors)?;

    let base = fill(
        v1::providers::checks::COLLECTION,
        &[("provider_id", provider_id.to_string())],
    );
    Ok(Json(Page::new(
        &base,
        page,
        count,
        rows.into_iter().map(CheckResponse::from).collect(),
    )))
}

pub async fn create_check(
    State(state): State<AppState>,
    ApiPath(provider_id): ApiPath<ProviderId>,
    ApiJson(request): ApiJson<NameRequest>,
) -> AppResult<impl IntoResponse> {
    let errors = state.errors();
    let name = required("name", request.name)?;
    let name = normalize_name("name", &name, CHECK_NAME_MAX_LEN).map_err(&errors)?;

    let check = state
        .uow()
        .checks
        .create(provider_id, &name)
        .await
        .map_err(&errors)?;
    info!(%provider_id, check_id = %check.id, check = %check.name, "check created");

    Ok((StatusCode::CREATED, Json(CheckResponse::from(check))))
}

pub async fn get_check(
    State(state): State<AppState>,
    ApiPath((provider_id, id)): ApiPath<(ProviderId, CheckId)>,
) -> AppResult<Json<CheckResponse>> {
    let check = state
        .uow()
        .checks
        .get(provider_id, id)
        .await
        .map_err(state.errors())?
        .ok_or_else(|| check_not_found(provider_id, id))?;

    Ok(Json(CheckResponse::from(check)))
}

pub async fn replace_check(
    state: State<AppState>,
    path: ApiPath<(ProviderId, CheckId)>,
    ApiJson(request): ApiJson<NameRequest>,
) -> AppResult<Json<CheckResponse>> {
    let name = required("name", request.name)?;
    rename(state, path, Some(name)).await
}

pub async fn patch_check(
    state: State<AppState>,
    path: ApiPath<(ProviderId, CheckId)>,
    ApiJson(request): ApiJson<NameRequest>,
) -> AppResult<Json<CheckResponse>> {
    rename(state, path, request.name).await
}

async fn rename(
    State(state): State<AppState>,
    ApiPath((provider_id, id)): ApiPath<(ProviderId, CheckId)>,
    name: Option<String>,
) -> AppResult<Json<CheckResponse>> {
    let Some(name) = name else {
        return get_check(State(state), ApiPath((provider_id, id))).await;
    };

    let errors = state.errors();
    let name = normalize_name("name", &name, CHECK_NAME_MAX_LEN).map_err(&errors)?;
    let check = state
        .uow()
        .checks
        .rename(provider_id, id, &name)
        .await
        .map_err(&errors)?;

    Ok(Json(CheckResponse::from(check)))
}

pub async fn delete_check(
    State(state): State<AppState>,
    ApiPath((provider_id, id)): ApiPath<(ProviderId, CheckId)>,
) -> AppResult<StatusCode> {
    if state
        .uow()
        .checks
        .delete(provider_id, id)
        .await
        .map_err(state.errors())?
    {
        info!(%provider_id, check_id = %id, "check deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(check_not_found(provider_id, id))
    }
}
