use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

use scanward_core::{
    api::{
        routes::v1,
        types::{NameRequest, Page, PageQuery, ProviderResponse},
    },
    domain::{
        ProviderId,
        names::{PROVIDER_NAME_MAX_LEN, normalize_name},
    },
};

use super::{ApiJson, ApiPath, ApiQuery, required};
use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

pub async fn list_providers(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Json<Page<ProviderResponse>>> {
    let errors = state.errors();
    let page = query.resolve(state.page_size());
    let providers = &state.uow().providers;

    let count = providers.count().await.map_err(&errors)?;
    let rows = providers.list(page).await.map_err(&errors)?;

    Ok(Json(Page::new(
        v1::providers::COLLECTION,
        page,
        count,
        rows.into_iter().map(ProviderResponse::from).collect(),
    )))
}

pub async fn create_provider(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NameRequest>,
) -> AppResult<impl IntoResponse> {
    let errors = state.errors();
    let name = required("name", request.name)?;
    let name = normalize_name("name", &name, PROVIDER_NAME_MAX_LEN).map_err(&errors)?;

    let provider = state.uow().providers.create(&name).await.map_err(&errors)?;
    info!(provider_id = %provider.id, name = %provider.name, "provider created");

    let created = state
        .uow()
        .providers
        .get(provider.id)
        .await
        .map_err(&errors)?
        .ok_or_else(|| AppError::not_found(format!("provider {} not found", provider.id)))?;

    Ok((StatusCode::CREATED, Json(ProviderResponse::from(created))))
}

pub async fn get_provider(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProviderId>,
) -> AppResult<Json<ProviderResponse>> {
    let provider = state
        .uow()
        .providers
        .get(id)
        .await
        .map_err(state.errors())?
        .ok_or_else(|| AppError::not_found(format!("provider {id} not found")))?;

    Ok(Json(ProviderResponse::from(provider)))
}

pub async fn replace_provider(
    state: State<AppState>,
    path: ApiPath<ProviderId>,
    ApiJson(request): ApiJson<NameRequest>,
) -> AppResult<Json<ProviderResponse>> {
    let name = required("name", request.name)?;
    rename(state, path, Some(name)).await
}

pub async fn patch_provider(
    state: State<AppState>,
    path: ApiPath<ProviderId>,
    ApiJson(request): ApiJson<NameRequest>,
) -> AppResult<Json<ProviderResponse>> {
    rename(state, path, request.name).await
}

async fn rename(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProviderId>,
    name: Option<String>,
) -> AppResult<Json<ProviderResponse>> {
    let errors = state.errors();
    if let Some(name) = name {
        let name = normalize_name("name", &name, PROVIDER_NAME_MAX_LEN).map_err(&errors)?;
        state.uow().providers.rename(id, &name).await.map_err(&errors)?;
    }

    get_provider(State(state), ApiPath(id)).await
}

pub async fn delete_provider(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProviderId>,
) -> AppResult<StatusCode> {
    if state
        .uow()
        .providers
        .delete(id)
        .await
        .map_err(state.errors())?
    {
        info!(provider_id = %id, "provider deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("provider {id} not found")))
    }
}
