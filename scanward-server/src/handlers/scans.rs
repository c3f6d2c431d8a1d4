use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{error, info};

use scanward_core::{
    api::{
        routes::v1,
        types::{
            CreateScanRequest, Page, PageQuery, ScanResponse, ScanStatusResponse,
            UpdateScanRequest,
        },
    },
    domain::{
        NewScan, Scan, ScanDetailsUpdate, ScanId,
        names::{SCAN_NAME_MAX_LEN, normalize_name},
    },
};

use super::{ApiJson, ApiPath, ApiQuery, required};
use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

fn scan_not_found(id: ScanId) -> AppError {
    AppError::not_found(format!("scan {id} not found"))
}

async fn with_summary(state: &AppState, scan: Scan) -> AppResult<ScanResponse> {
    let id = scan.id;
    let summary = state
        .uow()
        .scans
        .summary(id)
        .await
        .map_err(state.errors())?
        .ok_or_else(|| scan_not_found(id))?;
    Ok(ScanResponse::new(scan, summary))
}

async fn load_scan(state: &AppState, id: ScanId) -> AppResult<Scan> {
    state
        .uow()
        .scans
        .get(id)
        .await
        .map_err(state.errors())?
        .ok_or_else(|| scan_not_found(id))
}

pub async fn list_scans(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Json<Page<ScanResponse>>> {
    let errors = state.errors();
    let page = query.resolve(state.page_size());
    let scans = &state.uow().scans;

    let count = scans.count().await.map_err(&errors)?;
    let rows = scans.list(page).await.map_err(&errors)?;

    let mut results = Vec::with_capacity(rows.len());
    for scan in rows {
        // A scan deleted between the two reads drops out of the page.
        if let Some(summary) = scans.summary(scan.id).await.map_err(&errors)? {
            results.push(ScanResponse::new(scan, summary));
        }
    }

    Ok(Json(Page::new(v1::scans::COLLECTION, page, count, results)))
}

/// Create a pending scan and enqueue its run.
pub async fn create_scan(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateScanRequest>,
) -> AppResult<impl IntoResponse> {
    let errors = state.errors();
    let provider_id = required("provider_id", request.provider_id)?;
    let name = required("name", request.name)?;
    let name = normalize_name("name", &name, SCAN_NAME_MAX_LEN).map_err(&errors)?;

    let scan = state
        .uow()
        .scans
        .create(NewScan {
            provider_id,
            name,
            comment: request.comment,
        })
        .await
        .map_err(&errors)?;

    let job = state.jobs.enqueue(scan.id).await.map_err(|err| {
        error!(scan_id = %scan.id, error = %err, "failed to enqueue scan run");
        errors(err)
    })?;
    info!(scan_id = %scan.id, job_id = %job.id, %provider_id, "scan created and enqueued");

    let response = with_summary(&state, scan).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_scan(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ScanId>,
) -> AppResult<Json<ScanResponse>> {
    let scan = load_scan(&state, id).await?;
    Ok(Json(with_summary(&state, scan).await?))
}

pub async fn get_scan_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ScanId>,
) -> AppResult<Json<ScanStatusResponse>> {
    let scan = load_scan(&state, id).await?;
    Ok(Json(ScanStatusResponse {
        status: scan.status,
    }))
}

pub async fn replace_scan(
    state: State<AppState>,
    path: ApiPath<ScanId>,
    ApiJson(request): ApiJson<UpdateScanRequest>,
) -> AppResult<Json<ScanResponse>> {
    if request.name.is_none() {
        return Err(AppError::bad_request("name is required"));
    }
    update(state, path, request).await
}

pub async fn patch_scan(
    state: State<AppState>,
    path: ApiPath<ScanId>,
    ApiJson(request): ApiJson<UpdateScanRequest>,
) -> AppResult<Json<ScanResponse>> {
    update(state, path, request).await
}

/// `provider_id` in the body is ignored; only `name` and `comment` change.
async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ScanId>,
    request: UpdateScanRequest,
) -> AppResult<Json<ScanResponse>> {
    let errors = state.errors();
    let name = request
        .name
        .map(|name| normalize_name("name", &name, SCAN_NAME_MAX_LEN))
        .transpose()
        .map_err(&errors)?;

    let scan = state
        .uow()
        .scans
        .update_details(
            id,
            ScanDetailsUpdate {
                name,
                comment: request.comment,
            },
        )
        .await
        .map_err(&errors)?;

    Ok(Json(with_summary(&state, scan).await?))
}

pub async fn delete_scan(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ScanId>,
) -> AppResult<StatusCode> {
    if state
        .uow()
        .scans
        .delete(id)
        .await
        .map_err(state.errors())?
    {
        info!(scan_id = %id, "scan deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(scan_not_found(id))
    }
}
