use axum::{Json, extract::State};

use scanward_core::{
    api::{
        routes::{fill, v1},
        types::{FindingResponse, Page, PageQuery, UpdateFindingRequest},
    },
    domain::{Finding, FindingId, ScanId},
};

use super::{ApiJson, ApiPath, ApiQuery};
use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

async fn load_finding(state: &AppState, scan_id: ScanId, id: FindingId) -> AppResult<Finding> {
    state
        .uow()
        .findings
        .get(scan_id, id)
        .await
        .map_err(state.errors())?
        .ok_or_else(|| AppError::not_found(format!("finding {id} not found for scan {scan_id}")))
}

pub async fn list_findings(
    State(state): State<AppState>,
    ApiPath(scan_id): ApiPath<ScanId>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Json<Page<FindingResponse>>> {
    let errors = state.errors();
    if state.uow().scans.get(scan_id).await.map_err(&errors)?.is_none() {
        return Err(AppError::not_found(format!("scan {scan_id} not found")));
    }

    let page = query.resolve(state.page_size());
    let findings = &state.uow().findings;
    let count = findings.count_for_scan(scan_id).await.map_err(&errors)?;
    let rows = findings
        .list_for_scan(scan_id, page)
        .await
        .map_err(&errors)?;

    let base = fill(
        v1::scans::findings::COLLECTION,
        &[("scan_id", scan_id.to_string())],
    );
    Ok(Json(Page::new(
        &base,
        page,
        count,
        rows.into_iter().map(FindingResponse::from).collect(),
    )))
}

pub async fn get_finding(
    State(state): State<AppState>,
    ApiPath((scan_id, id)): ApiPath<(ScanId, FindingId)>,
) -> AppResult<Json<FindingResponse>> {
    let finding = load_finding(&state, scan_id, id).await?;
    Ok(Json(FindingResponse::from(finding)))
}

/// Only the comment of a finding is writable. An absent `comment` leaves it
/// unchanged; `null` clears it.
pub async fn update_finding(
    State(state): State<AppState>,
    ApiPath((scan_id, id)): ApiPath<(ScanId, FindingId)>,
    ApiJson(request): ApiJson<UpdateFindingRequest>,
) -> AppResult<Json<FindingResponse>> {
    let finding = match request.comment {
        Some(comment) => state
            .uow()
            .findings
            .update_comment(scan_id, id, comment)
            .await
            .map_err(state.errors())?,
        None => load_finding(&state, scan_id, id).await?,
    };

    Ok(Json(FindingResponse::from(finding)))
}
