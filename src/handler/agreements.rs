use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::workdtos::*, error::HttpError, handler::evaluations, middleware::JWTAuthMiddeware,
    AppState,
};

pub fn agreement_handler() -> Router {
    Router::new()
        .route("/", get(list_agreements))
        .route("/:agreement_id", get(get_agreement))
        .route("/:agreement_id/history", get(get_history))
        .route("/:agreement_id/pause", post(pause_agreement))
        .route("/:agreement_id/resume", post(resume_agreement))
        .route("/:agreement_id/close", post(close_agreement))
        .route("/:agreement_id/onchain", get(get_onchain_status))
        .route(
            "/:agreement_id/evaluations",
            post(evaluations::submit_evaluation).get(evaluations::get_agreement_evaluations),
        )
}

pub async fn list_agreements(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Query(query): Query<AgreementListQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(20);

    let (agreements, total) = app_state
        .agreement_service
        .list_agreements(auth.user.id, query.status, page, limit)
        .await?;

    Ok(Json(PaginatedResponse::new(agreements, total, page, limit)))
}

pub async fn get_agreement(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(agreement_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let agreement = app_state
        .agreement_service
        .get_agreement(agreement_id, auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Agreement retrieved successfully",
        agreement,
    )))
}

pub async fn get_history(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(agreement_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let history = app_state
        .agreement_service
        .get_history(agreement_id, auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Status history retrieved successfully",
        history,
    )))
}

pub async fn pause_agreement(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(agreement_id): Path<Uuid>,
    body: Option<Json<AgreementActionDto>>,
) -> Result<impl IntoResponse, HttpError> {
    let dto = body.map(|Json(dto)| dto).unwrap_or(AgreementActionDto { reason: None });
    dto.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let agreement = app_state
        .agreement_service
        .pause_agreement(agreement_id, auth.user.id, dto.reason)
        .await?;

    Ok(Json(ApiResponse::success("Agreement paused", agreement)))
}

pub async fn resume_agreement(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(agreement_id): Path<Uuid>,
    body: Option<Json<AgreementActionDto>>,
) -> Result<impl IntoResponse, HttpError> {
    let dto = body.map(|Json(dto)| dto).unwrap_or(AgreementActionDto { reason: None });
    dto.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let agreement = app_state
        .agreement_service
        .resume_agreement(agreement_id, auth.user.id, dto.reason)
        .await?;

    Ok(Json(ApiResponse::success("Agreement resumed", agreement)))
}

pub async fn close_agreement(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(agreement_id): Path<Uuid>,
    body: Option<Json<CloseAgreementDto>>,
) -> Result<impl IntoResponse, HttpError> {
    let dto = body.map(|Json(dto)| dto).unwrap_or(CloseAgreementDto { reason: None });
    dto.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let agreement = app_state
        .agreement_service
        .close_agreement(agreement_id, auth.user.id, dto.reason.as_deref().unwrap_or(""))
        .await?;

    Ok(Json(ApiResponse::success("Agreement closed", agreement)))
}

/// Registration state plus, when reachable, the live ledger record. Always
/// answers 200 for a party; ledger trouble only empties the `data` field.
pub async fn get_onchain_status(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(agreement_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let agreement = app_state
        .agreement_service
        .get_agreement(agreement_id, auth.user.id)
        .await?;

    let status = app_state
        .chain_sync_service
        .on_chain_status(&agreement)
        .await?;

    Ok(Json(ApiResponse::success(
        "On-chain status retrieved successfully",
        status,
    )))
}
