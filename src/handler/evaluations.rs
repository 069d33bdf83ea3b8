use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::workdtos::*, error::HttpError, middleware::JWTAuthMiddeware, AppState,
};

pub fn evaluation_handler() -> Router {
    Router::new()
        .route("/received", get(get_received_evaluations))
        .route("/given", get(get_given_evaluations))
}

pub async fn submit_evaluation(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(agreement_id): Path<Uuid>,
    Json(body): Json<SubmitEvaluationDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let result = app_state
        .evaluation_service
        .submit_evaluation(agreement_id, auth.user.id, body)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Evaluation submitted", result)),
    ))
}

pub async fn get_agreement_evaluations(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(agreement_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let evaluations = app_state
        .evaluation_service
        .agreement_evaluations(agreement_id, auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Evaluations retrieved successfully",
        evaluations,
    )))
}

pub async fn get_received_evaluations(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Query(query): Query<PageQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(20);

    let (evaluations, total) = app_state
        .evaluation_service
        .evaluations_received(auth.user.id, page, limit)
        .await?;

    Ok(Json(PaginatedResponse::new(evaluations, total, page, limit)))
}

pub async fn get_given_evaluations(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Query(query): Query<PageQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(20);

    let (evaluations, total) = app_state
        .evaluation_service
        .evaluations_given(auth.user.id, page, limit)
        .await?;

    Ok(Json(PaginatedResponse::new(evaluations, total, page, limit)))
}
