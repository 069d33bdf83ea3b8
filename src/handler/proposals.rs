use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::workdtos::*, error::HttpError, middleware::JWTAuthMiddeware, AppState,
};

pub fn proposal_handler() -> Router {
    Router::new()
        .route("/", post(create_proposal).get(list_proposals))
        .route("/:proposal_id", get(get_proposal).delete(cancel_proposal))
        .route("/:proposal_id/negotiate", post(start_negotiation))
        .route("/:proposal_id/counter", post(counter_offer))
        .route("/:proposal_id/accept", post(accept_proposal))
        .route("/:proposal_id/reject", post(reject_proposal))
}

pub async fn create_proposal(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateProposalDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let proposal = app_state
        .proposal_service
        .create_proposal(auth.user.id, body)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Proposal sent successfully", proposal)),
    ))
}

pub async fn list_proposals(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Query(query): Query<ProposalListQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(20);

    let (proposals, total) = app_state
        .proposal_service
        .list_proposals(
            auth.user.id,
            query.mailbox.unwrap_or_default(),
            query.status,
            page,
            limit,
        )
        .await?;

    Ok(Json(PaginatedResponse::new(proposals, total, page, limit)))
}

pub async fn get_proposal(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(proposal_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let proposal = app_state
        .proposal_service
        .get_proposal(proposal_id, auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Proposal retrieved successfully",
        proposal,
    )))
}

pub async fn start_negotiation(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(proposal_id): Path<Uuid>,
    body: Option<Json<StartNegotiationDto>>,
) -> Result<impl IntoResponse, HttpError> {
    let dto = body
        .map(|Json(dto)| dto)
        .unwrap_or(StartNegotiationDto { message: None });
    dto.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let proposal = app_state
        .proposal_service
        .start_negotiation(proposal_id, auth.user.id, dto)
        .await?;

    Ok(Json(ApiResponse::success("Negotiation started", proposal)))
}

pub async fn counter_offer(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(proposal_id): Path<Uuid>,
    Json(body): Json<CounterOfferDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let proposal = app_state
        .proposal_service
        .counter_offer(proposal_id, auth.user.id, body)
        .await?;

    Ok(Json(ApiResponse::success("Counter offer sent", proposal)))
}

pub async fn accept_proposal(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(proposal_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let result = app_state
        .proposal_service
        .accept_proposal(proposal_id, auth.user.id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "Proposal accepted and agreement created",
            result,
        )),
    ))
}

pub async fn reject_proposal(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(proposal_id): Path<Uuid>,
    body: Option<Json<RejectProposalDto>>,
) -> Result<impl IntoResponse, HttpError> {
    let dto = body
        .map(|Json(dto)| dto)
        .unwrap_or(RejectProposalDto { reason: None });
    dto.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let proposal = app_state
        .proposal_service
        .reject_proposal(proposal_id, auth.user.id, dto)
        .await?;

    Ok(Json(ApiResponse::success("Proposal rejected", proposal)))
}

pub async fn cancel_proposal(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(proposal_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let proposal = app_state
        .proposal_service
        .cancel_proposal(proposal_id, auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success("Proposal cancelled", proposal)))
}
