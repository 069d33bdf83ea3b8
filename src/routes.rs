use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        agreements::agreement_handler, evaluations::evaluation_handler,
        proposals::proposal_handler,
    },
    middleware::auth,
    AppState,
};

// Health check handler
async fn health_check(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Json<serde_json::Value> {
    let pending_chain_jobs = app_state
        .chain_sync_service
        .pending_jobs()
        .await
        .unwrap_or(-1);

    Json(json!({
        "status": "ok",
        "message": "Server is running",
        "pendingChainJobs": pending_chain_jobs
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_route = Router::new()
        .nest(
            "/proposals",
            proposal_handler()
                .layer(middleware::from_fn(auth))
        )
        .nest(
            "/agreements",
            agreement_handler()
                .layer(middleware::from_fn(auth))
        )
        .nest(
            "/evaluations",
            evaluation_handler()
                .layer(middleware::from_fn(auth))
        )
        .layer(TraceLayer::new_for_http());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/work", api_route)
        .layer(Extension(app_state))
}
