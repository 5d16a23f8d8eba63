//! Public API endpoints (no session required)

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::api::common::ApiResponse;
use crate::api::middleware::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// GET /api/public/health
async fn health(State(state): State<AppState>) -> Result<Json<ApiResponse<HealthResponse>>, ApiError> {
    if let Err(e) = state.pool.ping().await {
        tracing::error!("Health check failed: {:#}", e);
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Database tidak tersedia",
        ));
    }
    Ok(Json(ApiResponse::ok(HealthResponse { status: "ok" })))
}
