//! Health check endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppResult, AppState};

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Current status of the service
    pub status: String,
    /// Version of the service
    pub version: String,
}

#[derive(Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub status: String,
    pub version: String,
    /// Configured storage backend
    pub storage: String,
    /// Number of books in the catalog
    pub books: u64,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check endpoint (checks storage connectivity)
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = ReadinessResponse),
        (status = 503, description = "Storage unavailable", body = crate::error::ErrorResponse)
    )
)]
pub async fn readiness_check(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<ReadinessResponse>)> {
    state.services.catalog.ping().await?;
    let books = state.services.catalog.count_books().await?;
    Ok((
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            storage: state.config.storage.backend.as_str().to_string(),
            books,
        }),
    ))
}
