use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const STORAGE_HEALTH_KEY: &str = "health-check/non-existent-key";

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthCheckResponse {
    pub status: String,
    pub database: String,
    pub storage: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Database and storage reachable", body = HealthCheckResponse),
        (status = 503, description = "Database unreachable", body = HealthCheckResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut response = HealthCheckResponse {
        status: "healthy".to_string(),
        database: "unknown".to_string(),
        storage: "unknown".to_string(),
    };
    let mut overall_healthy = true;

    match tokio::time::timeout(HEALTH_TIMEOUT, state.videos.ping()).await {
        Ok(Ok(())) => response.database = "healthy".to_string(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Database health check failed");
            response.database = "unhealthy".to_string();
            overall_healthy = false;
        }
        Err(_) => {
            tracing::error!("Database health check timed out");
            response.database = "timeout".to_string();
            overall_healthy = false;
        }
    }

    // Existence check on a key that is never written: proves connectivity
    // and credentials without creating anything.
    match tokio::time::timeout(HEALTH_TIMEOUT, state.storage.object_exists(STORAGE_HEALTH_KEY)).await
    {
        Ok(Ok(_)) => response.storage = "healthy".to_string(),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Storage health check failed");
            response.storage = "degraded".to_string();
        }
        Err(_) => {
            tracing::warn!("Storage health check timed out");
            response.storage = "timeout".to_string();
        }
    }

    let status_code = if overall_healthy {
        StatusCode::OK
    } else {
        response.status = "unhealthy".to_string();
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

/// Liveness check: the process is up and serving requests.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses((status = 200, description = "Process is alive"))
)]
pub async fn liveness_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}
