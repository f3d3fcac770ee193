//! health check endpoint handler

use std::time::Duration;

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use shipyard_db::Database;
use tokio::time::timeout;
use tracing::warn;

use crate::AppState;

/// content type for health responses (RFC draft "health check response format")
const HEALTH_CONTENT_TYPE: &str = "application/health+json; charset=utf-8";

const PING_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// GET /health
///
/// 200 `{"status":"pass"}` when the database answers a ping within one
/// second, otherwise 500 `{"status":"fail"}`.
pub async fn health(State(state): State<AppState>) -> Response {
    let (code, status) = match timeout(PING_TIMEOUT, state.db.ping()).await {
        Ok(Ok(())) => (StatusCode::OK, "pass"),
        Ok(Err(e)) => {
            warn!(error = %e, "health check: database ping failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "fail")
        }
        Err(_) => {
            warn!("health check: database ping timed out");
            (StatusCode::INTERNAL_SERVER_ERROR, "fail")
        }
    };

    (
        code,
        [(header::CONTENT_TYPE, HEALTH_CONTENT_TYPE)],
        Json(HealthResponse { status }),
    )
        .into_response()
}
