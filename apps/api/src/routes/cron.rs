//! Scheduler endpoints.
//!
//! Public routes. When `cron.token` is configured, `update-stats` requires it
//! in the `x-cloudscheduler-token` header.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use tracing::{error, warn};

use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::services::aggregation::RunOutcome;
use crate::state::AppState;

pub const CRON_TOKEN_HEADER: &str = "x-cloudscheduler-token";

fn check_token(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let Some(expected) = state.config.cron.token.as_deref() else {
        return Ok(());
    };
    let given = headers.get(CRON_TOKEN_HEADER).and_then(|v| v.to_str().ok());
    if given != Some(expected) {
        warn!("Cron request rejected: bad scheduler token");
        return Err(ApiError::forbidden("Invalid scheduler token"));
    }
    Ok(())
}

pub async fn update_stats(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    check_token(&state, &headers)?;

    match state.aggregation.run("cron").await {
        Ok(RunOutcome::Completed(summary)) => Ok(ApiResponse::success(summary)
            .with_message("Stats updated successfully")
            .into_response()),
        Ok(RunOutcome::Skipped) => Ok(ApiResponse::success(json!({ "skipped": true }))
            .with_message("Aggregation already in progress, skipped")
            .into_response()),
        Err(e) => {
            error!(error = %e, "Cron aggregation failed");
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "code": "AGGREGATION_FAILED",
                    "error": e.to_string(),
                })),
            )
                .into_response())
        }
    }
}

/// 200 while the snapshot is fresh, 503 once it is stale or missing.
pub async fn health(State(state): State<AppState>) -> ApiResult<Response> {
    let health = state.aggregation.health(Utc::now()).await?;
    let (status, message) = if health.healthy {
        (StatusCode::OK, "Stats are up to date")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Stats are stale")
    };
    let body = json!({
        "success": health.healthy,
        "lastUpdate": health.last_update,
        "timeSinceUpdateMs": health.time_since_update_ms,
        "isRunning": health.is_running,
        "message": message,
    });
    Ok((status, Json(body)).into_response())
}
