//! # Performance Stats Routes
//!
//! Read views over the stored stats snapshot. Nothing here recomputes
//! figures: the snapshot is rebuilt by the aggregation job (cron or
//! `POST /performance-stats/aggregate`).
//!
//! Every view carries `lastUpdated` and `nextUpdateIn`, the time left until
//! the next scheduled refresh.

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use salesdesk_core::dates::{format_time_until, to_iso_millis};
use salesdesk_core::stats::{
    sales_rows_in_crores, FinancialSummary, MarketingRollup, RetailTrackerEntry, SalesTeamRow, StatsSnapshot,
};
use salesdesk_core::Period;

use crate::auth::Auth;
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
}

async fn latest_snapshot(state: &AppState) -> ApiResult<StatsSnapshot> {
    state
        .db
        .stats()
        .latest()
        .await?
        .ok_or_else(|| ApiError::not_found("No stats available. Run the aggregation first."))
}

/// Time left until `computed_at + interval`, formatted for the dashboard.
fn next_update_in(computed_at: Option<DateTime<Utc>>, interval_mins: i64, now: DateTime<Utc>) -> String {
    match computed_at {
        Some(at) => format_time_until(at + Duration::minutes(interval_mins) - now),
        None => format_time_until(Duration::zero()),
    }
}

/// Wraps a view of the snapshot with its freshness fields.
fn snapshot_response<T: serde::Serialize>(
    state: &AppState,
    snapshot: &StatsSnapshot,
    data: T,
) -> ApiResponse<T> {
    let computed_at = snapshot.computed_at();
    ApiResponse::success(data)
        .with("lastUpdated", &snapshot.timestamp)
        .with(
            "nextUpdateIn",
            next_update_in(computed_at, state.config.stats.refresh_interval_mins, Utc::now()),
        )
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn financials(
    State(state): State<AppState>,
    Auth(user): Auth,
) -> ApiResult<ApiResponse<BTreeMap<String, FinancialSummary>>> {
    user.require_finance()?;
    let snapshot = latest_snapshot(&state).await?;
    let data = snapshot.financials.clone();
    Ok(snapshot_response(&state, &snapshot, data))
}

pub async fn sales_performance(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<ApiResponse<Vec<SalesTeamRow>>> {
    let period = match query.period.as_deref() {
        Some(p) if !p.trim().is_empty() => p.parse::<Period>()?,
        _ => Period::Lifetime,
    };
    let snapshot = latest_snapshot(&state).await?;
    let rows = sales_rows_in_crores(&snapshot.sales_performance, &period.key());
    Ok(snapshot_response(&state, &snapshot, rows).with("period", period.key()))
}

pub async fn retail_tracker(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<RetailTrackerEntry>>> {
    let snapshot = latest_snapshot(&state).await?;
    let mut entries: Vec<RetailTrackerEntry> = snapshot.retail_tracker.values().cloned().collect();
    entries.sort_by(|a, b| b.assigned.cmp(&a.assigned));
    Ok(snapshot_response(&state, &snapshot, entries))
}

pub async fn marketing_performance(State(state): State<AppState>) -> ApiResult<ApiResponse<MarketingRollup>> {
    let snapshot = latest_snapshot(&state).await?;
    let data = snapshot.marketing_performance.clone();
    Ok(snapshot_response(&state, &snapshot, data))
}

pub async fn metadata(State(state): State<AppState>) -> ApiResult<ApiResponse<Value>> {
    let snapshot = latest_snapshot(&state).await?;
    let marker = state.db.stats().marker().await?;
    let history = state.db.stats().history(10).await?;
    let data = json!({
        "timestamp": snapshot.timestamp,
        "lastUpdated": snapshot.last_updated,
        "metadata": snapshot.metadata,
        "isRunning": state.aggregation.is_running().await?,
        "lastRun": marker,
        "history": history,
    });
    Ok(snapshot_response(&state, &snapshot, data))
}

/// Starts a background aggregation run. 409 while another run is active.
pub async fn aggregate(State(state): State<AppState>, Auth(user): Auth) -> ApiResult<ApiResponse<Value>> {
    user.require_super_admin()?;
    state.aggregation.spawn(user.email.clone()).await?;
    info!(by = %user.email, "Manual aggregation started");
    Ok(ApiResponse::success(json!({
        "startedBy": user.email,
        "startedAt": to_iso_millis(&Utc::now()),
    }))
    .with_message("Aggregation started in the background")
    .with_status(StatusCode::ACCEPTED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_next_update_in_counts_down_from_last_run() {
        let at = Utc.with_ymd_and_hms(2025, 7, 1, 10, 0, 0).unwrap();
        let now = at + Duration::minutes(25);
        assert_eq!(next_update_in(Some(at), 120, now), "1h 35m");
        assert_eq!(next_update_in(Some(at), 120, at + Duration::hours(3)), "Due now");
        assert_eq!(next_update_in(None, 120, now), "Due now");
    }
}
