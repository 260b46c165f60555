//! Live sales-performance and retail-tracker views.
//!
//! Unlike `/performance-stats`, these compute from the store on a cache
//! miss. Results are kept in [`PerformanceCaches`](crate::state::PerformanceCaches)
//! and dropped whenever a write changes who is on the team or what they
//! sold.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use salesdesk_core::dates::{query_bound, Bound};
use salesdesk_core::period::DateRange;
use salesdesk_core::stats::{live_sales_team, retail_tracker as build_retail_tracker, RetailTrackerEntry, SalesTeamRow};
use salesdesk_core::{MemberType, CRORE};

use super::filter_value;
use crate::auth::Auth;
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::services::aggregation::load_input;
use crate::state::{AppState, SALES_TEAM_KEY};

#[derive(Debug, Default, Deserialize)]
pub struct RetailQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TargetRequest {
    /// Crores.
    pub target: f64,
}

#[derive(Debug, Deserialize)]
pub struct MemberRequest {
    #[serde(rename = "userId", alias = "user_id")]
    pub user_id: String,
    #[serde(rename = "type")]
    pub member_type: String,
}

fn retail_cache_key(start: Option<&str>, end: Option<&str>) -> String {
    format!("{}_{}", start.unwrap_or("all"), end.unwrap_or("all"))
}

// =============================================================================
// Views
// =============================================================================

pub async fn team(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<SalesTeamRow>>> {
    let key = SALES_TEAM_KEY.to_string();
    if let Some(hit) = state.caches.sales.get(&key).await {
        debug!(age = %hit.age_label(), "Sales team served from cache");
        return Ok(ApiResponse::success(hit.value.clone())
            .with("cached", true)
            .with("cacheAge", hit.age_label()));
    }

    let input = load_input(&state.db).await?;
    let rows = live_sales_team(&input, Utc::now());
    state.caches.sales.set(key, rows.clone()).await;
    Ok(ApiResponse::success(rows).with("cached", false))
}

pub async fn retail_tracker(
    State(state): State<AppState>,
    Query(query): Query<RetailQuery>,
) -> ApiResult<ApiResponse<Vec<RetailTrackerEntry>>> {
    let start = filter_value(&query.start_date);
    let end = filter_value(&query.end_date);
    let key = retail_cache_key(start, end);

    if let Some(hit) = state.caches.retail.get(&key).await {
        return Ok(ApiResponse::success(hit.value.clone())
            .with("cached", true)
            .with("cacheAge", hit.age_label()));
    }

    let range = match (start, end) {
        (None, None) => None,
        (start, end) => {
            let from = start.map(|s| query_bound(s, Bound::Start)).transpose()?;
            let to = end.map(|e| query_bound(e, Bound::End)).transpose()?;
            Some(DateRange::new(
                from.unwrap_or(chrono::DateTime::<Utc>::MIN_UTC),
                to.unwrap_or_else(Utc::now),
            ))
        }
    };

    let users = state.db.users().list().await?;
    let members = state.db.retail_members().list().await?;
    let leads = state.db.leads().list().await?;
    let mut entries = build_retail_tracker(&users, &members, &leads, range.as_ref());
    entries.sort_by(|a, b| b.assigned.cmp(&a.assigned));

    state.caches.retail.set(key, entries.clone()).await;
    Ok(ApiResponse::success(entries).with("cached", false))
}

// =============================================================================
// Team & Targets
// =============================================================================

/// Sets a target. The body is in crores; the store keeps rupees.
pub async fn set_target(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(user_id): Path<String>,
    Json(request): Json<TargetRequest>,
) -> ApiResult<ApiResponse<Value>> {
    user.require_admin()?;
    if !request.target.is_finite() || request.target < 0.0 {
        return Err(ApiError::bad_request("Target must be a non-negative number"));
    }
    state.db.users().get_required(&user_id).await?;

    let rupees = request.target * CRORE;
    state.db.targets().set_target(&user_id, rupees, &user.email).await?;
    state.caches.invalidate_sales().await;
    info!(user = %user_id, crores = request.target, by = %user.email, "Sales target updated");

    Ok(ApiResponse::success(json!({ "userId": user_id, "target": request.target }))
        .with_message("Target updated successfully"))
}

pub async fn add_member(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Json(request): Json<MemberRequest>,
) -> ApiResult<ApiResponse<Value>> {
    caller.require_admin()?;
    let member_type: MemberType = request.member_type.parse()?;
    let user = state.db.users().get_required(&request.user_id).await?;

    let member = match member_type {
        MemberType::Sales => state.db.sales_members().add(&user, &caller.email).await?,
        MemberType::Retail => state.db.retail_members().add(&user, &caller.email).await?,
    };
    match member_type {
        MemberType::Sales => state.caches.invalidate_sales().await,
        MemberType::Retail => state.caches.invalidate_retail().await,
    }
    info!(user = %user.email, team = %member_type, "Team member added");

    Ok(ApiResponse::success(json!({ "member": member, "type": member_type }))
        .with_message(format!("{} added to {} team", user.name, member_type)))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((user_id, member_type)): Path<(String, String)>,
) -> ApiResult<ApiResponse<()>> {
    caller.require_admin()?;
    let member_type: MemberType = member_type.parse()?;
    let removed = match member_type {
        MemberType::Sales => state.db.sales_members().remove_user(&user_id).await?,
        MemberType::Retail => state.db.retail_members().remove_user(&user_id).await?,
    };
    if !removed {
        return Err(ApiError::not_found(format!("User is not on the {} team", member_type)));
    }
    match member_type {
        MemberType::Sales => state.caches.invalidate_sales().await,
        MemberType::Retail => state.caches.invalidate_retail().await,
    }
    Ok(ApiResponse::message(format!("Removed from {} team", member_type)))
}

// =============================================================================
// Cache
// =============================================================================

pub async fn clear_cache(State(state): State<AppState>, Auth(user): Auth) -> ApiResult<ApiResponse<()>> {
    user.require_super_admin()?;
    state.caches.sales.clear().await;
    state.caches.retail.clear().await;
    state.ad_insights.clear_cache().await;
    info!(by = %user.email, "Performance caches cleared");
    Ok(ApiResponse::message("All caches cleared"))
}

pub async fn cache_status(State(state): State<AppState>) -> ApiResult<ApiResponse<Value>> {
    Ok(ApiResponse::success(json!({
        "salesPerformance": state.caches.sales.status().await,
        "retailTracker": state.caches.retail.status().await,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retail_cache_key() {
        assert_eq!(retail_cache_key(None, None), "all_all");
        assert_eq!(retail_cache_key(Some("2025-07-01"), None), "2025-07-01_all");
    }

    #[test]
    fn test_member_request_accepts_type_field() {
        let request: MemberRequest = serde_json::from_str(r#"{"userId":"u1","type":"retail"}"#).unwrap();
        assert_eq!(request.member_type.parse::<MemberType>().unwrap(), MemberType::Retail);
    }
}
