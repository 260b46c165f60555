//! Marketing attribution handlers.
//!
//! Lead funnels come from the store; impressions come from the ads API and
//! fall back to zeros when it is unreachable or not configured.

use std::collections::HashMap;

use axum::extract::{Query, State};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use salesdesk_core::marketing::{marketing_report, GroupBy, MarketingFilters, MarketingReport};

use crate::error::ApiResult;
use crate::response::ApiResponse;
use crate::services::ad_insights::InsightsRange;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct InsightsQuery {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub campaign_id: Option<String>,
}

pub async fn performance(
    State(state): State<AppState>,
    Query(filters): Query<MarketingFilters>,
) -> ApiResult<ApiResponse<MarketingReport>> {
    let range = InsightsRange::from_query(filters.date_from.as_deref(), filters.date_to.as_deref(), Utc::now())?;
    let impressions: HashMap<String, u64> = match filters.group_by() {
        GroupBy::Source => state.ad_insights.impressions_by_platform_or_zero(&range).await,
        GroupBy::AdSet => state.ad_insights.impressions_by_ad_set_or_zero(&range).await,
        GroupBy::Event => HashMap::new(),
    };

    let leads = state.db.leads().list().await?;
    let report = marketing_report(&leads, &filters, &impressions)?;
    let count = report.marketing_data.len();
    Ok(ApiResponse::success(report)
        .with("count", count)
        .with("adInsightsConfigured", state.ad_insights.is_configured()))
}

pub async fn impressions_by_source(
    State(state): State<AppState>,
    Query(query): Query<InsightsQuery>,
) -> ApiResult<ApiResponse<HashMap<String, u64>>> {
    let range = InsightsRange::from_query(query.date_from.as_deref(), query.date_to.as_deref(), Utc::now())?;
    let impressions = state.ad_insights.impressions_by_platform_or_zero(&range).await;
    Ok(ApiResponse::success(impressions)
        .with("dateRange", json!({ "since": range.since, "until": range.until })))
}

/// Campaign and ad set insights. Unlike the impression lookups this does
/// not fall back: an upstream failure is a 503.
pub async fn ad_insights(
    State(state): State<AppState>,
    Query(query): Query<InsightsQuery>,
) -> ApiResult<ApiResponse<Value>> {
    let range = InsightsRange::from_query(query.date_from.as_deref(), query.date_to.as_deref(), Utc::now())?;
    let campaign = query.campaign_id.as_deref().filter(|c| !c.trim().is_empty());

    let campaigns = state.ad_insights.campaign_insights(&range).await?;
    let ad_sets = state.ad_insights.adset_insights(&range, campaign).await?;
    let cached = campaigns.is_cached() && ad_sets.is_cached();

    Ok(ApiResponse::success(json!({
        "campaigns": campaigns.value,
        "adSets": ad_sets.value,
        "dateRange": { "since": range.since, "until": range.until },
    }))
    .with("cached", cached))
}
