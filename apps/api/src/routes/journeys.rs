//! Customer journey handlers.
//!
//! A journey is created once per order. The customer follows it through
//! `/api/journeys/public/{token}` without logging in.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use salesdesk_core::{Journey, MilestoneStatus};

use crate::auth::Auth;
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateJourneyRequest {
    pub order_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MilestoneRequest {
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyView {
    #[serde(flatten)]
    pub journey: Journey,
    pub progress_percent: u32,
}

impl From<Journey> for JourneyView {
    fn from(journey: Journey) -> Self {
        JourneyView {
            progress_percent: journey.progress_percent(),
            journey,
        }
    }
}

pub async fn create(
    State(state): State<AppState>,
    Auth(user): Auth,
    Json(request): Json<CreateJourneyRequest>,
) -> ApiResult<ApiResponse<JourneyView>> {
    let order = state
        .db
        .orders()
        .resolve(request.order_id.trim())
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Order {} not found", request.order_id)))?;

    if let Some(existing) = state.db.journeys().for_order(&order.id).await? {
        return Ok(ApiResponse::success(JourneyView::from(existing)).with_message("Journey already exists"));
    }

    let now = Utc::now();
    let journey = Journey {
        order_id: order.id.clone(),
        lead_id: order.lead_id.clone(),
        client_name: order.client_name.clone(),
        event_name: order.event_name.clone(),
        event_date: order.event_date,
        access_token: Uuid::new_v4().simple().to_string(),
        milestones: Journey::default_milestones(),
        created_by: Some(user.email.clone()),
        created_date: Some(now),
        updated_date: Some(now),
        ..Default::default()
    };
    let journey = state.db.journeys().insert(journey).await?;
    info!(journey = %journey.id, order = %order.id, "Journey created");
    Ok(ApiResponse::created(JourneyView::from(journey)))
}

pub async fn public_view(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<ApiResponse<JourneyView>> {
    let journey = state
        .db
        .journeys()
        .find_by_token(&token)
        .await?
        .ok_or_else(|| ApiError::not_found("Journey not found"))?;
    Ok(ApiResponse::success(JourneyView::from(journey)))
}

pub async fn update_milestone(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path((id, key)): Path<(String, String)>,
    Json(request): Json<MilestoneRequest>,
) -> ApiResult<ApiResponse<JourneyView>> {
    let status: MilestoneStatus = request.status.parse()?;
    let mut journey = state.db.journeys().get_required(&id).await?;
    let now = Utc::now();

    let milestone = journey
        .milestones
        .iter_mut()
        .find(|m| m.key == key)
        .ok_or_else(|| ApiError::not_found(format!("Milestone {} not found", key)))?;
    milestone.status = status;
    milestone.completed_at = (status == MilestoneStatus::Completed).then_some(now);
    if request.notes.is_some() {
        milestone.notes = request.notes;
    }
    journey.updated_date = Some(now);
    journey.extra.insert("updated_by".into(), serde_json::json!(user.email));

    state.db.journeys().save(&journey).await?;
    Ok(ApiResponse::success(JourneyView::from(journey)))
}
