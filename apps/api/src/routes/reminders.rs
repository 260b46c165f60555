//! Reminder handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use salesdesk_core::reminder::{self, ReminderStats};
use salesdesk_core::validation::validate_name;
use salesdesk_core::{Priority, Reminder, ReminderStatus};
use salesdesk_db::{collections, WriteOp};

use super::{filter_value, sanitize_patch};
use crate::auth::Auth;
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ReminderQuery {
    pub status: Option<String>,
    pub assigned_to: Option<String>,
    pub lead_id: Option<String>,
    pub priority: Option<String>,
    /// Only reminders flagged overdue.
    #[serde(default)]
    pub overdue: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    #[serde(default)]
    pub completion_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SnoozeRequest {
    pub snooze_until: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct EscalateRequest {
    pub escalate_to: String,
    #[serde(default)]
    pub reason: String,
}

/// Due date ascending, undated last.
fn sort_by_due(reminders: &mut [Reminder]) {
    reminders.sort_by(|a, b| match (a.due_date, b.due_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ReminderQuery>,
) -> ApiResult<ApiResponse<Vec<Reminder>>> {
    let status = filter_value(&query.status).map(str::parse::<ReminderStatus>).transpose()?;
    let priority = filter_value(&query.priority).map(str::parse::<Priority>).transpose()?;
    let assignee = filter_value(&query.assigned_to);

    let source = match filter_value(&query.lead_id) {
        Some(lead_id) => state.db.reminders().for_lead(lead_id).await?,
        None => state.db.reminders().list().await?,
    };
    let mut reminders: Vec<Reminder> = source
        .into_iter()
        .filter(|r| status.map_or(true, |s| r.status == s))
        .filter(|r| priority.map_or(true, |p| r.priority == p))
        .filter(|r| {
            assignee.map_or(true, |a| {
                r.assigned_to.as_deref().is_some_and(|to| to.eq_ignore_ascii_case(a))
            })
        })
        .filter(|r| !query.overdue || r.is_overdue)
        .collect();
    sort_by_due(&mut reminders);

    let count = reminders.len();
    Ok(ApiResponse::success(reminders).with("count", count))
}

pub async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<ApiResponse<Reminder>> {
    Ok(ApiResponse::success(state.db.reminders().get_required(&id).await?))
}

pub async fn for_lead(
    State(state): State<AppState>,
    Path(lead_id): Path<String>,
) -> ApiResult<ApiResponse<Vec<Reminder>>> {
    let mut reminders = state.db.reminders().for_lead(&lead_id).await?;
    sort_by_due(&mut reminders);
    Ok(ApiResponse::success(reminders))
}

pub async fn create(
    State(state): State<AppState>,
    Auth(user): Auth,
    Json(mut reminder): Json<Reminder>,
) -> ApiResult<ApiResponse<Reminder>> {
    if reminder.lead_id.trim().is_empty() {
        return Err(ApiError::bad_request("lead_id is required"));
    }
    validate_name("title", &reminder.title)?;
    let lead = state.db.leads().get_required(&reminder.lead_id).await?;

    let now = Utc::now();
    reminder.id = String::new();
    reminder.status = ReminderStatus::Pending;
    reminder.is_overdue = reminder.due_date.is_some_and(|due| due < now);
    reminder.auto_generated = false;
    if reminder.lead_name.is_none() {
        reminder.lead_name = lead.name.clone();
    }
    if reminder.assigned_to.is_none() {
        reminder.assigned_to = lead.assigned_to.clone().or_else(|| Some(user.email.clone()));
    }
    reminder.created_by = Some(user.email.clone());
    reminder.created_date = Some(now);
    reminder.updated_date = Some(now);

    let reminder = state.db.reminders().insert(reminder).await?;
    info!(reminder = %reminder.id, lead = %reminder.lead_id, "Reminder created");
    Ok(ApiResponse::created(reminder))
}

pub async fn update(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> ApiResult<ApiResponse<Reminder>> {
    let mut patch = sanitize_patch(patch)?;
    if let Some(fields) = patch.as_object_mut() {
        fields.insert("updated_date".into(), json!(Utc::now()));
        fields.insert("updated_by".into(), json!(user.email));
    }
    let reminder = state.db.reminders().update(&id, &patch).await?;
    Ok(ApiResponse::success(reminder))
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<ApiResponse<()>> {
    state.db.reminders().delete(&id).await?;
    Ok(ApiResponse::message("Reminder deleted successfully"))
}

pub async fn complete(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    request: Option<Json<CompleteRequest>>,
) -> ApiResult<ApiResponse<Reminder>> {
    let notes = request.and_then(|Json(r)| r.completion_notes);
    let mut reminder = state.db.reminders().get_required(&id).await?;
    reminder::complete(&mut reminder, &user.email, notes, Utc::now())?;
    state.db.reminders().save(&reminder).await?;
    Ok(ApiResponse::success(reminder).with_message("Reminder completed"))
}

pub async fn snooze(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SnoozeRequest>,
) -> ApiResult<ApiResponse<Reminder>> {
    let mut reminder = state.db.reminders().get_required(&id).await?;
    reminder::snooze(&mut reminder, request.snooze_until, Utc::now())?;
    state.db.reminders().save(&reminder).await?;
    Ok(ApiResponse::success(reminder).with_message("Reminder snoozed"))
}

pub async fn escalate(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    Json(request): Json<EscalateRequest>,
) -> ApiResult<ApiResponse<Reminder>> {
    let escalate_to = request.escalate_to.trim();
    if escalate_to.is_empty() {
        return Err(ApiError::bad_request("escalate_to is required"));
    }
    let mut reminder = state.db.reminders().get_required(&id).await?;
    reminder::escalate(&mut reminder, escalate_to, &request.reason, Utc::now());
    reminder.extra.insert("escalated_by".into(), json!(user.email));
    state.db.reminders().save(&reminder).await?;
    info!(reminder = %id, to = escalate_to, "Reminder escalated");
    Ok(ApiResponse::success(reminder).with_message("Reminder escalated"))
}

pub async fn stats(
    State(state): State<AppState>,
    Query(query): Query<ReminderQuery>,
) -> ApiResult<ApiResponse<ReminderStats>> {
    let reminders = match filter_value(&query.assigned_to) {
        Some(email) => state.db.reminders().for_assignee(email).await?,
        None => state.db.reminders().list().await?,
    };
    Ok(ApiResponse::success(reminder::summarize(&reminders, Utc::now())))
}

/// Re-derives overdue flags for every open reminder and writes the changed
/// ones in one batch.
pub async fn refresh_overdue(State(state): State<AppState>) -> ApiResult<ApiResponse<Value>> {
    let now = Utc::now();
    let mut open = state.db.reminders().list_open().await?;
    let ops = open
        .iter_mut()
        .filter_map(|r| reminder::refresh_overdue(r, now).then_some(r))
        .map(|r| WriteOp::set(collections::REMINDERS, &r.id, &*r))
        .collect::<Result<Vec<_>, _>>()?;

    let updated = ops.len();
    if updated > 0 {
        state.db.store().write_batch(&ops).await?;
    }
    info!(checked = open.len(), updated, "Refreshed overdue reminders");
    Ok(ApiResponse::success(json!({ "checked": open.len(), "updated": updated })))
}
