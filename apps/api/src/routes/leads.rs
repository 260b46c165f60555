//! Lead handlers, including client detection by phone number.
//!
//! Leads sharing a phone number belong to one client. A new lead for a known
//! client is linked to it and, unless told otherwise, goes to the sales
//! person who owns the client's primary lead.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use salesdesk_core::reminder::{auto_reminder, follow_up_for_assignment};
use salesdesk_core::validation::{client_id_for_phone, validate_email, validate_phone};
use salesdesk_core::{Lead, LeadStatus};
use salesdesk_db::{collections, Database, WriteOp};

use super::{contains_text, filter_value, sanitize_patch};
use crate::auth::{Auth, AuthenticatedUser};
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LeadQuery {
    pub status: Option<String>,
    pub assigned_to: Option<String>,
    pub source: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub assigned_to: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// What is known about the client behind a phone number.
#[derive(Debug, Clone, Serialize)]
pub struct ClientSuggestion {
    pub client_id: String,
    pub suggested_assigned_to: Option<String>,
    pub suggested_reason: String,
    pub total_leads: usize,
    pub events_interested: Vec<String>,
    pub client_history: Vec<Value>,
}

// =============================================================================
// Client Detection
// =============================================================================

struct ClientInfo {
    client_id: String,
    leads: Vec<Lead>,
    primary_assignee: Option<String>,
    events: Vec<String>,
}

async fn find_client(db: &Database, phone: &str) -> ApiResult<Option<ClientInfo>> {
    let mut leads = db.leads().find_by_phone(phone).await?;
    if leads.is_empty() {
        return Ok(None);
    }
    leads.sort_by(|a, b| a.created_date.cmp(&b.created_date));

    let client_id = leads
        .iter()
        .find_map(|l| l.client_id.clone())
        .or_else(|| client_id_for_phone(phone))
        .unwrap_or_default();
    let primary_assignee = leads
        .iter()
        .find(|l| l.is_primary_lead)
        .or_else(|| leads.first())
        .and_then(|l| l.assigned_to.clone());
    let mut events: Vec<String> = Vec::new();
    for event in leads.iter().filter_map(Lead::event) {
        if !events.iter().any(|e| e == event) {
            events.push(event.to_string());
        }
    }

    Ok(Some(ClientInfo {
        client_id,
        leads,
        primary_assignee,
        events,
    }))
}

impl ClientInfo {
    fn suggestion(&self, total_leads: usize) -> ClientSuggestion {
        let owner = self.primary_assignee.as_deref().unwrap_or("nobody");
        ClientSuggestion {
            client_id: self.client_id.clone(),
            suggested_assigned_to: self.primary_assignee.clone(),
            suggested_reason: format!(
                "This client has {} other lead(s) assigned to {}",
                self.leads.len(),
                owner
            ),
            total_leads,
            events_interested: self.events.clone(),
            client_history: self
                .leads
                .iter()
                .map(|l| {
                    json!({
                        "id": l.id,
                        "name": l.name,
                        "status": l.status,
                        "event": l.event(),
                        "assigned_to": l.assigned_to,
                        "created_date": l.created_date,
                    })
                })
                .collect(),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn ensure_can_edit(user: &AuthenticatedUser, lead: &Lead) -> ApiResult<()> {
    if user.role.can_manage_leads() || lead.is_assigned_to(&user.email) {
        Ok(())
    } else {
        Err(ApiError::forbidden("You can only edit leads assigned to you"))
    }
}

fn validate_contact(lead: &Lead) -> ApiResult<()> {
    if let Some(phone) = lead.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        validate_phone(phone)?;
    }
    if let Some(email) = lead.email.as_deref().filter(|e| !e.trim().is_empty()) {
        validate_email(email)?;
    }
    Ok(())
}

/// Stores the follow-up reminder for a newly assigned lead. A failure is
/// logged and does not fail the request.
async fn remind_assignee(db: &Database, lead: &Lead, assignee: &str, by: &str) {
    let reminder = follow_up_for_assignment(lead, assignee, by, Utc::now());
    if let Err(e) = db.reminders().insert(reminder).await {
        warn!(lead = %lead.id, error = %e, "Could not create assignment reminder");
    }
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<LeadQuery>,
) -> ApiResult<ApiResponse<Vec<Lead>>> {
    let status = filter_value(&query.status).map(|s| s.parse::<LeadStatus>().unwrap_or(LeadStatus::Unknown));
    let assigned_to = filter_value(&query.assigned_to);
    let source = filter_value(&query.source);
    let search = filter_value(&query.search).map(str::to_lowercase);

    let mut leads: Vec<Lead> = state
        .db
        .leads()
        .list()
        .await?
        .into_iter()
        .filter(|l| status.map_or(true, |s| l.status == s))
        .filter(|l| assigned_to.map_or(true, |a| l.is_assigned_to(a)))
        .filter(|l| source.map_or(true, |s| l.source.as_deref() == Some(s)))
        .filter(|l| {
            search.as_deref().map_or(true, |q| {
                contains_text(l.name.as_deref(), q)
                    || contains_text(l.email.as_deref(), q)
                    || contains_text(l.phone.as_deref(), q)
                    || contains_text(l.company.as_deref(), q)
            })
        })
        .collect();
    leads.sort_by(|a, b| b.created_date.cmp(&a.created_date));

    let count = leads.len();
    Ok(ApiResponse::success(leads).with("count", count))
}

pub async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<ApiResponse<Lead>> {
    Ok(ApiResponse::success(state.db.leads().get_required(&id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Auth(user): Auth,
    Json(mut lead): Json<Lead>,
) -> ApiResult<ApiResponse<Lead>> {
    let now = Utc::now();
    validate_contact(&lead)?;
    lead.id = String::new();
    lead.created_date = Some(now);
    lead.updated_date = Some(now);
    lead.date_of_enquiry.get_or_insert(now);
    lead.extra.insert("created_by".into(), json!(user.email));

    let phone = lead.phone.clone().filter(|p| !p.trim().is_empty());
    let client = match &phone {
        Some(phone) => find_client(&state.db, phone).await?,
        None => None,
    };

    let mut suggestion = None;
    let mut sibling_updates = Vec::new();
    match (&client, &phone) {
        (Some(client), _) => {
            match (&lead.assigned_to, &client.primary_assignee) {
                (None, Some(owner)) => lead.assigned_to = Some(owner.clone()),
                (Some(chosen), Some(owner)) if !chosen.eq_ignore_ascii_case(owner) => {
                    lead.manual_assignment_override = true;
                }
                _ => {}
            }
            let total = client.leads.len() + 1;
            let mut events = client.events.clone();
            if let Some(event) = lead.event() {
                if !events.iter().any(|e| e == event) {
                    events.push(event.to_string());
                }
            }
            lead.client_id = Some(client.client_id.clone());
            lead.is_primary_lead = false;
            lead.client_total_leads = Some(total as i64);
            lead.client_events = events.clone();

            let patch = json!({
                "client_id": client.client_id,
                "client_total_leads": total,
                "client_events": events,
                "client_last_activity": now,
            });
            for sibling in &client.leads {
                sibling_updates.push(WriteOp::update(collections::LEADS, &sibling.id, patch.clone()));
            }
            suggestion = Some(client.suggestion(total));
        }
        (None, Some(phone)) => {
            lead.client_id = client_id_for_phone(phone);
            lead.is_primary_lead = true;
            lead.client_total_leads = Some(1);
            lead.client_events = lead.event().map(String::from).into_iter().collect();
        }
        (None, None) => {}
    }

    if lead.assigned_to.is_some() {
        lead.assigned_date.get_or_insert(now);
        if lead.status == LeadStatus::Unassigned {
            lead.status = LeadStatus::Assigned;
        }
    }

    let lead = state.db.leads().insert(lead).await?;
    if !sibling_updates.is_empty() {
        state.db.store().write_batch(&sibling_updates).await?;
    }
    if let Some(assignee) = lead.assigned_to.clone() {
        remind_assignee(&state.db, &lead, &assignee, user.display_name()).await;
    }
    info!(lead = %lead.id, client = ?lead.client_id, "Lead created");

    let mut response = ApiResponse::created(lead);
    if let Some(suggestion) = suggestion {
        response = response
            .with("client_suggestion", suggestion)
            .with_message("Lead created and linked to existing client");
    }
    Ok(response)
}

pub async fn update(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> ApiResult<ApiResponse<Lead>> {
    let existing = state.db.leads().get_required(&id).await?;
    ensure_can_edit(&user, &existing)?;

    let mut patch = sanitize_patch(patch)?;
    let new_assignee = patch
        .get("assigned_to")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .filter(|a| !existing.is_assigned_to(a))
        .map(String::from);
    if let Some(fields) = patch.as_object_mut() {
        fields.insert("updated_date".into(), json!(Utc::now()));
        if new_assignee.is_some() {
            fields.insert("assigned_date".into(), json!(Utc::now()));
        }
    }

    let lead = state.db.leads().update(&id, &patch).await?;
    if let Some(assignee) = new_assignee {
        remind_assignee(&state.db, &lead, &assignee, user.display_name()).await;
    }
    Ok(ApiResponse::success(lead))
}

pub async fn remove(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    user.require_lead_manager()?;
    state.db.leads().delete(&id).await?;
    info!(lead = %id, by = %user.email, "Lead deleted");
    Ok(ApiResponse::message("Lead deleted successfully"))
}

pub async fn bulk_delete(
    State(state): State<AppState>,
    Auth(user): Auth,
    Json(request): Json<BulkDeleteRequest>,
) -> ApiResult<ApiResponse<Value>> {
    user.require_super_admin()?;
    if request.ids.is_empty() {
        return Err(ApiError::bad_request("No lead ids given"));
    }
    let ops: Vec<WriteOp> = request
        .ids
        .iter()
        .map(|id| WriteOp::delete(collections::LEADS, id))
        .collect();
    let report = state.db.store().write_batch(&ops).await?;
    info!(count = report.writes, chunks = report.chunks, by = %user.email, "Leads bulk deleted");

    Ok(ApiResponse::success(json!({ "deleted": report.writes }))
        .with_message(format!("Deleted {} leads", report.writes)))
}

pub async fn check_phone(
    State(state): State<AppState>,
    Path(phone): Path<String>,
) -> ApiResult<ApiResponse<Value>> {
    let data = match find_client(&state.db, &phone).await? {
        Some(client) => json!({
            "exists": true,
            "suggestion": client.suggestion(client.leads.len()),
        }),
        None => json!({ "exists": false }),
    };
    Ok(ApiResponse::success(data))
}

pub async fn assign(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    Json(request): Json<AssignRequest>,
) -> ApiResult<ApiResponse<Lead>> {
    user.require_lead_manager()?;
    let assignee = request.assigned_to.trim();
    if assignee.is_empty() {
        return Err(ApiError::bad_request("assigned_to is required"));
    }

    let mut lead = state.db.leads().get_required(&id).await?;
    let now = Utc::now();
    lead.assigned_to = Some(assignee.to_string());
    lead.assigned_date = Some(now);
    lead.updated_date = Some(now);
    if lead.status == LeadStatus::Unassigned {
        lead.status = LeadStatus::Assigned;
    }
    state.db.leads().save(&lead).await?;
    state
        .db
        .activity_logs()
        .record(
            &lead.id,
            "assignment",
            format!("Lead assigned to {}", assignee),
            Some(&user.email),
            json!({ "assigned_to": assignee }),
        )
        .await?;
    remind_assignee(&state.db, &lead, assignee, user.display_name()).await;

    Ok(ApiResponse::success(lead))
}

pub async fn change_status(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> ApiResult<ApiResponse<Lead>> {
    let status: LeadStatus = request.status.parse().unwrap_or(LeadStatus::Unknown);
    if status == LeadStatus::Unknown {
        return Err(ApiError::bad_request(format!("Unknown lead status: {}", request.status)));
    }

    let mut lead = state.db.leads().get_required(&id).await?;
    ensure_can_edit(&user, &lead)?;
    let previous = lead.status;
    let now = Utc::now();
    lead.status = status;
    lead.updated_date = Some(now);
    state.db.leads().save(&lead).await?;

    state
        .db
        .activity_logs()
        .record(
            &lead.id,
            "status_change",
            format!("Status changed from {} to {}", previous.as_str(), status.as_str()),
            Some(&user.email),
            json!({ "from": previous, "to": status, "notes": request.notes }),
        )
        .await?;

    if let Some(assignee) = lead.assigned_to.clone() {
        if let Some(reminder) = auto_reminder(&lead, &assignee, user.display_name(), now) {
            if let Err(e) = state.db.reminders().insert(reminder).await {
                warn!(lead = %lead.id, error = %e, "Could not create status reminder");
            }
        }
    }
    Ok(ApiResponse::success(lead))
}
