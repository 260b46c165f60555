//! Events calendar handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use salesdesk_core::dates::ist_date_string;
use salesdesk_core::validation::validate_name;
use salesdesk_core::Event;
use salesdesk_db::DbError;

use super::{contains_text, filter_value, sanitize_patch};
use crate::auth::Auth;
use crate::error::ApiResult;
use crate::response::{ApiResponse, CsvFile};
use crate::services::csv_io::write_csv;
use crate::state::AppState;

const EXPORT_HEADERS: [&str; 9] = [
    "event_name",
    "event_date",
    "end_date",
    "event_type",
    "sport_type",
    "venue",
    "city",
    "country",
    "status",
];

#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    pub search: Option<String>,
    pub event_type: Option<String>,
    pub status: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> ApiResult<ApiResponse<Vec<Event>>> {
    let search = filter_value(&query.search).map(str::to_lowercase);
    let event_type = filter_value(&query.event_type);
    let status = filter_value(&query.status);

    let mut events: Vec<Event> = state
        .db
        .events()
        .list()
        .await?
        .into_iter()
        .filter(|e| {
            search.as_deref().map_or(true, |s| {
                contains_text(Some(&e.event_name), s) || contains_text(e.venue.as_deref(), s)
            })
        })
        .filter(|e| event_type.map_or(true, |t| e.event_type.as_deref() == Some(t)))
        .filter(|e| status.map_or(true, |s| e.status.as_deref() == Some(s)))
        .collect();
    events.sort_by(|a, b| a.event_date.cmp(&b.event_date));
    let count = events.len();
    Ok(ApiResponse::success(events).with("count", count))
}

pub async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<ApiResponse<Event>> {
    Ok(ApiResponse::success(state.db.events().get_required(&id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Auth(user): Auth,
    Json(mut event): Json<Event>,
) -> ApiResult<ApiResponse<Event>> {
    validate_name("event_name", &event.event_name)?;
    let now = Utc::now();
    event.id = String::new();
    event.event_name = event.event_name.trim().to_string();
    event.created_by = Some(user.email.clone());
    event.created_date = Some(now);
    event.updated_date = Some(now);

    let event = state.db.events().insert_unique(event).await?;
    info!(event = %event.id, name = %event.event_name, "Event created");
    Ok(ApiResponse::created(event))
}

pub async fn update(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> ApiResult<ApiResponse<Event>> {
    let mut patch = sanitize_patch(patch)?;
    if let Some(name) = patch.get("event_name").and_then(Value::as_str) {
        validate_name("event_name", name)?;
        let clash = state
            .db
            .events()
            .find_by_name(name)
            .await?
            .into_iter()
            .any(|e| e.id != id);
        if clash {
            return Err(DbError::duplicate("event_name", name).into());
        }
    }
    if let Some(fields) = patch.as_object_mut() {
        fields.insert("updated_date".into(), json!(Utc::now()));
        fields.insert("updated_by".into(), json!(user.email));
    }
    let event = state.db.events().update(&id, &patch).await?;
    Ok(ApiResponse::success(event))
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<ApiResponse<()>> {
    state.db.events().delete(&id).await?;
    Ok(ApiResponse::message("Event deleted successfully"))
}

pub async fn export(State(state): State<AppState>) -> ApiResult<CsvFile> {
    let mut events = state.db.events().list().await?;
    events.sort_by(|a, b| a.event_date.cmp(&b.event_date));

    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    let records = events.iter().map(|e| {
        vec![
            e.event_name.clone(),
            e.event_date.as_ref().map(ist_date_string).unwrap_or_default(),
            e.end_date.as_ref().map(ist_date_string).unwrap_or_default(),
            text(&e.event_type),
            text(&e.sport_type),
            text(&e.venue),
            text(&e.city),
            text(&e.country),
            text(&e.status),
        ]
    });
    let body = write_csv(&EXPORT_HEADERS, records)?;
    Ok(CsvFile::new(format!("events_{}.csv", ist_date_string(&Utc::now())), body))
}
