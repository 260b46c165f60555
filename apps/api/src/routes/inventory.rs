//! Inventory handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use salesdesk_core::validation::validate_name;
use salesdesk_core::{Allocation, Inventory};

use super::allocations::{self, AllocationRequest};
use super::{contains_text, filter_value, sanitize_patch};
use crate::auth::Auth;
use crate::error::ApiResult;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct InventoryQuery {
    pub event: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
}

/// New items start with every ticket available, per category too.
fn fill_availability(item: &mut Inventory) {
    for category in &mut item.categories {
        if category.available_tickets == 0 {
            category.available_tickets = category.total_tickets;
        }
    }
    if item.total_tickets == 0 && item.has_categories() {
        item.total_tickets = item.categories.iter().map(|c| c.total_tickets).sum();
    }
    if item.available_tickets == 0 {
        item.available_tickets = item.total_tickets;
    }
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<InventoryQuery>,
) -> ApiResult<ApiResponse<Vec<Inventory>>> {
    let items = if query.include_deleted {
        state.db.inventory().list().await?
    } else {
        state.db.inventory().list_active().await?
    };
    let needle = filter_value(&query.event).map(str::to_lowercase);
    let mut items: Vec<Inventory> = items
        .into_iter()
        .filter(|i| needle.as_deref().map_or(true, |n| contains_text(Some(&i.event_name), n)))
        .collect();
    items.sort_by(|a, b| a.event_date.cmp(&b.event_date));
    let count = items.len();
    Ok(ApiResponse::success(items).with("count", count))
}

pub async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<ApiResponse<Inventory>> {
    Ok(ApiResponse::success(state.db.inventory().get_required(&id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Auth(user): Auth,
    Json(mut item): Json<Inventory>,
) -> ApiResult<ApiResponse<Inventory>> {
    user.require_inventory()?;
    validate_name("event_name", &item.event_name)?;

    let now = Utc::now();
    item.id = String::new();
    item.is_deleted = false;
    item.created_date = Some(now);
    item.updated_date = Some(now);
    item.extra.insert("created_by".into(), json!(user.email));
    fill_availability(&mut item);

    let item = state.db.inventory().insert(item).await?;
    info!(inventory = %item.id, event = %item.event_name, tickets = item.total_tickets, "Inventory created");
    Ok(ApiResponse::created(item))
}

pub async fn update(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> ApiResult<ApiResponse<Inventory>> {
    user.require_inventory()?;
    let mut patch = sanitize_patch(patch)?;
    if let Some(fields) = patch.as_object_mut() {
        fields.insert("updated_date".into(), json!(Utc::now()));
        fields.insert("updated_by".into(), json!(user.email));
    }
    let item = state.db.inventory().update(&id, &patch).await?;
    Ok(ApiResponse::success(item))
}

/// Soft delete: allocations keep pointing at the item.
pub async fn remove(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    user.require_inventory()?;
    let mut item = state.db.inventory().get_required(&id).await?;
    item.is_deleted = true;
    item.updated_date = Some(Utc::now());
    item.extra.insert("deleted_by".into(), json!(user.email));
    state.db.inventory().save(&item).await?;
    info!(inventory = %id, by = %user.email, "Inventory deleted");
    Ok(ApiResponse::message("Inventory deleted successfully"))
}

pub async fn allocate(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    Json(request): Json<AllocationRequest>,
) -> ApiResult<ApiResponse<Allocation>> {
    let allocation = allocations::allocate(&state, &user, &id, request).await?;
    Ok(ApiResponse::created(allocation).with_message("Tickets allocated successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use salesdesk_core::InventoryCategory;

    #[test]
    fn test_new_item_availability_from_categories() {
        let mut item = Inventory {
            event_name: "Final".into(),
            categories: vec![
                InventoryCategory { name: "Gold".into(), total_tickets: 10, ..Default::default() },
                InventoryCategory { name: "Silver".into(), total_tickets: 5, ..Default::default() },
            ],
            ..Default::default()
        };
        fill_availability(&mut item);
        assert_eq!(item.total_tickets, 15);
        assert_eq!(item.available_tickets, 15);
        assert_eq!(item.categories[1].available_tickets, 5);
    }
}
