//! Allocation handlers.
//!
//! An allocation and the stock it takes from its inventory item are written
//! in one batch, both ways.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use salesdesk_core::bulk::{allocation_export_record, ALLOCATION_EXPORT_HEADERS};
use salesdesk_core::dates::ist_date_string;
use salesdesk_core::validation::validate_positive;
use salesdesk_core::{Allocation, CoreError, Money};
use salesdesk_db::new_id;

use super::filter_value;
use crate::auth::{Auth, AuthenticatedUser};
use crate::error::{ApiError, ApiResult};
use crate::response::{ApiResponse, CsvFile};
use crate::services::csv_io::write_csv;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AllocationQuery {
    pub inventory_id: Option<String>,
    pub lead_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllocationRequest {
    #[serde(default)]
    pub inventory_id: Option<String>,
    pub lead_id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    pub tickets_allocated: i64,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub stand_section: Option<String>,
    #[serde(default)]
    pub selling_price: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Takes tickets from an inventory item for a lead and stores the
/// allocation. Shared by `POST /allocations` and
/// `POST /inventory/{id}/allocate`.
pub(crate) async fn allocate(
    state: &AppState,
    user: &AuthenticatedUser,
    inventory_id: &str,
    request: AllocationRequest,
) -> ApiResult<Allocation> {
    user.require_inventory()?;
    validate_positive("tickets_allocated", request.tickets_allocated as f64)?;

    let mut inventory = state.db.inventory().get_required(inventory_id).await?;
    let lead = state.db.leads().get_required(&request.lead_id).await?;

    let category = match request.category_name.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(name) if inventory.has_categories() => Some(
            inventory
                .find_category(name, request.stand_section.as_deref())
                .ok_or_else(|| CoreError::CategoryNotFound {
                    event: inventory.event_name.clone(),
                    category: name.to_string(),
                })?,
        ),
        _ => None,
    };
    inventory.allocate(category, request.tickets_allocated)?;
    let now = Utc::now();
    inventory.updated_date = Some(now);

    let cat = category.and_then(|idx| inventory.categories.get(idx));
    let buying_price = cat.and_then(|c| c.buying_price).or(inventory.buying_price).unwrap_or(0.0);
    let selling_price = request
        .selling_price
        .or_else(|| cat.and_then(|c| c.selling_price))
        .or(inventory.selling_price);

    let mut order = match request.order_id.as_deref() {
        Some(key) => state.db.orders().resolve(key).await?,
        None => None,
    };

    let mut allocation = Allocation {
        id: new_id(),
        lead_id: Some(lead.id.clone()),
        order_id: order.as_ref().map(|o| o.id.clone()),
        order_number: order.as_ref().and_then(|o| o.order_number.clone()),
        order_ids: order.iter().map(|o| o.id.clone()).collect(),
        inventory_id: Some(inventory.id.clone()),
        event_name: Some(inventory.event_name.clone()),
        category_name: cat.map(|c| c.name.clone()).or(request.category_name.clone()),
        stand_section: cat.and_then(|c| c.section.clone()).or(request.stand_section.clone()),
        tickets_allocated: request.tickets_allocated,
        selling_price,
        buying_price: Some(buying_price),
        total_buying_price: Some((Money::from_rupees(buying_price) * request.tickets_allocated).rupees()),
        allocation_date: Some(now),
        notes: request.notes.clone(),
        created_by: Some(user.email.clone()),
        ..Default::default()
    };
    allocation.extra.insert("lead_name".into(), json!(lead.name));

    state.db.allocations().create_with_inventory(&allocation, &inventory).await?;
    if let Some(order) = order.as_mut() {
        order.allocation_ids.push(allocation.id.clone());
        order.updated_date = Some(now);
        state.db.orders().save(order).await?;
    }
    Ok(allocation)
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<AllocationQuery>,
) -> ApiResult<ApiResponse<Vec<Allocation>>> {
    let repo = state.db.allocations();
    let mut allocations = match (filter_value(&query.inventory_id), filter_value(&query.lead_id)) {
        (Some(inventory), lead) => repo
            .for_inventory(inventory)
            .await?
            .into_iter()
            .filter(|a| lead.map_or(true, |l| a.lead_id.as_deref() == Some(l)))
            .collect(),
        (None, Some(lead)) => repo.for_lead(lead).await?,
        (None, None) => repo.list().await?,
    };
    allocations.sort_by(|a, b| b.allocation_date.cmp(&a.allocation_date));
    Ok(ApiResponse::success(allocations))
}

pub async fn create(
    State(state): State<AppState>,
    Auth(user): Auth,
    Json(request): Json<AllocationRequest>,
) -> ApiResult<ApiResponse<Allocation>> {
    let inventory_id = request
        .inventory_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("inventory_id is required"))?;
    let allocation = allocate(&state, &user, &inventory_id, request).await?;
    Ok(ApiResponse::created(allocation))
}

/// Deletes an allocation and returns its tickets to stock.
pub async fn unallocate(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    user.require_inventory()?;
    let allocation = state.db.allocations().get_required(&id).await?;

    let mut inventory = match allocation.inventory_id.as_deref() {
        Some(inventory_id) => state.db.inventory().get(inventory_id).await?,
        None => None,
    };
    if let Some(inventory) = inventory.as_mut() {
        let category = allocation
            .category_name
            .as_deref()
            .and_then(|name| inventory.find_category(name, allocation.stand_section.as_deref()));
        inventory.release(category, allocation.tickets_allocated);
        inventory.updated_date = Some(Utc::now());
    }
    state
        .db
        .allocations()
        .remove_with_inventory(&id, inventory.as_ref())
        .await?;

    if let Some(order_id) = allocation.order_id.as_deref() {
        if let Some(mut order) = state.db.orders().get(order_id).await? {
            order.allocation_ids.retain(|a| a != &id);
            state.db.orders().save(&order).await?;
        }
    }
    info!(
        allocation = %id,
        tickets = allocation.tickets_allocated,
        by = %user.email,
        "Allocation removed"
    );
    Ok(ApiResponse::message("Allocation removed and tickets returned to inventory"))
}

pub async fn export(
    State(state): State<AppState>,
    Query(query): Query<AllocationQuery>,
) -> ApiResult<CsvFile> {
    let allocations = match filter_value(&query.inventory_id) {
        Some(inventory) => state.db.allocations().for_inventory(inventory).await?,
        None => state.db.allocations().list().await?,
    };
    let lead_ids: Vec<String> = allocations.iter().filter_map(|a| a.lead_id.clone()).collect();
    let names: HashMap<String, Option<String>> = state
        .db
        .leads()
        .get_many(&lead_ids)
        .await?
        .into_iter()
        .map(|l| (l.id, l.name))
        .collect();

    let records = allocations.iter().map(|a| {
        let lead_name = a
            .lead_id
            .as_deref()
            .and_then(|id| names.get(id))
            .and_then(|n| n.as_deref());
        allocation_export_record(a, lead_name)
    });
    let body = write_csv(&ALLOCATION_EXPORT_HEADERS, records)?;
    Ok(CsvFile::new(
        format!("allocations_{}.csv", ist_date_string(&Utc::now())),
        body,
    ))
}
