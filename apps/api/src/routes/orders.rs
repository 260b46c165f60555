//! Order handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use salesdesk_core::dates::{ist_date_string, to_iso_millis};
use salesdesk_core::{CoreError, LedgerEntry, Money, Order, OrderStatus};

use super::{filter_value, sanitize_patch};
use crate::auth::Auth;
use crate::error::{ApiError, ApiResult};
use crate::response::{ApiResponse, CsvFile};
use crate::services::csv_io::write_csv;
use crate::state::AppState;

const EXPORT_HEADERS: [&str; 11] = [
    "order_number",
    "client_name",
    "event_name",
    "event_date",
    "status",
    "payment_currency",
    "exchange_rate",
    "final_amount",
    "inr_equivalent",
    "sales_person",
    "created_date",
];

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<String>,
    pub sales_person: Option<String>,
    pub event: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApprovalRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SalesPersonRequest {
    pub sales_person: String,
}

// =============================================================================
// Currency
// =============================================================================

/// Fills the `*_inr` fields from the order's own amounts and exchange rate.
/// INR orders convert at 1.
fn apply_inr_amounts(order: &mut Order) {
    let rate = if order.is_inr() { 1.0 } else { order.exchange_rate() };
    let inr = |amount: Option<f64>| Money::from_rupees(amount.unwrap_or(0.0)).convert(rate).rupees();

    let final_amount = order.final_amount.or(order.total_amount);
    order.extra.insert("inr_equivalent".into(), json!(inr(final_amount)));
    order.extra.insert("final_amount_inr".into(), json!(inr(final_amount)));
    order.extra.insert("base_amount_inr".into(), json!(inr(order.base_amount)));
    order.extra.insert("advance_amount_inr".into(), json!(inr(order.advance_amount)));
}

fn is_post_service(order: &Order) -> bool {
    order.extra.get("payment_post_service").and_then(Value::as_bool) == Some(true)
        || order.extra.get("lead_status").and_then(Value::as_str) == Some("payment_post_service")
}

fn inr_field(order: &Order, key: &str) -> f64 {
    order.extra.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> ApiResult<ApiResponse<Vec<Order>>> {
    let status = filter_value(&query.status).map(|s| s.parse::<OrderStatus>().unwrap_or(OrderStatus::Unknown));
    let sales_person = filter_value(&query.sales_person);
    let event = filter_value(&query.event);

    let mut orders: Vec<Order> = state
        .db
        .orders()
        .list()
        .await?
        .into_iter()
        .filter(|o| status.map_or(true, |s| o.status == s))
        .filter(|o| {
            sales_person.map_or(true, |p| {
                o.sales_person().is_some_and(|sp| sp.eq_ignore_ascii_case(p))
            })
        })
        .filter(|o| event.map_or(true, |e| o.event_name.as_deref() == Some(e)))
        .collect();
    orders.sort_by(|a, b| b.created_date.cmp(&a.created_date));

    let count = orders.len();
    Ok(ApiResponse::success(orders).with("count", count))
}

pub async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<ApiResponse<Order>> {
    Ok(ApiResponse::success(state.db.orders().get_required(&id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Auth(user): Auth,
    Json(mut order): Json<Order>,
) -> ApiResult<ApiResponse<Order>> {
    let now = Utc::now();
    order.id = String::new();
    order.created_by = Some(user.display_name().to_string());
    order.created_date = Some(now);
    order.updated_date = Some(now);
    order.status = OrderStatus::PendingApproval;
    if order.sales_person().is_none() {
        order.sales_person = Some(user.email.clone());
    }
    if order.payment_currency.as_deref().map_or(true, |c| c.trim().is_empty()) {
        order.payment_currency = Some("INR".to_string());
    }
    if order.order_number.is_none() {
        order.order_number = Some(format!("ORD-{}", now.timestamp_millis()));
    }
    if let Some(event) = order.event_name.clone() {
        if let Some(item) = state.db.inventory().find_by_event(&event).await?.first() {
            order.extra.insert("event_id".into(), json!(item.id));
            order.extra.insert("inventory_id".into(), json!(item.id));
        }
    }
    apply_inr_amounts(&mut order);

    let order = state.db.orders().insert(order).await?;

    if is_post_service(&order) {
        let outstanding = inr_field(&order, "final_amount_inr") - inr_field(&order, "advance_amount_inr");
        if outstanding > 0.0 {
            let mut extra = serde_json::Map::new();
            extra.insert("order_number".into(), json!(order.order_number));
            extra.insert("client_name".into(), json!(order.client_name));
            extra.insert("payment_currency".into(), json!("INR"));
            extra.insert("created_date".into(), json!(to_iso_millis(&now)));
            let receivable = LedgerEntry {
                amount: Some(outstanding),
                status: Some("pending".to_string()),
                order_id: Some(order.id.clone()),
                extra,
                ..Default::default()
            };
            if let Err(e) = state.db.receivables().insert(receivable).await {
                warn!(order = %order.id, error = %e, "Could not create receivable");
            }
        }
    }

    info!(order = %order.id, number = ?order.order_number, by = %user.email, "Order created");
    Ok(ApiResponse::created(order))
}

pub async fn update(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> ApiResult<ApiResponse<Order>> {
    let mut patch = sanitize_patch(patch)?;
    if let Some(fields) = patch.as_object_mut() {
        fields.insert("updated_date".into(), json!(Utc::now()));
        fields.insert("updated_by".into(), json!(user.email));
    }
    let mut order = state.db.orders().update(&id, &patch).await?;
    apply_inr_amounts(&mut order);
    state.db.orders().save(&order).await?;
    Ok(ApiResponse::success(order))
}

pub async fn update_sales_person(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    Json(request): Json<SalesPersonRequest>,
) -> ApiResult<ApiResponse<Value>> {
    if !(user.role.can_manage_finance() || user.role.can_manage_leads()) {
        return Err(ApiError::forbidden("Only admins and managers can update the sales person"));
    }
    let sales_person = request.sales_person.trim();
    if sales_person.is_empty() {
        return Err(ApiError::bad_request("Sales person email is required"));
    }

    let mut order = state.db.orders().get_required(&id).await?;
    let previous = order.sales_person.replace(sales_person.to_string());
    let now = Utc::now();
    order.updated_date = Some(now);
    order.extra.insert("updated_by".into(), json!(user.email));
    state.db.orders().save(&order).await?;
    state.caches.invalidate_sales().await;

    Ok(ApiResponse::success(json!({
        "id": order.id,
        "sales_person": sales_person,
        "previous_sales_person": previous,
        "updated_by": user.email,
        "updated_date": to_iso_millis(&now),
    })))
}

pub async fn remove(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    user.require_finance()?;
    state.db.orders().delete(&id).await?;
    info!(order = %id, by = %user.email, "Order deleted");
    Ok(ApiResponse::message("Order deleted successfully"))
}

async fn decide(
    state: &AppState,
    id: &str,
    approver: &str,
    notes: Option<String>,
    status: OrderStatus,
) -> ApiResult<Order> {
    let mut order = state.db.orders().get_required(id).await?;
    if order.status != OrderStatus::PendingApproval {
        return Err(CoreError::InvalidState {
            entity: "order".into(),
            id: id.to_string(),
            status: order.status.to_string(),
        }
        .into());
    }
    let now = Utc::now();
    order.status = status;
    order.approved_by = Some(approver.to_string());
    order.approval_date = Some(now);
    order.approval_notes = notes;
    order.updated_date = Some(now);
    state.db.orders().save(&order).await?;
    info!(order = %id, status = %status, by = approver, "Order reviewed");
    Ok(order)
}

pub async fn approve(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    request: Option<Json<ApprovalRequest>>,
) -> ApiResult<ApiResponse<Order>> {
    user.require_finance()?;
    let notes = request.and_then(|Json(r)| r.notes);
    let order = decide(&state, &id, &user.email, notes, OrderStatus::Approved).await?;
    Ok(ApiResponse::success(order).with_message("Order approved"))
}

pub async fn reject(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    request: Option<Json<ApprovalRequest>>,
) -> ApiResult<ApiResponse<Order>> {
    user.require_finance()?;
    let notes = request.and_then(|Json(r)| r.notes);
    let order = decide(&state, &id, &user.email, notes, OrderStatus::Rejected).await?;
    Ok(ApiResponse::success(order).with_message("Order rejected"))
}

pub async fn export(State(state): State<AppState>, Auth(user): Auth) -> ApiResult<CsvFile> {
    user.require_finance()?;
    let mut orders = state.db.orders().list().await?;
    orders.sort_by(|a, b| b.created_date.cmp(&a.created_date));

    let amount = |v: Option<f64>| v.map(|a| format!("{:.2}", a)).unwrap_or_default();
    let records = orders.iter().map(|o| {
        vec![
            o.order_number.clone().unwrap_or_default(),
            o.client_name.clone().unwrap_or_default(),
            o.event_name.clone().unwrap_or_default(),
            o.event_date.as_ref().map(ist_date_string).unwrap_or_default(),
            o.status.to_string(),
            o.payment_currency.clone().unwrap_or_default(),
            o.exchange_rate().to_string(),
            amount(o.final_amount),
            format!("{:.2}", o.sales_amount().rupees()),
            o.sales_person().unwrap_or_default().to_string(),
            o.created_date.as_ref().map(to_iso_millis).unwrap_or_default(),
        ]
    });
    let body = write_csv(&EXPORT_HEADERS, records)?;
    let filename = format!("orders_{}.csv", ist_date_string(&Utc::now()));
    Ok(CsvFile::new(filename, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inr_amounts_use_exchange_rate() {
        let mut order = Order {
            payment_currency: Some("USD".into()),
            exchange_rate: Some(83.0),
            final_amount: Some(100.0),
            advance_amount: Some(40.0),
            ..Default::default()
        };
        apply_inr_amounts(&mut order);
        assert_eq!(inr_field(&order, "final_amount_inr"), 8_300.0);
        assert_eq!(inr_field(&order, "advance_amount_inr"), 3_320.0);
    }

    #[test]
    fn test_inr_order_ignores_rate() {
        let mut order = Order {
            payment_currency: Some("INR".into()),
            exchange_rate: Some(83.0),
            total_amount: Some(5_000.0),
            ..Default::default()
        };
        apply_inr_amounts(&mut order);
        assert_eq!(inr_field(&order, "inr_equivalent"), 5_000.0);
    }
}
