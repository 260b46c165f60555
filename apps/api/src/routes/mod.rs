//! # API Routes
//!
//! ```text
//! /health                              public
//! /api/cron/*                          public (shared-secret header)
//! /api/journeys/public/{token}         public
//! /api/**                              bearer JWT (auth_middleware)
//! ```

use axum::{
    extract::State,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::auth_middleware;
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::state::AppState;

pub mod allocations;
pub mod bulk;
pub mod cron;
pub mod events;
pub mod inventory;
pub mod journeys;
pub mod leads;
pub mod marketing;
pub mod orders;
pub mod performance;
pub mod reminders;
pub mod sales;
pub mod users;

/// Builds the full router with all layers applied.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/cron/update-stats", post(cron::update_stats))
        .route("/cron/health", get(cron::health))
        .route("/journeys/public/{token}", get(journeys::public_view));

    let protected_routes = Router::new()
        // Leads
        .route("/leads", get(leads::list).post(leads::create).delete(leads::bulk_delete))
        .route("/leads/check-phone/{phone}", get(leads::check_phone))
        .route("/leads/{id}", get(leads::get_one).put(leads::update).delete(leads::remove))
        .route("/leads/{id}/assign", put(leads::assign))
        .route("/leads/{id}/status", put(leads::change_status))
        // Orders
        .route("/orders", get(orders::list).post(orders::create))
        .route("/orders/export", get(orders::export))
        .route("/orders/{id}", get(orders::get_one).put(orders::update).delete(orders::remove))
        .route("/orders/{id}/sales-person", put(orders::update_sales_person))
        .route("/orders/{id}/approve", post(orders::approve))
        .route("/orders/{id}/reject", post(orders::reject))
        // Allocations
        .route("/allocations", get(allocations::list).post(allocations::create))
        .route("/allocations/export", get(allocations::export))
        .route("/allocations/{id}", delete(allocations::unallocate))
        // Inventory
        .route("/inventory", get(inventory::list).post(inventory::create))
        .route(
            "/inventory/{id}",
            get(inventory::get_one).put(inventory::update).delete(inventory::remove),
        )
        .route("/inventory/{id}/allocate", post(inventory::allocate))
        // Reminders
        .route("/reminders", get(reminders::list).post(reminders::create))
        .route("/reminders/stats/summary", get(reminders::stats))
        .route("/reminders/refresh-overdue", post(reminders::refresh_overdue))
        .route("/reminders/lead/{lead_id}", get(reminders::for_lead))
        .route(
            "/reminders/{id}",
            get(reminders::get_one).put(reminders::update).delete(reminders::remove),
        )
        .route("/reminders/{id}/complete", post(reminders::complete))
        .route("/reminders/{id}/snooze", post(reminders::snooze))
        .route("/reminders/{id}/escalate", post(reminders::escalate))
        // Events
        .route("/events", get(events::list).post(events::create))
        .route("/events/export", get(events::export))
        .route("/events/{id}", get(events::get_one).put(events::update).delete(events::remove))
        // Journeys
        .route("/journeys", post(journeys::create))
        .route("/journeys/{id}/milestone/{key}", put(journeys::update_milestone))
        // Users
        .route("/users", get(users::list).post(users::create))
        .route("/users/{id}", put(users::update).delete(users::remove))
        // Stored stats snapshot
        .route("/performance-stats/financials", get(performance::financials))
        .route("/performance-stats/sales-performance", get(performance::sales_performance))
        .route("/performance-stats/retail-tracker", get(performance::retail_tracker))
        .route("/performance-stats/marketing-performance", get(performance::marketing_performance))
        .route("/performance-stats/metadata", get(performance::metadata))
        .route("/performance-stats/aggregate", post(performance::aggregate))
        // Live sales views
        .route("/sales-performance", get(sales::team))
        .route("/sales-performance/retail-tracker", get(sales::retail_tracker))
        .route("/sales-performance/target/{user_id}", put(sales::set_target))
        .route("/sales-performance/add-member", post(sales::add_member))
        .route("/sales-performance/remove-member/{user_id}/{member_type}", delete(sales::remove_member))
        .route("/sales-performance/clear-cache", post(sales::clear_cache))
        .route("/sales-performance/cache-status", get(sales::cache_status))
        // Marketing
        .route("/marketing/performance", get(marketing::performance))
        .route("/marketing/impressions-by-source", get(marketing::impressions_by_source))
        .route("/marketing/ad-insights", get(marketing::ad_insights))
        // Bulk uploads
        .route("/bulk-orders/template", get(bulk::order_template))
        .route("/bulk-orders/validate", post(bulk::validate_orders))
        .route("/bulk-orders/upload", post(bulk::upload_orders))
        .route("/bulk-orders/history", get(bulk::order_history))
        .route("/bulk-payments/template", get(bulk::payment_template))
        .route("/bulk-payments/validate", post(bulk::validate_payments))
        .route("/bulk-payments/upload", post(bulk::upload_payments))
        .route("/bulk-payments/history", get(bulk::payment_history))
        .route("/bulk-allocations/template", get(bulk::allocation_template))
        .route("/bulk-allocations/preview", post(bulk::preview_allocations))
        .route("/bulk-allocations/process", post(bulk::process_allocations))
        .route("/bulk-allocations/history", get(bulk::allocation_history))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .nest("/api", public_routes.merge(protected_routes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> ApiResult<ApiResponse<Value>> {
    if !state.db.health_check().await {
        return Err(ApiError::ServiceUnavailable("Database unavailable".into()));
    }
    Ok(ApiResponse::success(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Checks a JSON patch body and drops fields clients may not overwrite.
pub(crate) fn sanitize_patch(mut patch: Value) -> ApiResult<Value> {
    let Some(fields) = patch.as_object_mut() else {
        return Err(ApiError::bad_request("Request body must be a JSON object"));
    };
    fields.remove("id");
    fields.remove("created_date");
    fields.remove("created_by");
    Ok(patch)
}

/// Query value with `"all"` and blanks treated as absent.
pub(crate) fn filter_value(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

/// Case-insensitive substring match over optional fields.
pub(crate) fn contains_text(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(needle))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_patch_drops_identity_fields() {
        let patch = sanitize_patch(json!({ "id": "x", "status": "hot", "created_by": "a" })).unwrap();
        assert_eq!(patch, json!({ "status": "hot" }));
        assert!(sanitize_patch(json!([1, 2])).is_err());
    }

    #[test]
    fn test_filter_value_ignores_all() {
        assert_eq!(filter_value(&Some("All".into())), None);
        assert_eq!(filter_value(&Some(" hot ".into())), Some("hot"));
        assert_eq!(filter_value(&None), None);
    }
}
