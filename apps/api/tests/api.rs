//! Router-level tests against an in-memory database.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use salesdesk_api::{build_router, ApiConfig, AppState};
use salesdesk_core::{Role, User};
use salesdesk_db::{Database, DbConfig};

struct TestApp {
    router: Router,
    state: AppState,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_config(ApiConfig::default()).await
    }

    async fn with_config(config: ApiConfig) -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let state = AppState::new(db, config).unwrap();
        TestApp {
            router: build_router(state.clone()),
            state,
        }
    }

    async fn token_for(&self, email: &str, role: Role) -> String {
        self.login(email, role).await.1
    }

    async fn login(&self, email: &str, role: Role) -> (User, String) {
        let user = self
            .state
            .db
            .users()
            .insert(User {
                name: email.split('@').next().unwrap_or_default().to_string(),
                email: email.to_string(),
                role,
                ..Default::default()
            })
            .await
            .unwrap();
        let token = self.state.jwt.generate_token(&user).unwrap();
        (user, token)
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    async fn call(&self, method: Method, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token));
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, json) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["status"], "ok");
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = TestApp::new().await;
    let request = Request::builder().uri("/api/leads").body(Body::empty()).unwrap();
    let (status, json) = app.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "UNAUTHORIZED");

    let (status, _) = app.call(Method::GET, "/api/leads", "not-a-jwt", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_performance_stats_missing_snapshot() {
    let app = TestApp::new().await;
    let token = app.token_for("admin@example.com", Role::SuperAdmin).await;

    let (status, json) = app
        .call(Method::GET, "/api/performance-stats/sales-performance", &token, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_cron_token_and_snapshot_views() {
    let mut config = ApiConfig::default();
    config.cron.token = Some("scheduler-secret".into());
    let app = TestApp::with_config(config).await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/cron/update-stats")
        .header("x-cloudscheduler-token", "wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = Request::builder().uri("/api/cron/health").body(Body::empty()).unwrap();
    let (status, json) = app.send(request).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["message"], "Stats are stale");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/cron/update-stats")
        .header("x-cloudscheduler-token", "scheduler-secret")
        .body(Body::empty())
        .unwrap();
    let (status, json) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let request = Request::builder().uri("/api/cron/health").body(Body::empty()).unwrap();
    let (status, json) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["isRunning"], false);

    let token = app.token_for("finance@example.com", Role::FinanceManager).await;
    let (status, json) = app
        .call(Method::GET, "/api/performance-stats/financials", &token, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["nextUpdateIn"].is_string());
    assert!(json["data"]["lifetime"].is_object());
}

#[tokio::test]
async fn test_manual_aggregation_is_super_admin_only() {
    let app = TestApp::new().await;
    let token = app.token_for("head@example.com", Role::SalesHead).await;
    let (status, _) = app
        .call(Method::POST, "/api/performance-stats/aggregate", &token, None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_duplicate_event_name_conflicts() {
    let app = TestApp::new().await;
    let token = app.token_for("ops@example.com", Role::Admin).await;

    let body = json!({ "event_name": "Wimbledon Final", "venue": "London" });
    let (status, _) = app.call(Method::POST, "/api/events", &token, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);

    let body = json!({ "event_name": "  wimbledon final " });
    let (status, json) = app.call(Method::POST, "/api/events", &token, Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
}

#[tokio::test]
async fn test_second_lead_links_to_existing_client() {
    let app = TestApp::new().await;
    let token = app.token_for("manager@example.com", Role::SalesManager).await;

    let first = json!({
        "name": "Asha Rao",
        "phone": "9876543210",
        "assigned_to": "ravi@example.com",
        "lead_for_event": "IPL Final",
    });
    let (status, json) = app.call(Method::POST, "/api/leads", &token, Some(first)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["is_primary_lead"], true);

    let (status, json) = app
        .call(Method::GET, "/api/leads/check-phone/9876543210", &token, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["exists"], true);

    let second = json!({ "name": "Asha Rao", "phone": "9876543210", "lead_for_event": "Wimbledon" });
    let (status, json) = app.call(Method::POST, "/api/leads", &token, Some(second)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["assigned_to"], "ravi@example.com");
    assert_eq!(json["data"]["client_total_leads"], 2);
    assert_eq!(json["client_suggestion"]["total_leads"], 2);

    let reminders = app.state.db.reminders().list().await.unwrap();
    assert_eq!(reminders.len(), 2);
}

#[tokio::test]
async fn test_allocation_takes_and_returns_stock() {
    let app = TestApp::new().await;
    let token = app.token_for("supply@example.com", Role::SupplyManager).await;

    let (_, json) = app
        .call(
            Method::POST,
            "/api/inventory",
            &token,
            Some(json!({ "event_name": "IPL Final", "total_tickets": 10, "buying_price": 1000 })),
        )
        .await;
    let inventory_id = json["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(json["data"]["available_tickets"], 10);

    let lead = app
        .state
        .db
        .leads()
        .insert(salesdesk_core::Lead {
            name: Some("Kabir".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let uri = format!("/api/inventory/{}/allocate", inventory_id);
    let (status, json) = app
        .call(Method::POST, &uri, &token, Some(json!({ "lead_id": lead.id, "tickets_allocated": 4 })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["total_buying_price"], 4000.0);
    let allocation_id = json["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .call(Method::POST, &uri, &token, Some(json!({ "lead_id": lead.id, "tickets_allocated": 7 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let item = app.state.db.inventory().get_required(&inventory_id).await.unwrap();
    assert_eq!(item.available_tickets, 6);

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/allocations/{}", allocation_id), &token, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let item = app.state.db.inventory().get_required(&inventory_id).await.unwrap();
    assert_eq!(item.available_tickets, 10);
}

#[tokio::test]
async fn test_bulk_order_validate_reports_unknown_lead() {
    let app = TestApp::new().await;
    let token = app.token_for("finance@example.com", Role::FinanceManager).await;

    let csv = "lead_id,client_name,event_name,rate,quantity\nmissing-lead,Rahul,IPL Final,5000,2\n";
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/bulk-orders/validate")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "text/csv")
        .body(Body::from(csv))
        .unwrap();
    let (status, json) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    let row = &json["data"][0];
    assert_eq!(row["row"], 2);
    assert_eq!(row["status"], "invalid");
    assert!(row["errors"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e == "Lead not found"));
}

#[tokio::test]
async fn test_public_journey_view() {
    let app = TestApp::new().await;
    let token = app.token_for("ops@example.com", Role::Admin).await;
    let order = app
        .state
        .db
        .orders()
        .insert(salesdesk_core::Order {
            client_name: Some("Asha".into()),
            event_name: Some("IPL Final".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let (status, json) = app
        .call(Method::POST, "/api/journeys", &token, Some(json!({ "order_id": order.id })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let access_token = json["data"]["access_token"].as_str().unwrap().to_string();
    let journey_id = json["data"]["id"].as_str().unwrap().to_string();

    let uri = format!("/api/journeys/{}/milestone/booking_confirmed", journey_id);
    let (status, _) = app
        .call(Method::PUT, &uri, &token, Some(json!({ "status": "completed" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder()
        .uri(format!("/api/journeys/public/{}", access_token))
        .body(Body::empty())
        .unwrap();
    let (status, json) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["progressPercent"], 14);

    let request = Request::builder()
        .uri("/api/journeys/public/unknown")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sales_team_served_from_cache_until_cleared() {
    let app = TestApp::new().await;
    let token = app.token_for("root@example.com", Role::SuperAdmin).await;
    app.login("ravi@example.com", Role::SalesPerson).await;

    let (status, first) = app.call(Method::GET, "/api/sales-performance", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["cached"], false);

    let (status, second) = app.call(Method::GET, "/api/sales-performance", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["cached"], true);
    assert!(second["cacheAge"].is_string());
    assert_eq!(first["data"], second["data"]);

    let (status, _) = app
        .call(Method::POST, "/api/sales-performance/clear-cache", &token, None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, third) = app.call(Method::GET, "/api/sales-performance", &token, None).await;
    assert_eq!(third["cached"], false);
    assert_eq!(first["data"], third["data"]);
}

#[tokio::test]
async fn test_target_and_member_changes_drop_sales_cache() {
    let app = TestApp::new().await;
    let token = app.token_for("root@example.com", Role::SuperAdmin).await;
    let (seller, _) = app.login("ravi@example.com", Role::SalesPerson).await;
    let (analyst, _) = app.login("meera@example.com", Role::Viewer).await;

    app.call(Method::GET, "/api/sales-performance", &token, None).await;
    let (_, json) = app.call(Method::GET, "/api/sales-performance", &token, None).await;
    assert_eq!(json["cached"], true);

    let uri = format!("/api/sales-performance/target/{}", seller.id);
    let (status, _) = app
        .call(Method::PUT, &uri, &token, Some(json!({ "target": 2.5 })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = app.call(Method::GET, "/api/sales-performance", &token, None).await;
    assert_eq!(json["cached"], false);
    let row = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["email"] == "ravi@example.com")
        .unwrap();
    assert_eq!(row["target"], 2.5);

    let (_, json) = app.call(Method::GET, "/api/sales-performance", &token, None).await;
    assert_eq!(json["cached"], true);
    assert!(!json["data"].as_array().unwrap().iter().any(|r| r["email"] == "meera@example.com"));

    let (status, _) = app
        .call(
            Method::POST,
            "/api/sales-performance/add-member",
            &token,
            Some(json!({ "userId": analyst.id, "type": "sales" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = app.call(Method::GET, "/api/sales-performance", &token, None).await;
    assert_eq!(json["cached"], false);
    assert!(json["data"].as_array().unwrap().iter().any(|r| r["email"] == "meera@example.com"));
}

#[tokio::test]
async fn test_retail_tracker_cache_is_keyed_by_date_range() {
    let app = TestApp::new().await;
    let token = app.token_for("root@example.com", Role::SuperAdmin).await;
    let (member, _) = app.login("neha@example.com", Role::Viewer).await;

    let july = "/api/sales-performance/retail-tracker?start_date=2025-07-01&end_date=2025-07-31";
    let (status, json) = app.call(Method::GET, july, &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cached"], false);

    let (_, json) = app.call(Method::GET, july, &token, None).await;
    assert_eq!(json["cached"], true);

    let august = "/api/sales-performance/retail-tracker?start_date=2025-08-01&end_date=2025-08-31";
    let (_, json) = app.call(Method::GET, august, &token, None).await;
    assert_eq!(json["cached"], false);

    let (_, json) = app
        .call(Method::GET, "/api/sales-performance/retail-tracker", &token, None)
        .await;
    assert_eq!(json["cached"], false);
    let (_, json) = app
        .call(Method::GET, "/api/sales-performance/retail-tracker", &token, None)
        .await;
    assert_eq!(json["cached"], true);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/sales-performance/add-member",
            &token,
            Some(json!({ "userId": member.id, "type": "retail" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = app.call(Method::GET, july, &token, None).await;
    assert_eq!(json["cached"], false);
}
