//! # SalesDesk API
//!
//! REST back office for the SalesDesk CRM: leads, orders, inventory
//! allocations, reminders, bulk CSV uploads and performance reporting.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SalesDesk API                                  │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  routes        │  │  services      │  │  state                     ││
//! │  │                │  │                │  │                            ││
//! │  │ • leads/orders │  │ • aggregation  │  │ • Database (salesdesk-db)  ││
//! │  │ • inventory    │─►│ • bulk uploads │  │ • JwtManager               ││
//! │  │ • reminders    │  │ • ad insights  │  │ • TTL caches               ││
//! │  │ • performance  │  │ • csv io       │  │ • AggregationService       ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │          ▲                                                              │
//! │          │ bearer JWT (auth_middleware), except /health, /api/cron/*   │
//! │          │ and /api/journeys/public/{token}                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::build_router;
pub use state::AppState;
