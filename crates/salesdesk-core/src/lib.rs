//! # salesdesk-core: Pure Business Logic for SalesDesk
//!
//! All CRM business rules live here as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SalesDesk Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 apps/api (axum REST server)                     │   │
//! │  │   leads · orders · allocations · bulk uploads · reporting       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            ★ salesdesk-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────┐  │   │
//! │  │   │  types  │ │  money  │ │  dates  │ │  stats   │ │  bulk  │  │   │
//! │  │   │  Lead   │ │  Money  │ │  IST    │ │ periods  │ │  CSV   │  │   │
//! │  │   │  Order  │ │  paise  │ │ bounds  │ │ rollups  │ │  rows  │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └──────────┘ └────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                salesdesk-db (Document store)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`status`] - Closed enumerations (lead status, roles, order status, ...)
//! - [`types`] - Document records (Lead, Order, Allocation, Inventory, ...)
//! - [`money`] - Money type in paise (integer arithmetic)
//! - [`dates`] - IST date boundaries and timestamp normalization
//! - [`period`] - Reporting periods (lifetime, fiscal year, months)
//! - [`stats`] - Financial / sales / retail / marketing rollups
//! - [`marketing`] - Marketing funnel report
//! - [`tax`] - GST and TCS calculation for orders
//! - [`reminder`] - Follow-up reminder lifecycle
//! - [`bulk`] - CSV bulk upload row validation
//! - [`validation`] - Input validation helpers
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use salesdesk_core::dates::{format_date_for_query, Bound};
//!
//! // IST midnight expressed in UTC
//! let start = format_date_for_query("2025-07-21", Bound::Start).unwrap();
//! assert_eq!(start, "2025-07-20T18:30:00.000Z");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod bulk;
pub mod dates;
pub mod error;
pub mod marketing;
pub mod money;
pub mod period;
pub mod reminder;
pub mod stats;
pub mod status;
pub mod tax;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use period::Period;
pub use status::*;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of write operations committed in one batch.
///
/// Bulk uploads and allocation processing split their writes into chunks of
/// this size and commit them one after another.
pub const BATCH_WRITE_LIMIT: usize = 500;

/// One crore in rupees. Sales targets and the sales-performance views are
/// expressed in crores.
pub const CRORE: f64 = 10_000_000.0;

/// How often the stats snapshot is expected to be rebuilt (minutes).
pub const STATS_REFRESH_INTERVAL_MINS: i64 = 120;

/// A snapshot older than this is reported as stale by the cron health check
/// (minutes).
pub const STATS_STALE_AFTER_MINS: i64 = 180;

/// Lifetime of the live sales-performance and retail-tracker caches (seconds).
pub const SALES_CACHE_TTL_SECS: u64 = 6 * 60 * 60;

/// Maximum number of date-range entries kept in the retail tracker cache.
pub const RETAIL_CACHE_MAX_ENTRIES: usize = 10;

/// Lifetime of cached ad-insights responses (seconds).
pub const AD_INSIGHTS_CACHE_TTL_SECS: u64 = 30 * 60;

/// Default GST rate (percent) applied by bulk order uploads.
pub const DEFAULT_GST_RATE: f64 = 18.0;

/// Default TCS rate (percent) for outbound tour packages.
pub const DEFAULT_TCS_RATE: f64 = 5.0;
