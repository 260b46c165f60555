//! Collection names.
//!
//! Names match the ones used by the existing CRM data so exported documents
//! can be loaded as they are.

pub const USERS: &str = "crm_users";
pub const LEADS: &str = "crm_leads";
pub const INVENTORY: &str = "crm_inventory";
pub const EVENTS: &str = "crm_events";
pub const ORDERS: &str = "crm_orders";
pub const INVOICES: &str = "crm_invoices";
pub const ALLOCATIONS: &str = "crm_allocations";
pub const RECEIVABLES: &str = "crm_receivables";
pub const PAYABLES: &str = "crm_payables";
pub const REMINDERS: &str = "crm_reminders";
pub const PAYMENTS: &str = "crm_payments";
pub const ACTIVITY_LOGS: &str = "crm_activity_logs";
pub const BULK_UPLOADS: &str = "crm_bulk_uploads";
pub const JOURNEYS: &str = "journeys";

pub const PERFORMANCE_STATS: &str = "crm_performance_stats";
pub const PERFORMANCE_STATS_HISTORY: &str = "crm_performance_stats_history";

pub const SALES_MEMBERS: &str = "sales_performance_members";
pub const RETAIL_MEMBERS: &str = "retail_tracker_members";
pub const SALES_TARGETS: &str = "sales_targets";
