//! # Closed Enumerations
//!
//! Every status, role and category that drives a business decision is a
//! closed enum here. Decision points use exhaustive `match` so that adding a
//! variant forces every classification to be revisited.
//!
//! ## Lead Status Classification
//! ```text
//! ┌──────────────────────┬────────┬───────────┬────────────┬──────────────┐
//! │ status               │ touch  │ qualified │ converted  │ pipeline     │
//! ├──────────────────────┼────────┼───────────┼────────────┼──────────────┤
//! │ unassigned/assigned  │        │           │            │              │
//! │ contacted, attempt_N │   ✓    │           │            │              │
//! │ qualified            │   ✓    │     ✓     │            │              │
//! │ hot / warm / cold    │   ✓    │     ✓     │            │      ✓       │
//! │ quote_* (+temp)      │   ✓    │     ✓     │            │ ✓ if h/w/c   │
//! │ pickup_later         │   ✓    │     ✓     │            │              │
//! │ converted, invoiced  │   ✓    │     ✓     │     ✓      │              │
//! │ payment_*            │   ✓    │     ✓     │     ✓      │              │
//! │ dropped              │   ✓    │     ✓     │            │              │
//! │ junk, unqualified... │   ✓    │           │            │              │
//! └──────────────────────┴────────┴───────────┴────────────┴──────────────┘
//! ```
//!
//! Stored documents are not always consistent about casing, so every enum
//! parses case-insensitively through `FromStr`; record fields use the
//! lenient deserializers in [`crate::types`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::CoreError;

// =============================================================================
// Lead Status
// =============================================================================

/// Status of a lead in the sales funnel.
///
/// Unrecognized stored values parse to [`LeadStatus::Unknown`] so that
/// classification stays total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    Unassigned,
    Assigned,
    Contacted,
    #[serde(rename = "attempt_1")]
    Attempt1,
    #[serde(rename = "attempt_2")]
    Attempt2,
    #[serde(rename = "attempt_3")]
    Attempt3,
    Qualified,
    Unqualified,
    Junk,
    Hot,
    Warm,
    Cold,
    Interested,
    NotInterested,
    OnHold,
    Dropped,
    PickupLater,
    QuoteRequested,
    QuoteReceived,
    Converted,
    Invoiced,
    PaymentReceived,
    PaymentPostService,
    Unknown,
}

impl LeadStatus {
    /// Returns the stored string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Unassigned => "unassigned",
            LeadStatus::Assigned => "assigned",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Attempt1 => "attempt_1",
            LeadStatus::Attempt2 => "attempt_2",
            LeadStatus::Attempt3 => "attempt_3",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Unqualified => "unqualified",
            LeadStatus::Junk => "junk",
            LeadStatus::Hot => "hot",
            LeadStatus::Warm => "warm",
            LeadStatus::Cold => "cold",
            LeadStatus::Interested => "interested",
            LeadStatus::NotInterested => "not_interested",
            LeadStatus::OnHold => "on_hold",
            LeadStatus::Dropped => "dropped",
            LeadStatus::PickupLater => "pickup_later",
            LeadStatus::QuoteRequested => "quote_requested",
            LeadStatus::QuoteReceived => "quote_received",
            LeadStatus::Converted => "converted",
            LeadStatus::Invoiced => "invoiced",
            LeadStatus::PaymentReceived => "payment_received",
            LeadStatus::PaymentPostService => "payment_post_service",
            LeadStatus::Unknown => "unknown",
        }
    }

    /// A sales rep has made contact with the lead.
    pub const fn is_touch_based(&self) -> bool {
        match self {
            LeadStatus::Unassigned | LeadStatus::Assigned | LeadStatus::Unknown => false,
            LeadStatus::Contacted
            | LeadStatus::Attempt1
            | LeadStatus::Attempt2
            | LeadStatus::Attempt3
            | LeadStatus::Qualified
            | LeadStatus::Unqualified
            | LeadStatus::Junk
            | LeadStatus::Hot
            | LeadStatus::Warm
            | LeadStatus::Cold
            | LeadStatus::Interested
            | LeadStatus::NotInterested
            | LeadStatus::OnHold
            | LeadStatus::Dropped
            | LeadStatus::PickupLater
            | LeadStatus::QuoteRequested
            | LeadStatus::QuoteReceived
            | LeadStatus::Converted
            | LeadStatus::Invoiced
            | LeadStatus::PaymentReceived
            | LeadStatus::PaymentPostService => true,
        }
    }

    /// Touch-based as counted by the marketing funnel report, which leaves
    /// out the pickup and quote stages.
    pub const fn is_marketing_touch_based(&self) -> bool {
        match self {
            LeadStatus::PickupLater | LeadStatus::QuoteRequested | LeadStatus::QuoteReceived => {
                false
            }
            other => other.is_touch_based(),
        }
    }

    /// Qualified as counted by the retail tracker.
    pub const fn is_qualified(&self) -> bool {
        match self {
            LeadStatus::Qualified
            | LeadStatus::Hot
            | LeadStatus::Warm
            | LeadStatus::Cold
            | LeadStatus::PickupLater
            | LeadStatus::QuoteRequested
            | LeadStatus::QuoteReceived
            | LeadStatus::Converted
            | LeadStatus::Invoiced
            | LeadStatus::PaymentReceived
            | LeadStatus::PaymentPostService
            | LeadStatus::Dropped => true,
            LeadStatus::Unassigned
            | LeadStatus::Assigned
            | LeadStatus::Contacted
            | LeadStatus::Attempt1
            | LeadStatus::Attempt2
            | LeadStatus::Attempt3
            | LeadStatus::Unqualified
            | LeadStatus::Junk
            | LeadStatus::Interested
            | LeadStatus::NotInterested
            | LeadStatus::OnHold
            | LeadStatus::Unknown => false,
        }
    }

    /// The lead has turned into business (order placed or later).
    pub const fn is_converted(&self) -> bool {
        matches!(
            self,
            LeadStatus::Converted
                | LeadStatus::Invoiced
                | LeadStatus::PaymentReceived
                | LeadStatus::PaymentPostService
        )
    }

    /// Qualified as counted by the source/campaign breakdown of the stats
    /// snapshot (temperature statuses only).
    pub const fn is_source_qualified(&self) -> bool {
        matches!(
            self,
            LeadStatus::Qualified | LeadStatus::Hot | LeadStatus::Warm | LeadStatus::Cold
        )
    }

    /// Converted as counted by the source/campaign breakdown of the stats
    /// snapshot (post-service payments excluded).
    pub const fn is_source_converted(&self) -> bool {
        matches!(
            self,
            LeadStatus::Converted | LeadStatus::Invoiced | LeadStatus::PaymentReceived
        )
    }

    /// Quote stage, where the pipeline relies on the lead's temperature.
    pub const fn is_quote_stage(&self) -> bool {
        matches!(self, LeadStatus::QuoteRequested | LeadStatus::QuoteReceived)
    }

    /// Returns the temperature implied by the status itself, if any.
    pub const fn temperature(&self) -> Option<Temperature> {
        match self {
            LeadStatus::Hot => Some(Temperature::Hot),
            LeadStatus::Warm => Some(Temperature::Warm),
            LeadStatus::Cold => Some(Temperature::Cold),
            _ => None,
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        Ok(match normalized.as_str() {
            "" | "unassigned" | "new" => LeadStatus::Unassigned,
            "assigned" => LeadStatus::Assigned,
            "contacted" => LeadStatus::Contacted,
            "attempt_1" | "attempt1" => LeadStatus::Attempt1,
            "attempt_2" | "attempt2" => LeadStatus::Attempt2,
            "attempt_3" | "attempt3" => LeadStatus::Attempt3,
            "qualified" => LeadStatus::Qualified,
            "unqualified" => LeadStatus::Unqualified,
            "junk" => LeadStatus::Junk,
            "hot" => LeadStatus::Hot,
            "warm" => LeadStatus::Warm,
            "cold" => LeadStatus::Cold,
            "interested" => LeadStatus::Interested,
            "not_interested" => LeadStatus::NotInterested,
            "on_hold" => LeadStatus::OnHold,
            "dropped" => LeadStatus::Dropped,
            "pickup_later" => LeadStatus::PickupLater,
            "quote_requested" => LeadStatus::QuoteRequested,
            "quote_received" => LeadStatus::QuoteReceived,
            "converted" => LeadStatus::Converted,
            "invoiced" => LeadStatus::Invoiced,
            "payment_received" => LeadStatus::PaymentReceived,
            "payment_post_service" => LeadStatus::PaymentPostService,
            _ => LeadStatus::Unknown,
        })
    }
}

// =============================================================================
// Temperature
// =============================================================================

/// How likely a lead is to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Temperature {
    Hot,
    Warm,
    Cold,
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Temperature::Hot => write!(f, "hot"),
            Temperature::Warm => write!(f, "warm"),
            Temperature::Cold => write!(f, "cold"),
        }
    }
}

impl FromStr for Temperature {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hot" => Ok(Temperature::Hot),
            "warm" => Ok(Temperature::Warm),
            "cold" => Ok(Temperature::Cold),
            other => Err(CoreError::unknown("temperature", other)),
        }
    }
}

// =============================================================================
// Business Type
// =============================================================================

/// Whether a lead is a consumer (retail) or corporate enquiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum BusinessType {
    #[serde(rename = "B2B")]
    B2b,
    #[default]
    #[serde(rename = "B2C")]
    B2c,
}

impl fmt::Display for BusinessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusinessType::B2b => write!(f, "B2B"),
            BusinessType::B2c => write!(f, "B2C"),
        }
    }
}

impl FromStr for BusinessType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "b2b" | "corporate" => Ok(BusinessType::B2b),
            "b2c" | "retail" => Ok(BusinessType::B2c),
            other => Err(CoreError::unknown("business type", other)),
        }
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    PendingApproval,
    Approved,
    Rejected,
    Cancelled,
    Refunded,
    Completed,
    Delivered,
    Unknown,
}

impl OrderStatus {
    /// Returns the stored string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingApproval => "pending_approval",
            OrderStatus::Approved => "approved",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Completed => "completed",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Unknown => "unknown",
        }
    }

    /// Orders in a terminal state no longer count as active sales.
    pub const fn is_terminal(&self) -> bool {
        match self {
            OrderStatus::Rejected | OrderStatus::Cancelled | OrderStatus::Refunded => true,
            OrderStatus::PendingApproval
            | OrderStatus::Approved
            | OrderStatus::Completed
            | OrderStatus::Delivered
            | OrderStatus::Unknown => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().replace(' ', "_").as_str() {
            "" | "pending" | "pending_approval" => OrderStatus::PendingApproval,
            "approved" => OrderStatus::Approved,
            "rejected" => OrderStatus::Rejected,
            "cancelled" | "canceled" => OrderStatus::Cancelled,
            "refunded" => OrderStatus::Refunded,
            "completed" => OrderStatus::Completed,
            "delivered" => OrderStatus::Delivered,
            _ => OrderStatus::Unknown,
        })
    }
}

// =============================================================================
// Role
// =============================================================================

/// Role of a CRM user. Permission checks are role membership tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    SalesHead,
    SalesManager,
    SalesPerson,
    SupplyManager,
    FinanceManager,
    #[default]
    Viewer,
}

impl Role {
    pub const fn is_super_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }

    pub const fn is_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }

    /// Roles that appear on the sales-performance team automatically.
    pub const fn is_sales_role(&self) -> bool {
        match self {
            Role::SalesHead | Role::SalesManager | Role::SalesPerson => true,
            Role::SuperAdmin
            | Role::Admin
            | Role::SupplyManager
            | Role::FinanceManager
            | Role::Viewer => false,
        }
    }

    /// May approve orders and run finance uploads.
    pub const fn can_manage_finance(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin | Role::FinanceManager)
    }

    /// May create and move inventory allocations.
    pub const fn can_manage_inventory(&self) -> bool {
        matches!(
            self,
            Role::SuperAdmin | Role::Admin | Role::SupplyManager | Role::SalesHead
        )
    }

    /// May edit leads that are not assigned to them.
    pub const fn can_manage_leads(&self) -> bool {
        matches!(
            self,
            Role::SuperAdmin | Role::Admin | Role::SalesHead | Role::SalesManager
        )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::SalesHead => "sales_head",
            Role::SalesManager => "sales_manager",
            Role::SalesPerson => "sales_person",
            Role::SupplyManager => "supply_manager",
            Role::FinanceManager => "finance_manager",
            Role::Viewer => "viewer",
        };
        f.write_str(s)
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "super_admin" | "superadmin" => Ok(Role::SuperAdmin),
            "admin" => Ok(Role::Admin),
            "sales_head" => Ok(Role::SalesHead),
            "sales_manager" => Ok(Role::SalesManager),
            "sales_person" | "sales_executive" | "sales" => Ok(Role::SalesPerson),
            "supply_manager" | "supply_sales_service_manager" => Ok(Role::SupplyManager),
            "finance_manager" | "finance_executive" => Ok(Role::FinanceManager),
            "viewer" => Ok(Role::Viewer),
            other => Err(CoreError::unknown("role", other)),
        }
    }
}

// =============================================================================
// Team Member Type
// =============================================================================

/// Which performance team a manually added member belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MemberType {
    Sales,
    Retail,
}

impl fmt::Display for MemberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberType::Sales => write!(f, "sales"),
            MemberType::Retail => write!(f, "retail"),
        }
    }
}

impl FromStr for MemberType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sales" => Ok(MemberType::Sales),
            "retail" => Ok(MemberType::Retail),
            other => Err(CoreError::unknown("member type", other)),
        }
    }
}

// =============================================================================
// Department
// =============================================================================

/// Department a CRM user belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Sales,
    Retail,
    Marketing,
    Finance,
    Operations,
    Supply,
    Admin,
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Department::Sales => "sales",
            Department::Retail => "retail",
            Department::Marketing => "marketing",
            Department::Finance => "finance",
            Department::Operations => "operations",
            Department::Supply => "supply",
            Department::Admin => "admin",
        };
        f.write_str(s)
    }
}

impl FromStr for Department {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sales" => Ok(Department::Sales),
            "retail" => Ok(Department::Retail),
            "marketing" => Ok(Department::Marketing),
            "finance" | "accounts" => Ok(Department::Finance),
            "operations" | "ops" => Ok(Department::Operations),
            "supply" | "supply_chain" => Ok(Department::Supply),
            "admin" | "administration" => Ok(Department::Admin),
            other => Err(CoreError::unknown("department", other)),
        }
    }
}

// =============================================================================
// Reminder Status & Priority
// =============================================================================

/// Lifecycle state of a follow-up reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    #[default]
    Pending,
    Completed,
    Snoozed,
    Overdue,
    Cancelled,
}

impl fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReminderStatus::Pending => write!(f, "pending"),
            ReminderStatus::Completed => write!(f, "completed"),
            ReminderStatus::Snoozed => write!(f, "snoozed"),
            ReminderStatus::Overdue => write!(f, "overdue"),
            ReminderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for ReminderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ReminderStatus::Pending),
            "completed" | "done" => Ok(ReminderStatus::Completed),
            "snoozed" => Ok(ReminderStatus::Snoozed),
            "overdue" => Ok(ReminderStatus::Overdue),
            "cancelled" | "canceled" => Ok(ReminderStatus::Cancelled),
            other => Err(CoreError::unknown("reminder status", other)),
        }
    }
}

/// Urgency of a reminder.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Urgent => write!(f, "urgent"),
        }
    }
}

impl FromStr for Priority {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" | "normal" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" | "critical" => Ok(Priority::Urgent),
            other => Err(CoreError::unknown("priority", other)),
        }
    }
}

// =============================================================================
// Payment Mode
// =============================================================================

/// How a customer paid. Stored with its display name ("Bank Transfer").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PaymentMode {
    #[serde(rename = "UPI")]
    Upi,
    #[serde(rename = "Bank Transfer")]
    BankTransfer,
    #[serde(rename = "Credit Card")]
    CreditCard,
    #[serde(rename = "Debit Card")]
    DebitCard,
    Cash,
    Cheque,
    Online,
}

impl PaymentMode {
    pub const ALL: [PaymentMode; 7] = [
        PaymentMode::Upi,
        PaymentMode::BankTransfer,
        PaymentMode::CreditCard,
        PaymentMode::DebitCard,
        PaymentMode::Cash,
        PaymentMode::Cheque,
        PaymentMode::Online,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Upi => "UPI",
            PaymentMode::BankTransfer => "Bank Transfer",
            PaymentMode::CreditCard => "Credit Card",
            PaymentMode::DebitCard => "Debit Card",
            PaymentMode::Cash => "Cash",
            PaymentMode::Cheque => "Cheque",
            PaymentMode::Online => "Online",
        }
    }
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        PaymentMode::ALL
            .into_iter()
            .find(|mode| {
                mode.as_str().eq_ignore_ascii_case(needle)
                    || mode.as_str().replace(' ', "_").eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| CoreError::unknown("payment mode", needle))
    }
}

// =============================================================================
// Customer Type / Event Location / Sale Category
// =============================================================================

/// Residency of the paying customer (drives GST and TCS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    #[default]
    Indian,
    Foreign,
}

impl FromStr for CustomerType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "indian" => Ok(CustomerType::Indian),
            "foreign" => Ok(CustomerType::Foreign),
            other => Err(CoreError::unknown("customer type", other)),
        }
    }
}

/// Where the event takes place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EventLocation {
    #[default]
    India,
    OutsideIndia,
}

impl FromStr for EventLocation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(' ', "_").as_str() {
            "india" | "domestic" => Ok(EventLocation::India),
            "outside_india" | "international" => Ok(EventLocation::OutsideIndia),
            other => Err(CoreError::unknown("event location", other)),
        }
    }
}

/// Corporate vs retail sale, as declared on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum SaleCategory {
    Corporate,
    #[default]
    Retail,
}

impl FromStr for SaleCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "corporate" => Ok(SaleCategory::Corporate),
            "retail" => Ok(SaleCategory::Retail),
            other => Err(CoreError::unknown("category of sale", other)),
        }
    }
}

// =============================================================================
// Journey Milestone Status
// =============================================================================

/// Progress of a single post-sale journey milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Skipped,
}

impl FromStr for MilestoneStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(' ', "_").as_str() {
            "pending" => Ok(MilestoneStatus::Pending),
            "in_progress" => Ok(MilestoneStatus::InProgress),
            "completed" | "done" => Ok(MilestoneStatus::Completed),
            "skipped" => Ok(MilestoneStatus::Skipped),
            other => Err(CoreError::unknown("milestone status", other)),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn status(s: &str) -> LeadStatus {
        s.parse().unwrap()
    }

    #[test]
    fn test_lead_status_parsing_is_lenient() {
        assert_eq!(status("Hot"), LeadStatus::Hot);
        assert_eq!(status("attempt_2"), LeadStatus::Attempt2);
        assert_eq!(status("Quote Requested"), LeadStatus::QuoteRequested);
        assert_eq!(status("not-interested"), LeadStatus::NotInterested);
        assert_eq!(status(""), LeadStatus::Unassigned);
        assert_eq!(status("something_else"), LeadStatus::Unknown);
    }

    #[test]
    fn test_lead_status_roundtrips_through_as_str() {
        for s in [
            "unassigned",
            "attempt_1",
            "quote_received",
            "payment_post_service",
            "not_interested",
        ] {
            assert_eq!(status(s).as_str(), s);
        }
    }

    #[test]
    fn test_lead_status_serde_uses_stored_names() {
        let json = serde_json::to_string(&LeadStatus::Attempt3).unwrap();
        assert_eq!(json, "\"attempt_3\"");
        let json = serde_json::to_string(&LeadStatus::PaymentPostService).unwrap();
        assert_eq!(json, "\"payment_post_service\"");
    }

    #[test]
    fn test_touch_based_classification() {
        assert!(!LeadStatus::Unassigned.is_touch_based());
        assert!(!LeadStatus::Assigned.is_touch_based());
        assert!(!LeadStatus::Unknown.is_touch_based());
        assert!(LeadStatus::Attempt1.is_touch_based());
        assert!(LeadStatus::QuoteReceived.is_touch_based());

        assert!(!LeadStatus::QuoteReceived.is_marketing_touch_based());
        assert!(!LeadStatus::PickupLater.is_marketing_touch_based());
        assert!(LeadStatus::Junk.is_marketing_touch_based());
    }

    #[test]
    fn test_qualified_and_converted_sets() {
        assert!(LeadStatus::Dropped.is_qualified());
        assert!(LeadStatus::PickupLater.is_qualified());
        assert!(!LeadStatus::Junk.is_qualified());
        assert!(!LeadStatus::Contacted.is_qualified());

        assert!(LeadStatus::PaymentPostService.is_converted());
        assert!(!LeadStatus::PaymentPostService.is_source_converted());
        assert!(LeadStatus::Cold.is_source_qualified());
        assert!(!LeadStatus::Dropped.is_source_qualified());
    }

    #[test]
    fn test_order_status_terminal() {
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
        assert!(!OrderStatus::PendingApproval.is_terminal());
        assert_eq!("canceled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
    }

    #[test]
    fn test_role_checks() {
        assert!(Role::SuperAdmin.is_admin());
        assert!(!Role::Admin.is_super_admin());
        assert!(Role::SalesManager.is_sales_role());
        assert!(!Role::FinanceManager.is_sales_role());
        assert_eq!("Super Admin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert!("janitor".parse::<Role>().is_err());
    }

    #[test]
    fn test_payment_mode_parsing() {
        assert_eq!("upi".parse::<PaymentMode>().unwrap(), PaymentMode::Upi);
        assert_eq!(
            "bank transfer".parse::<PaymentMode>().unwrap(),
            PaymentMode::BankTransfer
        );
        assert_eq!(
            "Credit_Card".parse::<PaymentMode>().unwrap(),
            PaymentMode::CreditCard
        );
        assert!("barter".parse::<PaymentMode>().is_err());
    }

    #[test]
    fn test_business_type_serde() {
        assert_eq!(serde_json::to_string(&BusinessType::B2b).unwrap(), "\"B2B\"");
        assert_eq!(BusinessType::default(), BusinessType::B2c);
        assert_eq!("b2b".parse::<BusinessType>().unwrap(), BusinessType::B2b);
    }
}
