//! # Performance Aggregation
//!
//! Joins orders, leads, allocations, users and team memberships in memory and
//! produces the period-bucketed rollups stored in the stats snapshot.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  AggregationInput ──► AllocationIndex (order id / number / order_ids)   │
//! │        │                                                                │
//! │        ├──► financials       per Period                                 │
//! │        ├──► sales team  ──►  per member, per Period (sales, margin, ..) │
//! │        ├──► retail team ──►  per member lead funnel                     │
//! │        └──► marketing   ──►  by source / by campaign                    │
//! │                                                                         │
//! │                     ▼                                                   │
//! │               StatsSnapshot (stored as the "latest" document)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Money Rules
//! - Sales are INR equivalents (see [`Order::sales_amount`]).
//! - Margin = sales − Σ allocation buying cost − buying price inclusions.
//!   Margin can be negative and is never clamped.
//! - Actualized figures only count orders whose event is strictly in the past.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use ts_rs::TS;

use crate::dates::{ist_date_string, start_of_ist_day, to_iso_millis};
use crate::money::Money;
use crate::period::{DateRange, Period};
use crate::status::BusinessType;
use crate::types::{Allocation, Lead, LedgerEntry, Order, SalesTarget, TeamMember, User};

// =============================================================================
// Input
// =============================================================================

/// Everything one aggregation run reads.
#[derive(Debug, Clone, Default)]
pub struct AggregationInput {
    pub orders: Vec<Order>,
    pub leads: Vec<Lead>,
    pub allocations: Vec<Allocation>,
    pub inventory_count: usize,
    pub users: Vec<User>,
    pub sales_members: Vec<TeamMember>,
    pub retail_members: Vec<TeamMember>,
    pub targets: Vec<SalesTarget>,
    pub receivables: Vec<LedgerEntry>,
    pub payables: Vec<LedgerEntry>,
}

// =============================================================================
// Allocation Index
// =============================================================================

/// Allocations grouped by every key that can point at an order.
pub struct AllocationIndex<'a> {
    allocations: &'a [Allocation],
    by_key: HashMap<&'a str, Vec<usize>>,
}

impl<'a> AllocationIndex<'a> {
    pub fn new(allocations: &'a [Allocation]) -> Self {
        let mut by_key: HashMap<&'a str, Vec<usize>> = HashMap::new();
        for (idx, allocation) in allocations.iter().enumerate() {
            for key in allocation.order_keys().filter(|k| !k.is_empty()) {
                let entries = by_key.entry(key).or_default();
                if !entries.contains(&idx) {
                    entries.push(idx);
                }
            }
        }
        AllocationIndex {
            allocations,
            by_key,
        }
    }

    /// Allocations linked to an order by its id or its order number, each
    /// returned once.
    pub fn for_order(&self, order: &Order) -> Vec<&'a Allocation> {
        let allocations = self.allocations;
        let mut seen = HashSet::new();
        let keys = std::iter::once(order.id.as_str()).chain(order.order_number.as_deref());
        keys.filter_map(|key| self.by_key.get(key))
            .flatten()
            .filter(|idx| seen.insert(**idx))
            .map(|idx| &allocations[*idx])
            .collect()
    }

    /// Sales minus allocation buying cost and buying price inclusions.
    pub fn order_margin(&self, order: &Order) -> Money {
        let buying: Money = self
            .for_order(order)
            .iter()
            .map(|a| a.buying_cost())
            .sum();
        order.sales_amount() - buying - order.buying_price_inclusions()
    }
}

/// `true` when the order's event date falls inside the range. Lifetime
/// (`None`) includes every order, other periods skip orders without an
/// event date.
pub fn in_period(order: &Order, range: Option<&DateRange>) -> bool {
    match range {
        None => true,
        Some(range) => order
            .event_date
            .map(|d| range.contains(&d))
            .unwrap_or(false),
    }
}

// =============================================================================
// Financials
// =============================================================================

/// Company-wide figures for one period (rupees).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub total_sales: f64,
    pub active_sales: f64,
    pub total_receivables: f64,
    pub total_payables: f64,
    pub total_margin: f64,
    pub margin_percentage: f64,
    pub order_count: usize,
}

pub fn financials(
    orders: &[Order],
    index: &AllocationIndex<'_>,
    receivables: Money,
    payables: Money,
    period: Period,
    now: DateTime<Utc>,
) -> FinancialSummary {
    let range = period.range(now);
    let today = start_of_ist_day(&now);

    let mut sales = Money::zero();
    let mut margin = Money::zero();
    let mut active = Money::zero();
    let mut count = 0;

    for order in orders.iter().filter(|o| in_period(o, range.as_ref())) {
        let amount = order.sales_amount();
        sales += amount;
        margin += index.order_margin(order);
        count += 1;

        let upcoming = order.event_date.map(|d| d >= today).unwrap_or(true);
        if upcoming && !order.status.is_terminal() {
            active += amount;
        }
    }

    FinancialSummary {
        total_sales: sales.rupees(),
        active_sales: active.rupees(),
        total_receivables: receivables.rupees(),
        total_payables: payables.rupees(),
        total_margin: margin.rupees(),
        margin_percentage: margin.percentage_of(sales),
        order_count: count,
    }
}

// =============================================================================
// Teams
// =============================================================================

fn member_user_id(member: &TeamMember) -> &str {
    if member.user_id.is_empty() {
        &member.id
    } else {
        &member.user_id
    }
}

/// Users listed in the sales membership collection. The stored snapshot
/// covers these only; the live view also takes in everyone with a sales role.
pub fn snapshot_team<'a>(users: &'a [User], members: &[TeamMember]) -> Vec<&'a User> {
    let ids: HashSet<&str> = members.iter().map(member_user_id).collect();
    users.iter().filter(|u| ids.contains(u.id.as_str())).collect()
}

/// Users with a sales role plus manually added sales members.
pub fn sales_team<'a>(users: &'a [User], members: &[TeamMember]) -> Vec<&'a User> {
    let manual: HashSet<&str> = members.iter().map(member_user_id).collect();
    users
        .iter()
        .filter(|u| u.role.is_sales_role() || manual.contains(u.id.as_str()))
        .collect()
}

/// Users in the retail department plus manually added retail members.
pub fn retail_team<'a>(users: &'a [User], members: &[TeamMember]) -> Vec<&'a User> {
    let manual: HashSet<&str> = members.iter().map(member_user_id).collect();
    users
        .iter()
        .filter(|u| u.is_retail() || manual.contains(u.id.as_str()))
        .collect()
}

/// Sales target in rupees: the `sales_targets` entry, else the user's own
/// `sales_target` field.
pub fn target_for(user: &User, targets: &HashMap<&str, f64>) -> Money {
    targets
        .get(user.id.as_str())
        .copied()
        .or_else(|| user.extra.get("sales_target").and_then(Value::as_f64))
        .map(Money::from_rupees)
        .unwrap_or_default()
}

/// An order belongs to a user when its sales person matches the user's
/// email (values containing `@`) or name.
pub fn order_belongs_to(order: &Order, user: &User) -> bool {
    match order.sales_person().map(str::trim) {
        Some(sp) if sp.contains('@') => sp.eq_ignore_ascii_case(user.email.trim()),
        Some(sp) if !sp.is_empty() => sp.eq_ignore_ascii_case(user.name.trim()),
        _ => false,
    }
}

// =============================================================================
// Sales Performance
// =============================================================================

/// Pipeline value split by business type.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pipeline {
    pub retail: Money,
    pub corporate: Money,
}

impl Pipeline {
    /// Sums `potential_value` of pipeline leads. B2B goes to corporate,
    /// everything else to retail.
    pub fn from_leads<'a>(leads: impl IntoIterator<Item = &'a Lead>) -> Self {
        let mut pipeline = Pipeline::default();
        for lead in leads.into_iter().filter(|l| l.is_pipeline()) {
            match lead.business_type() {
                BusinessType::B2b => pipeline.corporate += lead.potential_value(),
                BusinessType::B2c => pipeline.retail += lead.potential_value(),
            }
        }
        pipeline
    }

    pub fn overall(&self) -> Money {
        self.retail + self.corporate
    }
}

/// One sales person's figures for one period (rupees).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSales {
    pub total_sales: f64,
    pub actualized_sales: f64,
    pub total_margin: f64,
    pub actualized_margin: f64,
    pub margin_percentage: f64,
    pub actualized_margin_percentage: f64,
    pub retail_pipeline: f64,
    pub corporate_pipeline: f64,
    pub overall_pipeline: f64,
    pub order_count: usize,
}

pub fn period_sales<'a>(
    orders: impl IntoIterator<Item = &'a Order>,
    index: &AllocationIndex<'_>,
    pipeline: Pipeline,
    now: DateTime<Utc>,
) -> PeriodSales {
    let mut sales = Money::zero();
    let mut margin = Money::zero();
    let mut actual_sales = Money::zero();
    let mut actual_margin = Money::zero();
    let mut count = 0;

    for order in orders {
        let amount = order.sales_amount();
        let order_margin = index.order_margin(order);
        sales += amount;
        margin += order_margin;
        count += 1;

        if order.event_date.map(|d| d < now).unwrap_or(false) {
            actual_sales += amount;
            actual_margin += order_margin;
        }
    }

    PeriodSales {
        total_sales: sales.rupees(),
        actualized_sales: actual_sales.rupees(),
        total_margin: margin.rupees(),
        actualized_margin: actual_margin.rupees(),
        margin_percentage: margin.percentage_of(sales),
        actualized_margin_percentage: actual_margin.percentage_of(actual_sales),
        retail_pipeline: pipeline.retail.rupees(),
        corporate_pipeline: pipeline.corporate.rupees(),
        overall_pipeline: pipeline.overall().rupees(),
        order_count: count,
    }
}

/// A sales team member with figures for every snapshot period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesPerformanceEntry {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Rupees.
    pub target: f64,
    pub periods: BTreeMap<String, PeriodSales>,
}

/// A sales team member's figures in crores, as served to the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SalesTeamRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub target: f64,
    pub total_sales: f64,
    pub actualized_sales: f64,
    pub total_margin: f64,
    pub actualized_margin: f64,
    pub margin_percentage: f64,
    pub actualized_margin_percentage: f64,
    pub retail_pipeline: f64,
    pub corporate_pipeline: f64,
    pub overall_pipeline: f64,
    pub order_count: usize,
}

fn to_crores(rupees: f64) -> f64 {
    rupees / crate::CRORE
}

impl SalesTeamRow {
    pub fn new(id: &str, name: &str, email: &str, target: f64, sales: &PeriodSales) -> Self {
        SalesTeamRow {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            target: to_crores(target),
            total_sales: to_crores(sales.total_sales),
            actualized_sales: to_crores(sales.actualized_sales),
            total_margin: to_crores(sales.total_margin),
            actualized_margin: to_crores(sales.actualized_margin),
            margin_percentage: sales.margin_percentage,
            actualized_margin_percentage: sales.actualized_margin_percentage,
            retail_pipeline: to_crores(sales.retail_pipeline),
            corporate_pipeline: to_crores(sales.corporate_pipeline),
            overall_pipeline: to_crores(sales.overall_pipeline),
            order_count: sales.order_count,
        }
    }
}

/// Rows for one period in crores, highest total sales first.
pub fn sales_rows_in_crores(
    entries: &BTreeMap<String, SalesPerformanceEntry>,
    period: &str,
) -> Vec<SalesTeamRow> {
    let mut rows: Vec<SalesTeamRow> = entries
        .values()
        .map(|e| {
            let sales = e.periods.get(period).cloned().unwrap_or_default();
            SalesTeamRow::new(&e.id, &e.name, &e.email, e.target, &sales)
        })
        .collect();
    sort_by_sales(&mut rows);
    rows
}

fn sort_by_sales(rows: &mut [SalesTeamRow]) {
    rows.sort_by(|a, b| {
        b.total_sales
            .partial_cmp(&a.total_sales)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn targets_by_user(targets: &[SalesTarget]) -> HashMap<&str, f64> {
    targets
        .iter()
        .filter_map(|t| {
            let user_id = if t.user_id.is_empty() { &t.id } else { &t.user_id };
            t.target.map(|target| (user_id.as_str(), target))
        })
        .collect()
}

pub fn sales_performance(
    input: &AggregationInput,
    index: &AllocationIndex<'_>,
    periods: &[Period],
    now: DateTime<Utc>,
) -> BTreeMap<String, SalesPerformanceEntry> {
    let targets = targets_by_user(&input.targets);
    let ranges: Vec<(Period, Option<DateRange>)> =
        periods.iter().map(|p| (*p, p.range(now))).collect();

    snapshot_team(&input.users, &input.sales_members)
        .into_iter()
        .map(|user| {
            let pipeline =
                Pipeline::from_leads(input.leads.iter().filter(|l| l.is_assigned_to(&user.email)));
            let orders: Vec<&Order> = input
                .orders
                .iter()
                .filter(|o| order_belongs_to(o, user))
                .collect();

            let periods = ranges
                .iter()
                .map(|(period, range)| {
                    let in_range = orders
                        .iter()
                        .copied()
                        .filter(|o| in_period(o, range.as_ref()));
                    (period.key(), period_sales(in_range, index, pipeline, now))
                })
                .collect();

            let entry = SalesPerformanceEntry {
                id: user.id.clone(),
                name: user.name.clone(),
                email: user.email.clone(),
                target: target_for(user, &targets).rupees(),
                periods,
            };
            (user.email.clone(), entry)
        })
        .collect()
}

/// Live team view: lifetime figures over orders created in the last three
/// months, in crores.
pub fn live_sales_team(input: &AggregationInput, now: DateTime<Utc>) -> Vec<SalesTeamRow> {
    let cutoff = now.checked_sub_months(Months::new(3)).unwrap_or(now);
    let recent: Vec<Order> = input
        .orders
        .iter()
        .filter(|o| o.created_date.map(|d| d >= cutoff).unwrap_or(true))
        .cloned()
        .collect();
    let index = AllocationIndex::new(&input.allocations);
    let targets = targets_by_user(&input.targets);

    let mut rows: Vec<SalesTeamRow> = sales_team(&input.users, &input.sales_members)
        .into_iter()
        .map(|user| {
            let pipeline =
                Pipeline::from_leads(input.leads.iter().filter(|l| l.is_assigned_to(&user.email)));
            let orders = recent.iter().filter(|o| order_belongs_to(o, user));
            let sales = period_sales(orders, &index, pipeline, now);
            let target = target_for(user, &targets).rupees();
            SalesTeamRow::new(&user.id, &user.name, &user.email, target, &sales)
        })
        .collect();
    sort_by_sales(&mut rows);
    rows
}

// =============================================================================
// Retail Tracker
// =============================================================================

/// Lead funnel counts for one retail team member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RetailTrackerEntry {
    pub id: String,
    pub name: String,
    pub email: String,
    pub assigned: usize,
    pub touchbased: usize,
    pub not_touchbased: usize,
    pub qualified: usize,
    pub hot_warm: usize,
    pub converted: usize,
}

impl RetailTrackerEntry {
    pub fn for_user<'a>(user: &User, leads: impl IntoIterator<Item = &'a Lead>) -> Self {
        let mut entry = RetailTrackerEntry {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            ..Default::default()
        };
        for lead in leads {
            entry.assigned += 1;
            if lead.status.is_touch_based() {
                entry.touchbased += 1;
            } else {
                entry.not_touchbased += 1;
            }
            if lead.status.is_qualified() {
                entry.qualified += 1;
            }
            if lead.is_hot_warm() {
                entry.hot_warm += 1;
            }
            if lead.status.is_converted() {
                entry.converted += 1;
            }
        }
        entry
    }
}

/// Retail team funnel. With a range, only leads created inside it count.
pub fn retail_tracker(
    users: &[User],
    members: &[TeamMember],
    leads: &[Lead],
    created_within: Option<&DateRange>,
) -> Vec<RetailTrackerEntry> {
    retail_team(users, members)
        .into_iter()
        .map(|user| {
            let assigned = leads.iter().filter(|l| {
                l.is_assigned_to(&user.email)
                    && match created_within {
                        Some(range) => l.created_date.map(|d| range.contains(&d)).unwrap_or(false),
                        None => true,
                    }
            });
            RetailTrackerEntry::for_user(user, assigned)
        })
        .collect()
}

// =============================================================================
// Marketing Rollup
// =============================================================================

/// Lead counts for one source or campaign.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SourceRollup {
    pub total: usize,
    pub qualified: usize,
    pub converted: usize,
    /// Σ potential value of qualified leads (rupees).
    pub pipeline: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketingRollup {
    pub sources: BTreeMap<String, SourceRollup>,
    pub campaigns: BTreeMap<String, SourceRollup>,
}

pub fn marketing_rollup(leads: &[Lead]) -> MarketingRollup {
    let mut sources: BTreeMap<String, (SourceRollup, Money)> = BTreeMap::new();
    let mut campaigns: BTreeMap<String, (SourceRollup, Money)> = BTreeMap::new();

    for lead in leads {
        let source = lead.source.clone().unwrap_or_else(|| "Unknown".to_string());
        let campaign = lead
            .campaign_name
            .clone()
            .unwrap_or_else(|| "Direct".to_string());

        for (rollup, pipeline) in [
            sources.entry(source).or_default(),
            campaigns.entry(campaign).or_default(),
        ] {
            rollup.total += 1;
            if lead.status.is_source_qualified() {
                rollup.qualified += 1;
                *pipeline += lead.potential_value();
            }
            if lead.status.is_source_converted() {
                rollup.converted += 1;
            }
        }
    }

    let finish = |map: BTreeMap<String, (SourceRollup, Money)>| {
        map.into_iter()
            .map(|(key, (mut rollup, pipeline))| {
                rollup.pipeline = pipeline.rupees();
                (key, rollup)
            })
            .collect()
    };

    MarketingRollup {
        sources: finish(sources),
        campaigns: finish(campaigns),
    }
}

// =============================================================================
// Snapshot
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceCounts {
    pub orders: usize,
    pub leads: usize,
    pub allocations: usize,
    pub inventory: usize,
    pub users: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub processing_time_ms: u64,
    pub data_source_counts: DataSourceCounts,
}

/// The stored stats document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// ISO-8601 UTC time the snapshot was computed.
    pub timestamp: String,
    /// IST calendar date of the run (`YYYY-MM-DD`).
    pub last_updated: String,
    pub financials: BTreeMap<String, FinancialSummary>,
    pub sales_performance: BTreeMap<String, SalesPerformanceEntry>,
    pub retail_tracker: BTreeMap<String, RetailTrackerEntry>,
    pub marketing_performance: MarketingRollup,
    pub metadata: SnapshotMetadata,
}

impl StatsSnapshot {
    pub fn computed_at(&self) -> Option<DateTime<Utc>> {
        crate::dates::parse_timestamp(&self.timestamp)
    }
}

/// Computes the full snapshot. `processing_time_ms` is left at zero for the
/// caller to fill in.
pub fn aggregate(input: &AggregationInput, now: DateTime<Utc>) -> StatsSnapshot {
    let index = AllocationIndex::new(&input.allocations);
    let receivables: Money = input.receivables.iter().map(LedgerEntry::amount).sum();
    let payables: Money = input.payables.iter().map(LedgerEntry::amount).sum();

    let financials = Period::SNAPSHOT
        .iter()
        .map(|p| {
            (
                p.key(),
                financials(&input.orders, &index, receivables, payables, *p, now),
            )
        })
        .collect();

    let retail_tracker = retail_tracker(
        &input.users,
        &input.retail_members,
        &input.leads,
        None,
    )
    .into_iter()
    .map(|e| (e.email.clone(), e))
    .collect();

    StatsSnapshot {
        timestamp: to_iso_millis(&now),
        last_updated: ist_date_string(&now),
        financials,
        sales_performance: sales_performance(input, &index, &Period::SNAPSHOT, now),
        retail_tracker,
        marketing_performance: marketing_rollup(&input.leads),
        metadata: SnapshotMetadata {
            processing_time_ms: 0,
            data_source_counts: DataSourceCounts {
                orders: input.orders.len(),
                leads: input.leads.len(),
                allocations: input.allocations.len(),
                inventory: input.inventory_count,
                users: input.users.len(),
            },
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{LeadStatus, OrderStatus, Role, Temperature};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 6, 0, 0).unwrap()
    }

    fn order(id: &str, currency: &str, base: f64, rate: Option<f64>) -> Order {
        Order {
            id: id.into(),
            payment_currency: Some(currency.into()),
            base_amount: Some(base),
            exchange_rate: rate,
            sales_person: Some("priya@example.com".into()),
            ..Default::default()
        }
    }

    fn user(id: &str, name: &str, email: &str, role: Role) -> User {
        User {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            role,
            ..Default::default()
        }
    }

    #[test]
    fn test_lifetime_sales_sum_exchange_rates() {
        let orders = vec![
            order("o1", "INR", 10_000.0, None),
            order("o2", "USD", 100.0, Some(83.0)),
            order("o3", "EUR", 50.0, None),
        ];
        let index = AllocationIndex::new(&[]);
        let summary = financials(
            &orders,
            &index,
            Money::zero(),
            Money::zero(),
            Period::Lifetime,
            now(),
        );
        assert_eq!(summary.total_sales, 10_000.0 + 8_300.0 + 50.0);
        assert_eq!(summary.order_count, 3);
    }

    #[test]
    fn test_margin_tracks_buying_price_delta_and_may_go_negative() {
        let o = Order {
            order_number: Some("ORD-7".into()),
            buying_price_inclusions: Some(1_000.0),
            ..order("o1", "INR", 10_000.0, None)
        };
        let mut allocations = vec![Allocation {
            id: "a1".into(),
            order_number: Some("ORD-7".into()),
            order_ids: vec!["o1".into()],
            total_buying_price: Some(6_000.0),
            ..Default::default()
        }];

        let margin = AllocationIndex::new(&allocations).order_margin(&o);
        assert_eq!(margin.rupees(), 3_000.0);

        allocations[0].total_buying_price = Some(13_500.0);
        let margin = AllocationIndex::new(&allocations).order_margin(&o);
        assert_eq!(margin.rupees(), -4_500.0);
    }

    #[test]
    fn test_allocation_linked_by_several_keys_counts_once() {
        let o = Order {
            order_number: Some("ORD-1".into()),
            ..order("o1", "INR", 100.0, None)
        };
        let allocations = vec![Allocation {
            id: "a1".into(),
            order_id: Some("o1".into()),
            order_number: Some("ORD-1".into()),
            order_ids: vec!["o1".into()],
            ..Default::default()
        }];
        assert_eq!(AllocationIndex::new(&allocations).for_order(&o).len(), 1);
    }

    #[test]
    fn test_period_excludes_orders_without_event_date() {
        let mut with_date = order("o1", "INR", 100.0, None);
        with_date.event_date = Some(Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap());
        let without_date = order("o2", "INR", 200.0, None);
        let orders = vec![with_date, without_date];
        let index = AllocationIndex::new(&[]);

        let month = financials(&orders, &index, Money::zero(), Money::zero(), Period::CurrentMonth, now());
        assert_eq!(month.order_count, 1);
        assert_eq!(month.total_sales, 100.0);

        let lifetime = financials(&orders, &index, Money::zero(), Money::zero(), Period::Lifetime, now());
        assert_eq!(lifetime.order_count, 2);
    }

    #[test]
    fn test_active_sales_skip_past_and_cancelled_orders() {
        let mut past = order("o1", "INR", 100.0, None);
        past.event_date = Some(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
        let mut cancelled = order("o2", "INR", 200.0, None);
        cancelled.status = OrderStatus::Cancelled;
        let undated = order("o3", "INR", 400.0, None);

        let orders = vec![past, cancelled, undated];
        let summary = financials(
            &orders,
            &AllocationIndex::new(&[]),
            Money::zero(),
            Money::zero(),
            Period::Lifetime,
            now(),
        );
        assert_eq!(summary.active_sales, 400.0);
        assert_eq!(summary.margin_percentage, 100.0);
    }

    #[test]
    fn test_hot_lead_pipeline_goes_to_exactly_one_bucket() {
        let retail = Lead {
            status: LeadStatus::Hot,
            potential_value: Some(50_000.0),
            ..Default::default()
        };
        let corporate = Lead {
            status: LeadStatus::QuoteRequested,
            temperature: Some(Temperature::Hot),
            business_type: Some(BusinessType::B2b),
            potential_value: Some(75_000.0),
            ..Default::default()
        };
        let junk = Lead {
            status: LeadStatus::Junk,
            potential_value: Some(1_000_000.0),
            ..Default::default()
        };

        let pipeline = Pipeline::from_leads([&retail, &corporate, &junk]);
        assert_eq!(pipeline.retail.rupees(), 50_000.0);
        assert_eq!(pipeline.corporate.rupees(), 75_000.0);
        assert_eq!(pipeline.overall().rupees(), 125_000.0);
    }

    #[test]
    fn test_order_matching_by_name_or_email() {
        let u = user("u1", "Priya Shah", "priya@example.com", Role::SalesPerson);
        let mut o = order("o1", "INR", 1.0, None);
        assert!(order_belongs_to(&o, &u));

        o.sales_person = Some("priya shah".into());
        assert!(order_belongs_to(&o, &u));

        o.sales_person = None;
        o.sales_person_email = Some("other@example.com".into());
        assert!(!order_belongs_to(&o, &u));
    }

    #[test]
    fn test_sales_team_includes_manual_members() {
        let users = vec![
            user("u1", "A", "a@x.com", Role::SalesPerson),
            user("u2", "B", "b@x.com", Role::FinanceManager),
            user("u3", "C", "c@x.com", Role::Viewer),
        ];
        let members = vec![TeamMember {
            id: "m1".into(),
            user_id: "u2".into(),
            ..Default::default()
        }];
        let team: Vec<&str> = sales_team(&users, &members)
            .iter()
            .map(|u| u.id.as_str())
            .collect();
        assert_eq!(team, vec!["u1", "u2"]);
    }

    #[test]
    fn test_actualized_only_for_past_events() {
        let mut past = order("o1", "INR", 1_000.0, None);
        past.event_date = Some(now() - chrono::Duration::days(1));
        let mut future = order("o2", "INR", 3_000.0, None);
        future.event_date = Some(now() + chrono::Duration::days(1));

        let orders = vec![past, future];
        let sales = period_sales(&orders, &AllocationIndex::new(&[]), Pipeline::default(), now());
        assert_eq!(sales.total_sales, 4_000.0);
        assert_eq!(sales.actualized_sales, 1_000.0);
        assert_eq!(sales.actualized_margin_percentage, 100.0);
    }

    #[test]
    fn test_retail_tracker_funnel() {
        let u = User {
            department: Some(crate::status::Department::Retail),
            ..user("u1", "R", "r@x.com", Role::Viewer)
        };
        let leads = vec![
            Lead {
                assigned_to: Some("r@x.com".into()),
                status: LeadStatus::Assigned,
                ..Default::default()
            },
            Lead {
                assigned_to: Some("R@X.com".into()),
                status: LeadStatus::Warm,
                ..Default::default()
            },
            Lead {
                assigned_to: Some("r@x.com".into()),
                status: LeadStatus::PaymentPostService,
                ..Default::default()
            },
            Lead {
                assigned_to: Some("someone@x.com".into()),
                status: LeadStatus::Hot,
                ..Default::default()
            },
        ];

        let entries = retail_tracker(&[u], &[], &leads, None);
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.assigned, 3);
        assert_eq!(e.touchbased, 2);
        assert_eq!(e.not_touchbased, 1);
        assert_eq!(e.qualified, 2);
        assert_eq!(e.hot_warm, 1);
        assert_eq!(e.converted, 1);
    }

    #[test]
    fn test_marketing_rollup_defaults() {
        let leads = vec![
            Lead {
                status: LeadStatus::Qualified,
                potential_value: Some(10.0),
                ..Default::default()
            },
            Lead {
                source: Some("Facebook".into()),
                campaign_name: Some("IPL".into()),
                status: LeadStatus::Invoiced,
                ..Default::default()
            },
        ];
        let rollup = marketing_rollup(&leads);
        assert_eq!(rollup.sources["Unknown"].qualified, 1);
        assert_eq!(rollup.sources["Unknown"].pipeline, 10.0);
        assert_eq!(rollup.campaigns["Direct"].total, 1);
        assert_eq!(rollup.sources["Facebook"].converted, 1);
    }

    #[test]
    fn test_aggregate_saturates_on_huge_amounts() {
        let input = AggregationInput {
            orders: vec![
                order("o1", "INR", 6e16, None),
                order("o2", "INR", 6e16, None),
            ],
            ..Default::default()
        };
        let snapshot = aggregate(&input, now());
        let lifetime = &snapshot.financials["lifetime"];
        assert_eq!(lifetime.order_count, 2);
        assert_eq!(lifetime.total_sales, Money::from_paise(i64::MAX).rupees());
    }

    #[test]
    fn test_snapshot_shape() {
        let input = AggregationInput {
            orders: vec![order("o1", "INR", 2_000.0, None)],
            users: vec![
                user("u1", "Priya", "priya@example.com", Role::SalesHead),
                user("u2", "Kabir", "kabir@example.com", Role::SalesPerson),
            ],
            sales_members: vec![TeamMember {
                id: "m1".into(),
                user_id: "u1".into(),
                ..Default::default()
            }],
            targets: vec![SalesTarget {
                id: "u1".into(),
                target: Some(20_000_000.0),
                ..Default::default()
            }],
            receivables: vec![LedgerEntry {
                amount: Some(500.0),
                ..Default::default()
            }],
            ..Default::default()
        };

        let snapshot = aggregate(&input, now());
        assert_eq!(snapshot.financials.len(), 5);
        assert_eq!(snapshot.financials["lifetime"].total_receivables, 500.0);
        assert_eq!(snapshot.last_updated, "2025-06-15");

        assert_eq!(snapshot.sales_performance.len(), 1);
        assert!(!snapshot.sales_performance.contains_key("kabir@example.com"));
        let entry = &snapshot.sales_performance["priya@example.com"];
        assert_eq!(entry.target, 20_000_000.0);
        assert_eq!(entry.periods["lifetime"].total_sales, 2_000.0);
        assert!(entry.periods.contains_key("last_3_months"));

        let rows = sales_rows_in_crores(&snapshot.sales_performance, "lifetime");
        assert_eq!(rows[0].target, 2.0);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["salesPerformance"]["priya@example.com"]["periods"]["lifetime"]["totalSales"].is_number());
        assert!(json["metadata"]["dataSourceCounts"]["orders"].is_number());
    }
}
