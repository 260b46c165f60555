//! # Bulk Uploads
//!
//! CSV uploads for orders, payments and ticket allocations.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  rows ──► field rules (salesdesk_core::bulk) ──► lead lookup           │
//! │             │ invalid                               │ missing          │
//! │             ▼                                       ▼                  │
//! │        failures[] ◄──────────────────────── "Lead not found"           │
//! │                                                                         │
//! │  valid rows ──► build documents ──► WriteOp list                       │
//! │                                        │                                │
//! │                                        ▼                                │
//! │                 write_batch: chunks of ≤ 500, committed in order       │
//! │                                        │                                │
//! │                                        ▼                                │
//! │                        crm_bulk_uploads log (always written)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A bad row never fails the request. A failed chunk does: chunks committed
//! before it stay applied, and the upload log records the failure.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use salesdesk_core::bulk::{
    build_bulk_order, build_bulk_payment, mark_payment_received, preview_allocation,
    process_allocation, validate_order_row, validate_payment_row, AllocationBook,
    AllocationPreview, AllocationRow, AllocationSummary, BulkOrder, BulkPayment, OrderRow,
    PaymentRow, RowReport, RowSummary, UploadContext, LEAD_NOT_FOUND,
};
use salesdesk_core::dates::parse_timestamp;
use salesdesk_core::{BulkUploadLog, Lead, Order};
use salesdesk_db::collections;
use salesdesk_db::{new_id, Database, DbResult, WriteOp};

use crate::error::ApiResult;

pub const ORDER_UPLOAD: &str = "orders";
pub const PAYMENT_UPLOAD: &str = "payments";
pub const ALLOCATION_UPLOAD: &str = "allocations";

/// Who is uploading.
#[derive(Debug, Clone, Copy)]
pub struct Uploader<'a> {
    pub name: &'a str,
    pub email: &'a str,
}

/// A row that was not written.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFailure {
    pub row: usize,
    pub lead_id: Option<String>,
    pub errors: Vec<String>,
}

impl From<RowReport> for RowFailure {
    fn from(report: RowReport) -> Self {
        RowFailure {
            row: report.row,
            lead_id: report.lead_id,
            errors: report.errors,
        }
    }
}

impl From<AllocationPreview> for RowFailure {
    fn from(preview: AllocationPreview) -> Self {
        RowFailure {
            row: preview.row,
            lead_id: preview.lead_id.or(preview.lead_identifier),
            errors: preview.errors,
        }
    }
}

/// Outcome of an upload.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub upload_id: String,
    pub upload_type: String,
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub orders_created: usize,
    pub orders_updated: usize,
    pub total_amount: f64,
    pub tickets_allocated: i64,
    pub failures: Vec<RowFailure>,
}

impl UploadReport {
    fn new(upload_type: &str, total: usize) -> Self {
        UploadReport {
            upload_id: new_id(),
            upload_type: upload_type.to_string(),
            total,
            ..Default::default()
        }
    }

    fn fail(&mut self, failure: impl Into<RowFailure>) {
        self.failed += 1;
        self.failures.push(failure.into());
    }
}

// =============================================================================
// Shared Helpers
// =============================================================================

async fn load_leads<'a>(
    db: &Database,
    ids: impl Iterator<Item = Option<&'a str>>,
) -> DbResult<HashMap<String, Lead>> {
    let ids: Vec<String> = ids
        .flatten()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let leads = db.leads().get_many(&ids).await?;
    Ok(leads.into_iter().map(|l| (l.id.clone(), l)).collect())
}

fn check_leads(reports: &mut [RowReport], leads: &HashMap<String, Lead>) {
    for report in reports.iter_mut() {
        if let Some(id) = &report.lead_id {
            if !leads.contains_key(id) {
                report.reject(LEAD_NOT_FOUND);
            }
        }
    }
}

/// Event date stored on the lead, else the inventory date for the event.
fn fallback_event_date(
    lead: &Lead,
    event_name: Option<&str>,
    inventory_dates: &HashMap<String, DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    let from_lead = ["event_date", "event_start_date"]
        .iter()
        .find_map(|key| lead.extra.get(*key).and_then(Value::as_str).and_then(parse_timestamp));
    from_lead.or_else(|| {
        event_name
            .map(str::trim)
            .and_then(|name| inventory_dates.get(name).copied())
    })
}

async fn inventory_event_dates(db: &Database) -> DbResult<HashMap<String, DateTime<Utc>>> {
    Ok(db
        .inventory()
        .list_active()
        .await?
        .into_iter()
        .filter_map(|i| i.event_date.map(|d| (i.event_name.trim().to_string(), d)))
        .collect())
}

/// Commits the writes and records the upload log.
async fn finish(
    db: &Database,
    ops: Vec<WriteOp>,
    report: UploadReport,
    uploaded_by: &str,
) -> ApiResult<UploadReport> {
    let outcome = db.store().write_batch(&ops).await;

    let mut log = BulkUploadLog {
        id: report.upload_id.clone(),
        upload_type: report.upload_type.clone(),
        uploaded_by: Some(uploaded_by.to_string()),
        total_rows: report.total,
        success_rows: report.success,
        failed_rows: report.failed,
        status: BulkUploadLog::status_for(report.success, report.failed).to_string(),
        errors: report
            .failures
            .iter()
            .map(|f| json!({ "row": f.row, "lead_id": f.lead_id, "errors": f.errors }))
            .collect(),
        created_date: Some(Utc::now()),
    };
    if let Err(e) = &outcome {
        log.status = "failed".to_string();
        log.errors.push(json!({ "batch": e.to_string() }));
    }
    if let Err(e) = db.bulk_uploads().insert(log).await {
        warn!(upload = %report.upload_id, error = %e, "Could not write upload log");
    }

    match outcome {
        Ok(batch) => {
            info!(
                upload = %report.upload_id,
                kind = %report.upload_type,
                success = report.success,
                failed = report.failed,
                writes = batch.writes,
                "Bulk upload complete"
            );
            Ok(report)
        }
        Err(e) => {
            error!(upload = %report.upload_id, error = %e, "Bulk upload write failed");
            Err(e.into())
        }
    }
}

/// Most recent uploads of one kind.
pub async fn history(db: &Database, upload_type: &str, limit: usize) -> DbResult<Vec<BulkUploadLog>> {
    let mut logs = db.bulk_uploads().find_by("upload_type", upload_type).await?;
    logs.sort_by(|a, b| b.created_date.cmp(&a.created_date));
    logs.truncate(limit);
    Ok(logs)
}

// =============================================================================
// Orders
// =============================================================================

pub async fn validate_orders(db: &Database, rows: &[OrderRow]) -> DbResult<(Vec<RowReport>, RowSummary)> {
    let mut reports: Vec<RowReport> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| validate_order_row(row, i))
        .collect();
    let leads = load_leads(db, rows.iter().map(|r| r.lead_id.as_deref())).await?;
    check_leads(&mut reports, &leads);

    let summary = RowSummary::from_reports(&reports);
    Ok((reports, summary))
}

/// Creates one order and one invoice per valid row and marks each lead paid.
pub async fn upload_orders(
    db: &Database,
    rows: &[OrderRow],
    uploader: Uploader<'_>,
) -> ApiResult<UploadReport> {
    let now = Utc::now();
    let mut leads = load_leads(db, rows.iter().map(|r| r.lead_id.as_deref())).await?;
    let inventory_dates = inventory_event_dates(db).await?;

    let mut report = UploadReport::new(ORDER_UPLOAD, rows.len());
    let mut ops = Vec::new();
    let mut paid_leads = BTreeSet::new();

    for (index, row) in rows.iter().enumerate() {
        let mut check = validate_order_row(row, index);
        let lead = check.lead_id.as_deref().and_then(|id| leads.get(id));
        if check.is_valid() && lead.is_none() {
            check.reject(LEAD_NOT_FOUND);
        }
        let Some(lead) = lead.filter(|_| check.is_valid()) else {
            report.fail(check);
            continue;
        };

        let ctx = UploadContext {
            lead,
            uploaded_by: uploader.name,
            uploaded_by_email: Some(uploader.email),
            fallback_event_date: fallback_event_date(lead, row.event_name.as_deref(), &inventory_dates),
            now,
            index,
        };
        match build_bulk_order(row, &ctx) {
            Ok(BulkOrder { order, invoice }) => {
                ops.push(WriteOp::set(collections::ORDERS, &order.id, &order)?);
                ops.push(WriteOp::set(collections::INVOICES, &invoice.id, &invoice)?);
                paid_leads.insert(lead.id.clone());
                report.total_amount += order.final_amount.unwrap_or(0.0);
                report.orders_created += 1;
                report.success += 1;
            }
            Err(e) => {
                check.reject(e.to_string());
                report.fail(check);
            }
        }
    }

    for id in &paid_leads {
        if let Some(lead) = leads.get_mut(id) {
            mark_payment_received(lead, uploader.name, "Order created via bulk upload", now);
            ops.push(WriteOp::set(collections::LEADS, &lead.id, &*lead)?);
        }
    }

    finish(db, ops, report, uploader.email).await
}

// =============================================================================
// Payments
// =============================================================================

pub async fn validate_payments(
    db: &Database,
    rows: &[PaymentRow],
) -> DbResult<(Vec<RowReport>, RowSummary)> {
    let mut reports: Vec<RowReport> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| validate_payment_row(row, i))
        .collect();
    let leads = load_leads(db, rows.iter().map(|r| r.lead_id.as_deref())).await?;
    check_leads(&mut reports, &leads);

    let summary = RowSummary::from_reports(&reports);
    Ok((reports, summary))
}

/// Records one payment per valid row against the lead's order, creating the
/// order when the lead has none.
pub async fn upload_payments(
    db: &Database,
    rows: &[PaymentRow],
    uploader: Uploader<'_>,
) -> ApiResult<UploadReport> {
    let now = Utc::now();
    let mut leads = load_leads(db, rows.iter().map(|r| r.lead_id.as_deref())).await?;

    let mut report = UploadReport::new(PAYMENT_UPLOAD, rows.len());
    let mut ops = Vec::new();
    let mut paid_leads = BTreeSet::new();
    // lead id → order as left by earlier rows of this upload
    let mut orders_by_lead: HashMap<String, Order> = HashMap::new();
    let mut created_orders: BTreeSet<String> = BTreeSet::new();

    for (index, row) in rows.iter().enumerate() {
        let mut check = validate_payment_row(row, index);
        let lead = check.lead_id.as_deref().and_then(|id| leads.get(id));
        if check.is_valid() && lead.is_none() {
            check.reject(LEAD_NOT_FOUND);
        }
        let Some(lead) = lead.filter(|_| check.is_valid()) else {
            report.fail(check);
            continue;
        };

        let existing = match orders_by_lead.get(&lead.id) {
            Some(order) => Some(order.clone()),
            None => db.orders().latest_for_lead(&lead.id).await?,
        };
        let ctx = UploadContext {
            lead,
            uploaded_by: uploader.name,
            uploaded_by_email: Some(uploader.email),
            fallback_event_date: None,
            now,
            index,
        };
        match build_bulk_payment(row, existing, &ctx) {
            Ok(BulkPayment {
                mut payment,
                order,
                order_created,
                activity,
            }) => {
                payment.bulk_upload_id = Some(report.upload_id.clone());
                ops.push(WriteOp::set(collections::PAYMENTS, &payment.id, &payment)?);
                ops.push(WriteOp::set(collections::ACTIVITY_LOGS, &activity.id, &activity)?);
                if order_created {
                    created_orders.insert(order.id.clone());
                }
                report.total_amount += payment.amount.unwrap_or(0.0);
                report.success += 1;
                paid_leads.insert(lead.id.clone());
                orders_by_lead.insert(lead.id.clone(), order);
            }
            Err(e) => {
                check.reject(e.to_string());
                report.fail(check);
            }
        }
    }

    // Each touched order is written once, in its final state.
    for order in orders_by_lead.values() {
        if created_orders.contains(&order.id) {
            report.orders_created += 1;
        } else {
            report.orders_updated += 1;
        }
        ops.push(WriteOp::set(collections::ORDERS, &order.id, order)?);
    }
    for id in &paid_leads {
        if let Some(lead) = leads.get_mut(id) {
            mark_payment_received(lead, uploader.name, "Payment recorded via bulk upload", now);
            ops.push(WriteOp::set(collections::LEADS, &lead.id, &*lead)?);
        }
    }

    finish(db, ops, report, uploader.email).await
}

// =============================================================================
// Allocations
// =============================================================================

async fn load_book(db: &Database) -> DbResult<AllocationBook> {
    Ok(AllocationBook::new(
        db.inventory().list().await?,
        db.leads().list().await?,
        db.orders().list().await?,
        &db.allocations().list().await?,
    ))
}

pub async fn preview_allocations(
    db: &Database,
    rows: &[AllocationRow],
) -> DbResult<(Vec<AllocationPreview>, AllocationSummary)> {
    let book = load_book(db).await?;
    let previews: Vec<AllocationPreview> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| preview_allocation(&book, row, i))
        .collect();
    let summary = AllocationSummary::from_previews(&previews);
    Ok((previews, summary))
}

/// Creates an allocation per valid row. Rows are applied in order, so later
/// rows see the stock left by earlier ones.
pub async fn process_allocations(
    db: &Database,
    rows: &[AllocationRow],
    created_by: &str,
) -> ApiResult<UploadReport> {
    let now = Utc::now();
    let mut book = load_book(db).await?;
    let mut report = UploadReport::new(ALLOCATION_UPLOAD, rows.len());
    let mut ops = Vec::new();
    let mut touched_inventory = BTreeSet::new();
    let mut touched_orders: BTreeMap<String, Order> = BTreeMap::new();

    for (index, row) in rows.iter().enumerate() {
        let mut preview = preview_allocation(&book, row, index);
        if !preview.is_valid() {
            report.fail(preview);
            continue;
        }
        match process_allocation(&mut book, &preview, created_by, now) {
            Ok(write) => {
                ops.push(WriteOp::set(
                    collections::ALLOCATIONS,
                    &write.allocation.id,
                    &write.allocation,
                )?);
                report.tickets_allocated += write.allocation.tickets_allocated;
                report.success += 1;
                touched_inventory.insert(write.inventory_id);
                if let Some(order) = write.order {
                    touched_orders.insert(order.id.clone(), order);
                }
            }
            Err(e) => {
                preview.errors.push(e.to_string());
                report.fail(preview);
            }
        }
    }

    for inventory in book.inventory().iter().filter(|i| touched_inventory.contains(&i.id)) {
        ops.push(WriteOp::set(collections::INVENTORY, &inventory.id, inventory)?);
    }
    for order in touched_orders.values() {
        report.orders_updated += 1;
        ops.push(WriteOp::set(collections::ORDERS, &order.id, order)?);
    }

    finish(db, ops, report, created_by).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use salesdesk_core::{Inventory, LeadStatus};
    use salesdesk_db::DbConfig;

    const UPLOADER: Uploader<'static> = Uploader {
        name: "Priya",
        email: "priya@example.com",
    };

    async fn db_with_lead() -> (Database, Lead) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let lead = db
            .leads()
            .insert(Lead {
                name: Some("Asha".into()),
                phone: Some("9876543210".into()),
                email: Some("asha@example.com".into()),
                status: LeadStatus::Converted,
                ..Default::default()
            })
            .await
            .unwrap();
        (db, lead)
    }

    fn order_row(lead_id: &str) -> OrderRow {
        OrderRow {
            lead_id: Some(lead_id.into()),
            client_name: Some("Asha".into()),
            event_name: Some("IPL Final".into()),
            rate: Some("10000".into()),
            quantity: Some("2".into()),
            ..Default::default()
        }
    }

    fn payment_row(lead_id: &str, amount: &str) -> PaymentRow {
        PaymentRow {
            lead_id: Some(lead_id.into()),
            payment_amount: Some(amount.into()),
            payment_date: Some("2025-07-21".into()),
            payment_mode: Some("UPI".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_unknown_lead_is_invalid() {
        let (db, lead) = db_with_lead().await;
        let rows = vec![order_row(&lead.id), order_row("missing")];

        let (reports, summary) = validate_orders(&db, &rows).await.unwrap();
        assert!(reports[0].is_valid());
        assert_eq!(reports[1].row, 3);
        assert_eq!(reports[1].errors, vec![LEAD_NOT_FOUND.to_string()]);
        assert_eq!(summary.invalid, 1);
    }

    #[tokio::test]
    async fn test_order_upload_writes_one_order_and_invoice_per_row() {
        let (db, lead) = db_with_lead().await;
        let rows = vec![order_row(&lead.id), order_row("missing")];

        let report = upload_orders(&db, &rows, UPLOADER).await.unwrap();
        assert_eq!(report.success, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].errors, vec![LEAD_NOT_FOUND.to_string()]);

        let orders = db.orders().for_lead(&lead.id).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(db.invoices().for_order(&orders[0].id).await.unwrap().len(), 1);

        let stored = db.leads().get_required(&lead.id).await.unwrap();
        assert_eq!(stored.status, LeadStatus::PaymentReceived);

        let logs = history(&db, ORDER_UPLOAD, 10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, "partial");
    }

    #[tokio::test]
    async fn test_payments_share_one_order_per_lead() {
        let (db, lead) = db_with_lead().await;
        let rows = vec![
            payment_row(&lead.id, "5000"),
            payment_row(&lead.id, "2500"),
            payment_row("missing", "100"),
        ];

        let report = upload_payments(&db, &rows, UPLOADER).await.unwrap();
        assert_eq!(report.success, 2);
        assert_eq!(report.orders_created, 1);

        let payments = db.payments().for_lead(&lead.id).await.unwrap();
        assert_eq!(payments.len(), 2);
        assert!(payments
            .iter()
            .all(|p| p.bulk_upload_id.as_deref() == Some(report.upload_id.as_str())));
        assert_eq!(db.orders().for_lead(&lead.id).await.unwrap().len(), 1);
        assert_eq!(db.activity_logs().for_lead(&lead.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_payment_updates_existing_order() {
        let (db, lead) = db_with_lead().await;
        db.orders()
            .insert(Order {
                lead_id: Some(lead.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();

        let report = upload_payments(&db, &[payment_row(&lead.id, "800")], UPLOADER)
            .await
            .unwrap();
        assert_eq!(report.orders_updated, 1);
        assert_eq!(report.orders_created, 0);

        let orders = db.orders().for_lead(&lead.id).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].payment_status.as_deref(), Some("paid"));
    }

    #[tokio::test]
    async fn test_allocation_rows_consume_stock_in_order() {
        let (db, _lead) = db_with_lead().await;
        let inventory = db
            .inventory()
            .insert(Inventory {
                event_name: "IPL Final".into(),
                available_tickets: 3,
                total_tickets: 3,
                buying_price: Some(1000.0),
                ..Default::default()
            })
            .await
            .unwrap();
        let row = |tickets: &str| AllocationRow {
            event_name: Some("IPL Final".into()),
            lead_identifier: Some("+91 98765 43210".into()),
            tickets_to_allocate: Some(tickets.into()),
            ..Default::default()
        };

        let (previews, summary) = preview_allocations(&db, &[row("2"), row("2")]).await.unwrap();
        assert!(previews.iter().all(AllocationPreview::is_valid));
        assert!(summary.can_proceed);

        let report = process_allocations(&db, &[row("2"), row("2")], "ops@example.com")
            .await
            .unwrap();
        assert_eq!(report.success, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.tickets_allocated, 2);

        let stored = db.inventory().get_required(&inventory.id).await.unwrap();
        assert_eq!(stored.available_tickets, 1);
        assert_eq!(db.allocations().count().await.unwrap(), 1);
    }
}
