//! # Bulk Uploads
//!
//! Row-level rules for the three CSV bulk uploads: orders, payments and
//! ticket allocations.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       CSV Bulk Upload                                   │
//! │                                                                         │
//! │  text/csv body ──► csv reader (apps/api) ──► OrderRow / PaymentRow /   │
//! │                                              AllocationRow              │
//! │                                                   │                     │
//! │                                                   ▼                     │
//! │                     validate_*_row ──► RowReport { row, status,        │
//! │                     (THIS MODULE)                  errors, warnings }   │
//! │                                                   │                     │
//! │                                                   ▼ valid rows only     │
//! │                     build_* ──► Order / Invoice / Payment / Allocation │
//! │                                                   │                     │
//! │                                                   ▼                     │
//! │                     salesdesk-db batch writes (≤ 500 per commit)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Row numbers are spreadsheet rows: the header is row 1, so the first data
//! row is row 2. A bad row never fails the upload; its messages are reported
//! and the row is skipped.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::dates::{ist_date_string, parse_sheet_date, to_iso_millis};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::status::{CustomerType, EventLocation, LeadStatus, OrderStatus, PaymentMode, SaleCategory};
use crate::tax::TaxInput;
use crate::types::{ActivityLog, Allocation, Inventory, Invoice, Lead, Order, Payment};
use crate::validation::{parse_choice, parse_number, phone_variants, require, validate_at_most, validate_positive};
use crate::{DEFAULT_GST_RATE, DEFAULT_TCS_RATE};

/// Message reported for rows whose lead id matches no lead.
pub const LEAD_NOT_FOUND: &str = "Lead not found";

/// Largest per-row rupee amount (rate, service fee, inclusions, advance):
/// 1,000 crore.
pub const MAX_ROW_AMOUNT: f64 = 1e10;

/// Largest ticket quantity on one order row.
pub const MAX_ROW_QUANTITY: i64 = 10_000;

const CUSTOMER_TYPES: [&str; 2] = ["indian", "foreign"];
const EVENT_LOCATIONS: [&str; 2] = ["india", "outside_india"];
const SALE_CATEGORIES: [&str; 2] = ["Corporate", "Retail"];
const PAYMENT_METHODS: [&str; 7] = [
    "Bank Transfer",
    "UPI",
    "Credit Card",
    "Debit Card",
    "Cash",
    "Cheque",
    "Online",
];

/// Spreadsheet row number for a zero-based data row index.
pub const fn sheet_row(index: usize) -> usize {
    index + 2
}

// =============================================================================
// Row Reports
// =============================================================================

/// Outcome of validating one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Valid,
    /// Order and payment uploads
    Invalid,
    /// Allocation uploads
    Error,
}

/// Per-row validation result returned by the `validate` endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowReport {
    pub row: usize,
    pub lead_id: Option<String>,
    pub status: RowStatus,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl RowReport {
    pub fn new(index: usize, lead_id: Option<&str>) -> Self {
        RowReport {
            row: sheet_row(index),
            lead_id: lead_id.map(str::trim).filter(|s| !s.is_empty()).map(String::from),
            status: RowStatus::Valid,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Records an error and marks the row invalid.
    pub fn reject(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.status = RowStatus::Invalid;
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn check<T>(&mut self, result: Result<T, ValidationError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.reject(err.to_string());
                None
            }
        }
    }
}

/// Counts over a set of row reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub with_warnings: usize,
}

impl RowSummary {
    pub fn from_reports(reports: &[RowReport]) -> Self {
        let valid = reports.iter().filter(|r| r.is_valid()).count();
        RowSummary {
            total: reports.len(),
            valid,
            invalid: reports.len() - valid,
            with_warnings: reports.iter().filter(|r| !r.warnings.is_empty()).count(),
        }
    }
}

fn text(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn is_true(value: &Option<String>) -> bool {
    text(value).map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Bulk Orders
// =============================================================================

/// Column headers of the bulk order template.
pub const ORDER_TEMPLATE_HEADERS: [&str; 25] = [
    "lead_id",
    "client_name",
    "client_email",
    "client_phone",
    "event_name",
    "event_date",
    "event_description",
    "rate",
    "quantity",
    "service_fee_amount",
    "advance_amount",
    "inclusions_cost",
    "inclusions_description",
    "gst_rate",
    "tcs_rate",
    "customer_type",
    "event_location",
    "is_outside_india",
    "payment_currency",
    "exchange_rate",
    "category_of_sale",
    "type_of_sale",
    "state_location",
    "payment_method",
    "notes",
];

/// Example row shipped with the bulk order template.
pub const ORDER_TEMPLATE_SAMPLE: [&str; 25] = [
    "LEAD_ID_HERE",
    "Rahul Mehta",
    "rahul@example.com",
    "9876543210",
    "India vs Australia - Test Match",
    "2025-12-26",
    "Premium stand tickets",
    "15000",
    "2",
    "3000",
    "10000",
    "0",
    "",
    "18",
    "5",
    "indian",
    "india",
    "false",
    "INR",
    "1",
    "Retail",
    "Service Fee",
    "Haryana",
    "Bank Transfer",
    "",
];

/// One row of a bulk order upload. Every cell is optional text; the
/// validators decide what is required.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrderRow {
    pub lead_id: Option<String>,
    pub lead_name: Option<String>,
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub event_name: Option<String>,
    pub event_date: Option<String>,
    pub event_description: Option<String>,
    pub rate: Option<String>,
    pub quantity: Option<String>,
    pub service_fee_amount: Option<String>,
    pub advance_amount: Option<String>,
    pub inclusions_cost: Option<String>,
    pub inclusions_description: Option<String>,
    pub gst_rate: Option<String>,
    pub tcs_rate: Option<String>,
    pub customer_type: Option<String>,
    pub event_location: Option<String>,
    pub is_outside_india: Option<String>,
    pub payment_currency: Option<String>,
    pub exchange_rate: Option<String>,
    pub category_of_sale: Option<String>,
    pub type_of_sale: Option<String>,
    pub state_location: Option<String>,
    pub gstin: Option<String>,
    pub legal_name: Option<String>,
    pub registered_address: Option<String>,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub payment_date: Option<String>,
    pub notes: Option<String>,
}

/// The typed values of a valid order row.
#[derive(Debug, Clone)]
struct OrderFields {
    rate: f64,
    quantity: i64,
    service_fee: f64,
    advance: f64,
    inclusions: f64,
    gst_rate: f64,
    tcs_rate: f64,
    exchange_rate: f64,
    customer_type: CustomerType,
    event_location: EventLocation,
    category: SaleCategory,
    payment_method: PaymentMode,
}

impl OrderRow {
    /// Checks every field and either returns the typed values or fills the
    /// report with every problem found.
    fn fields(&self, report: &mut RowReport) -> Option<OrderFields> {
        report.check(require("Lead ID", text(&self.lead_id)));
        report.check(require("Client name", text(&self.client_name)));
        report.check(require("Event name", text(&self.event_name)));
        let rate_given = report.check(require("Rate", text(&self.rate))).is_some();
        let quantity_given = report.check(require("Quantity", text(&self.quantity))).is_some();

        let rate = if rate_given {
            report.check(parse_number("Rate", text(&self.rate))).flatten()
        } else {
            None
        };
        let quantity = if quantity_given {
            report.check(
                text(&self.quantity)
                    .and_then(|q| q.replace(',', "").parse::<i64>().ok())
                    .ok_or_else(|| ValidationError::NotANumber {
                        field: "Quantity".to_string(),
                    }),
            )
        } else {
            None
        };
        let quantity = quantity.filter(|q| {
            let in_range = validate_positive("Quantity", *q as f64)
                .and_then(|_| validate_at_most("Quantity", *q as f64, MAX_ROW_QUANTITY as f64));
            report.check(in_range).is_some()
        });
        let service_fee = report.check(parse_number("Service fee", text(&self.service_fee_amount)));
        let advance = report.check(parse_number("Advance amount", text(&self.advance_amount)));
        let inclusions = report.check(parse_number("Inclusions cost", text(&self.inclusions_cost)));
        for (field, amount) in [
            ("Rate", rate),
            ("Service fee", service_fee.flatten()),
            ("Advance amount", advance.flatten()),
            ("Inclusions cost", inclusions.flatten()),
        ] {
            if let Some(amount) = amount {
                report.check(validate_at_most(field, amount.abs(), MAX_ROW_AMOUNT));
            }
        }
        let gst_rate = report.check(parse_number("GST rate", text(&self.gst_rate)));
        let tcs_rate = report.check(parse_number("TCS rate", text(&self.tcs_rate)));
        let exchange_rate = report.check(parse_number("Exchange rate", text(&self.exchange_rate)));

        let customer_type = report.check(parse_choice::<CustomerType>(
            "Customer type",
            text(&self.customer_type),
            &CUSTOMER_TYPES,
        ));
        let event_location = report.check(parse_choice::<EventLocation>(
            "Event location",
            text(&self.event_location),
            &EVENT_LOCATIONS,
        ));
        let payment_method = report.check(parse_choice::<PaymentMode>(
            "Payment method",
            text(&self.payment_method),
            &PAYMENT_METHODS,
        ));
        let category = report.check(parse_choice::<SaleCategory>(
            "Category of sale",
            text(&self.category_of_sale),
            &SALE_CATEGORIES,
        ));

        if let Some(email) = text(&self.client_email) {
            if crate::validation::validate_email(email).is_err() {
                report.warn(format!("Client email '{email}' does not look valid"));
            }
        }
        if let Some(date) = text(&self.event_date) {
            if parse_sheet_date(date).is_none() {
                report.warn(format!(
                    "Event date '{date}' not recognised - lead or inventory date will be used"
                ));
            }
        }

        if !report.is_valid() {
            return None;
        }

        let event_location = if is_true(&self.is_outside_india) {
            EventLocation::OutsideIndia
        } else {
            event_location.flatten().unwrap_or_default()
        };

        Some(OrderFields {
            rate: rate?,
            quantity: quantity?,
            service_fee: service_fee.flatten().unwrap_or(0.0),
            advance: advance.flatten().unwrap_or(0.0),
            inclusions: inclusions.flatten().unwrap_or(0.0),
            gst_rate: gst_rate.flatten().filter(|r| *r > 0.0).unwrap_or(DEFAULT_GST_RATE),
            tcs_rate: tcs_rate.flatten().filter(|r| *r > 0.0).unwrap_or(DEFAULT_TCS_RATE),
            exchange_rate: exchange_rate.flatten().filter(|r| *r > 0.0).unwrap_or(1.0),
            customer_type: customer_type.flatten().unwrap_or_default(),
            event_location,
            category: category.flatten().unwrap_or(SaleCategory::Corporate),
            payment_method: payment_method.flatten().unwrap_or(PaymentMode::BankTransfer),
        })
    }

    fn currency(&self) -> String {
        text(&self.payment_currency).unwrap_or("INR").to_uppercase()
    }

    fn type_of_sale(&self) -> &str {
        text(&self.type_of_sale).unwrap_or(crate::tax::SERVICE_FEE_SALE)
    }
}

/// Validates one bulk order row (field rules only; the lead lookup is done
/// by the caller, which rejects with [`LEAD_NOT_FOUND`]).
///
/// ## Example
/// ```rust
/// use salesdesk_core::bulk::{validate_order_row, OrderRow, RowStatus};
///
/// let row = OrderRow {
///     lead_id: Some("L1".into()),
///     client_name: Some("Rahul".into()),
///     event_name: Some("IPL Final".into()),
///     rate: Some("abc".into()),
///     quantity: Some("2".into()),
///     ..Default::default()
/// };
/// let report = validate_order_row(&row, 0);
/// assert_eq!(report.row, 2);
/// assert_eq!(report.status, RowStatus::Invalid);
/// assert_eq!(report.errors, vec!["Rate must be a valid number"]);
/// ```
pub fn validate_order_row(row: &OrderRow, index: usize) -> RowReport {
    let mut report = RowReport::new(index, row.lead_id.as_deref());
    row.fields(&mut report);
    report
}

/// Who is uploading and what else is known about the row's lead.
#[derive(Debug, Clone)]
pub struct UploadContext<'a> {
    pub lead: &'a Lead,
    pub uploaded_by: &'a str,
    pub uploaded_by_email: Option<&'a str>,
    /// Event date to fall back on when the row has none (lead or inventory).
    pub fallback_event_date: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
    pub index: usize,
}

/// Order and invoice produced from one bulk order row.
#[derive(Debug, Clone)]
pub struct BulkOrder {
    pub order: Order,
    pub invoice: Invoice,
}

/// Builds the order (pending approval, paid, GST/TCS computed) and its
/// invoice from a row.
pub fn build_bulk_order(row: &OrderRow, ctx: &UploadContext<'_>) -> CoreResult<BulkOrder> {
    let mut report = RowReport::new(ctx.index, row.lead_id.as_deref());
    let Some(f) = row.fields(&mut report) else {
        let first = report.errors.into_iter().next().unwrap_or_default();
        return Err(ValidationError::InvalidFormat {
            field: format!("row {}", sheet_row(ctx.index)),
            reason: first,
        }
        .into());
    };

    let currency = row.currency();
    let invoice_total = Money::from_rupees(f.rate) * f.quantity;
    let service_fee = Money::from_rupees(f.service_fee);
    let tax = TaxInput {
        invoice_total,
        service_fee,
        gst_rate: f.gst_rate,
        tcs_rate: f.tcs_rate,
        customer_type: f.customer_type,
        event_location: f.event_location,
        category: f.category,
        type_of_sale: row.type_of_sale().to_string(),
        state: text(&row.state_location).map(String::from),
        inr_payment: currency == "INR",
    }
    .compute();

    let stamp = ctx.now.timestamp_millis();
    let sheet = sheet_row(ctx.index);
    let order_number = format!("ORD-{stamp}-{sheet}");
    let invoice_number = format!("INV-{stamp}-{sheet}");
    let lead = ctx.lead;

    let client_name = text(&row.client_name).map(String::from);
    let client_email = text(&row.client_email).map(String::from).or_else(|| lead.email.clone());
    let client_phone = text(&row.client_phone).map(String::from).or_else(|| lead.phone.clone());
    let event_name = text(&row.event_name)
        .map(String::from)
        .or_else(|| lead.event().map(String::from));
    let event_date = text(&row.event_date)
        .and_then(parse_sheet_date)
        .or(ctx.fallback_event_date);
    let description = text(&row.event_description).or(event_name.as_deref()).unwrap_or_default();
    let final_amount = tax.final_amount.rupees();

    let mut extra = serde_json::Map::new();
    extra.insert("lead_name".into(), json!(text(&row.lead_name).or(lead.name.as_deref()).or(client_name.as_deref())));
    extra.insert("quantity".into(), json!(f.quantity));
    extra.insert("rate".into(), json!(f.rate));
    extra.insert(
        "invoice_items".into(),
        json!([{
            "description": description,
            "quantity": f.quantity,
            "rate": f.rate,
            "amount": invoice_total.rupees(),
        }]),
    );
    extra.insert("inclusions_description".into(), json!(text(&row.inclusions_description).unwrap_or_default()));
    extra.insert("gstin".into(), json!(text(&row.gstin).unwrap_or_default()));
    extra.insert("legal_name".into(), json!(text(&row.legal_name).or(client_name.as_deref())));
    extra.insert("registered_address".into(), json!(text(&row.registered_address).unwrap_or_default()));
    extra.insert("transaction_id".into(), json!(text(&row.transaction_id).unwrap_or_default()));
    extra.insert(
        "payment_date".into(),
        json!(text(&row.payment_date)
            .and_then(parse_sheet_date)
            .map(|d| ist_date_string(&d))
            .unwrap_or_else(|| ist_date_string(&ctx.now))),
    );
    extra.insert("balance_due".into(), json!((tax.final_amount - Money::from_rupees(f.advance)).rupees()));
    extra.insert("tcs_applicable".into(), json!(tax.tcs_applicable));
    extra.insert("gst_applicable".into(), json!(tax.gst_applicable));
    extra.insert("taxable_amount".into(), json!(tax.taxable_amount.rupees()));
    extra.insert("notes".into(), json!(text(&row.notes).unwrap_or_default()));
    extra.insert("created_via".into(), json!("bulk_upload"));
    extra.insert("approval_status".into(), json!("pending"));
    if currency != "INR" {
        extra.insert("final_amount_inr".into(), json!(tax.final_amount.convert(f.exchange_rate).rupees()));
        extra.insert("advance_amount_inr".into(), json!(Money::from_rupees(f.advance).convert(f.exchange_rate).rupees()));
    }

    let order = Order {
        id: new_id(),
        order_number: Some(order_number.clone()),
        lead_id: Some(lead.id.clone()),
        client_name: client_name.clone(),
        client_email,
        client_phone,
        event_name: event_name.clone(),
        event_date,
        status: OrderStatus::PendingApproval,
        payment_currency: Some(currency),
        exchange_rate: Some(f.exchange_rate),
        base_amount: Some(tax.total_before_tax.rupees()),
        total_amount: Some(final_amount),
        invoice_total: Some(invoice_total.rupees()),
        service_fee_amount: Some(service_fee.rupees()),
        gst_rate: Some(f.gst_rate),
        gst_amount: Some(tax.gst.rupees()),
        cgst_amount: Some(tax.cgst.rupees()),
        sgst_amount: Some(tax.sgst.rupees()),
        igst_amount: Some(tax.igst.rupees()),
        tcs_rate: Some(tax.tcs_rate),
        tcs_amount: Some(tax.tcs.rupees()),
        final_amount: Some(final_amount),
        advance_amount: Some(f.advance),
        total_paid: None,
        buying_price_inclusions: Some(f.inclusions),
        customer_type: Some(f.customer_type),
        event_location: Some(f.event_location),
        category_of_sale: Some(f.category),
        type_of_sale: Some(row.type_of_sale().to_string()),
        client_state: text(&row.state_location).map(String::from),
        payment_method: Some(f.payment_method.to_string()),
        payment_status: Some("paid".to_string()),
        invoice_number: Some(invoice_number.clone()),
        sales_person: Some(ctx.uploaded_by.to_string()),
        sales_person_email: ctx.uploaded_by_email.map(String::from),
        allocation_ids: Vec::new(),
        approved_by: None,
        approval_date: None,
        approval_notes: None,
        created_by: Some(ctx.uploaded_by.to_string()),
        created_date: Some(ctx.now),
        updated_date: Some(ctx.now),
        extra,
    };

    let invoice = Invoice {
        id: new_id(),
        invoice_number,
        order_id: order.id.clone(),
        lead_id: Some(lead.id.clone()),
        client_name,
        event_name,
        invoice_total: Some(invoice_total.rupees()),
        service_fee_amount: Some(service_fee.rupees()),
        gst_amount: Some(tax.gst.rupees()),
        tcs_amount: Some(tax.tcs.rupees()),
        final_amount: Some(final_amount),
        status: Some("generated".to_string()),
        created_by: Some(ctx.uploaded_by.to_string()),
        created_date: Some(ctx.now),
        extra: [
            ("order_number".to_string(), json!(order_number)),
            ("invoice_date".to_string(), json!(ist_date_string(&ctx.now))),
            ("cgst".to_string(), json!(tax.cgst.rupees())),
            ("sgst".to_string(), json!(tax.sgst.rupees())),
            ("igst".to_string(), json!(tax.igst.rupees())),
        ]
        .into_iter()
        .collect(),
    };

    Ok(BulkOrder { order, invoice })
}

/// Marks a lead as paid after a bulk upload created or updated its order.
pub fn mark_payment_received(lead: &mut Lead, uploaded_by: &str, note: &str, now: DateTime<Utc>) {
    lead.status = LeadStatus::PaymentReceived;
    lead.updated_date = Some(now);
    lead.extra.insert("payment_status".into(), json!("paid"));
    lead.extra.insert(
        "journey".into(),
        json!({
            "payment_received": {
                "timestamp": to_iso_millis(&now),
                "updated_by": uploaded_by,
                "notes": note,
            }
        }),
    );
}

// =============================================================================
// Bulk Payments
// =============================================================================

/// Column headers of the bulk payment template.
pub const PAYMENT_TEMPLATE_HEADERS: [&str; 17] = [
    "lead_id",
    "lead_name",
    "lead_email",
    "lead_phone",
    "event_name",
    "payment_date",
    "payment_amount",
    "payment_mode",
    "bank_name",
    "transaction_id",
    "invoice_numbers",
    "invoice_amounts",
    "taxes",
    "discount",
    "processing_fee",
    "total_amount",
    "notes",
];

/// Example row shipped with the bulk payment template.
pub const PAYMENT_TEMPLATE_SAMPLE: [&str; 17] = [
    "LEAD_ID_HERE",
    "Priya Sharma",
    "priya@example.com",
    "9876543210",
    "IPL Final 2025",
    "2025-05-20",
    "50000",
    "Bank Transfer",
    "HDFC Bank",
    "TXN123456",
    "INV-001,INV-002",
    "30000,20000",
    "9000",
    "0",
    "0",
    "59000",
    "",
];

/// One row of a bulk payment upload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaymentRow {
    pub lead_id: Option<String>,
    pub lead_name: Option<String>,
    pub lead_email: Option<String>,
    pub lead_phone: Option<String>,
    pub event_name: Option<String>,
    pub event_date: Option<String>,
    pub payment_date: Option<String>,
    pub payment_amount: Option<String>,
    pub payment_mode: Option<String>,
    pub bank_name: Option<String>,
    pub transaction_id: Option<String>,
    pub cheque_number: Option<String>,
    pub invoice_numbers: Option<String>,
    pub invoice_amounts: Option<String>,
    pub taxes: Option<String>,
    pub discount: Option<String>,
    pub processing_fee: Option<String>,
    pub total_amount: Option<String>,
    pub payment_status: Option<String>,
    pub collected_by: Option<String>,
    pub branch: Option<String>,
    pub notes: Option<String>,
}

fn split_list(value: &Option<String>) -> Vec<&str> {
    text(value)
        .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

fn number_list(field: &str, value: &Option<String>) -> Result<Vec<f64>, ValidationError> {
    split_list(value)
        .into_iter()
        .map(|item| parse_number(field, Some(item)).map(|n| n.unwrap_or(0.0)))
        .collect()
}

/// The typed values of a valid payment row.
#[derive(Debug, Clone)]
struct PaymentFields {
    amount: f64,
    total_amount: f64,
    payment_date: DateTime<Utc>,
    mode: String,
    invoice_numbers: Vec<String>,
    invoice_amounts: Vec<f64>,
    taxes: Vec<f64>,
    discount: f64,
    processing_fee: f64,
}

impl PaymentRow {
    fn fields(&self, report: &mut RowReport) -> Option<PaymentFields> {
        report.check(require("Lead ID", text(&self.lead_id)));

        let amount = parse_number("Payment amount", text(&self.payment_amount))
            .ok()
            .flatten()
            .filter(|a| *a > 0.0);
        if amount.is_none() {
            report.reject("Valid payment amount is required");
        }

        let payment_date = match text(&self.payment_date) {
            None => {
                report.reject("Payment date is required");
                None
            }
            Some(raw) => {
                let parsed = parse_sheet_date(raw);
                if parsed.is_none() {
                    report.reject(format!("Payment date '{raw}' is not a valid date"));
                }
                parsed
            }
        };
        let mode = report.check(require("Payment mode", text(&self.payment_mode)));

        let invoice_numbers = split_list(&self.invoice_numbers);
        let invoice_amounts = report.check(number_list("Invoice amount", &self.invoice_amounts));
        if let Some(amounts) = &invoice_amounts {
            if !invoice_numbers.is_empty() && invoice_numbers.len() != amounts.len() {
                report.reject(format!(
                    "Invoice count ({}) doesn't match amount count ({})",
                    invoice_numbers.len(),
                    amounts.len()
                ));
            }
        }
        let taxes = report.check(number_list("Tax", &self.taxes));
        let discount = report.check(parse_number("Discount", text(&self.discount)));
        let processing_fee = report.check(parse_number("Processing fee", text(&self.processing_fee)));
        let total_amount = report.check(parse_number("Total amount", text(&self.total_amount)));

        if !report.is_valid() {
            return None;
        }
        let amount = amount?;
        Some(PaymentFields {
            amount,
            total_amount: total_amount.flatten().unwrap_or(amount),
            payment_date: payment_date?,
            mode: mode?.to_string(),
            invoice_numbers: invoice_numbers.into_iter().map(String::from).collect(),
            invoice_amounts: invoice_amounts?,
            taxes: taxes?,
            discount: discount.flatten().unwrap_or(0.0),
            processing_fee: processing_fee.flatten().unwrap_or(0.0),
        })
    }
}

/// Validates one bulk payment row (field rules only).
pub fn validate_payment_row(row: &PaymentRow, index: usize) -> RowReport {
    let mut report = RowReport::new(index, row.lead_id.as_deref());
    row.fields(&mut report);
    report
}

/// Writes produced by one payment row.
#[derive(Debug, Clone)]
pub struct BulkPayment {
    pub payment: Payment,
    /// The order the payment was booked against, created or updated.
    pub order: Order,
    pub order_created: bool,
    pub activity: ActivityLog,
}

/// Books a payment row against the lead's existing order, or a new order
/// when the lead has none.
pub fn build_bulk_payment(
    row: &PaymentRow,
    existing_order: Option<Order>,
    ctx: &UploadContext<'_>,
) -> CoreResult<BulkPayment> {
    let mut report = RowReport::new(ctx.index, row.lead_id.as_deref());
    let Some(f) = row.fields(&mut report) else {
        let first = report.errors.into_iter().next().unwrap_or_default();
        return Err(ValidationError::InvalidFormat {
            field: format!("row {}", sheet_row(ctx.index)),
            reason: first,
        }
        .into());
    };
    let lead = ctx.lead;
    let lead_name = text(&row.lead_name).map(String::from).or_else(|| lead.name.clone());
    let lead_email = text(&row.lead_email).map(String::from).or_else(|| lead.email.clone());
    let lead_phone = text(&row.lead_phone).map(String::from).or_else(|| lead.phone.clone());
    let event_name = text(&row.event_name)
        .map(String::from)
        .or_else(|| lead.event().map(String::from));
    let total_tax: f64 = f.taxes.iter().sum();

    let details = json!({
        "payment_amount": f.amount,
        "payment_mode": f.mode,
        "payment_date": to_iso_millis(&f.payment_date),
        "transaction_id": text(&row.transaction_id).unwrap_or_default(),
        "invoice_numbers": f.invoice_numbers,
        "invoice_amounts": f.invoice_amounts,
        "total_tax": total_tax,
        "total_amount": f.total_amount,
    });

    let (order, order_created) = match existing_order {
        Some(mut order) => {
            order.payment_status = Some("paid".to_string());
            order.advance_amount = Some(f.amount);
            order.updated_date = Some(ctx.now);
            order.extra.insert("lead_status".into(), json!(LeadStatus::PaymentReceived.as_str()));
            order.extra.insert("payment_details".into(), details);
            order.extra.insert("balance_amount".into(), json!(0.0));
            order.extra.insert("updated_by".into(), json!(ctx.uploaded_by));
            (order, false)
        }
        None => {
            let mut extra = serde_json::Map::new();
            extra.insert("lead_status".into(), json!(LeadStatus::PaymentReceived.as_str()));
            extra.insert("payment_details".into(), details);
            extra.insert("tax_amount".into(), json!(total_tax));
            extra.insert("discount_amount".into(), json!(f.discount));
            extra.insert("processing_fee".into(), json!(f.processing_fee));
            extra.insert("balance_amount".into(), json!(0.0));
            extra.insert("payment_terms".into(), json!("immediate"));
            extra.insert("invoice_numbers".into(), json!(f.invoice_numbers));
            let order = Order {
                id: new_id(),
                lead_id: Some(lead.id.clone()),
                client_name: lead_name.clone(),
                client_email: lead_email.clone(),
                client_phone: lead_phone.clone(),
                event_name: event_name.clone(),
                event_date: text(&row.event_date).and_then(parse_sheet_date),
                payment_currency: Some("INR".to_string()),
                exchange_rate: Some(1.0),
                base_amount: Some(f.amount),
                total_amount: Some(f.total_amount),
                final_amount: Some(f.total_amount),
                advance_amount: Some(f.total_amount),
                payment_method: Some(f.mode.clone()),
                payment_status: Some("paid".to_string()),
                sales_person: lead.assigned_to.clone(),
                created_by: Some(ctx.uploaded_by.to_string()),
                created_date: Some(ctx.now),
                updated_date: Some(ctx.now),
                extra,
                ..Default::default()
            };
            (order, true)
        }
    };

    let mut payment_extra = serde_json::Map::new();
    for (key, value) in [
        ("lead_name", json!(lead_name)),
        ("lead_email", json!(lead_email)),
        ("lead_phone", json!(lead_phone)),
        ("event_name", json!(event_name)),
        ("bank_name", json!(text(&row.bank_name).unwrap_or_default())),
        ("cheque_number", json!(text(&row.cheque_number).unwrap_or_default())),
        ("invoice_amounts", json!(f.invoice_amounts)),
        ("taxes", json!(f.taxes)),
        ("total_tax", json!(total_tax)),
        ("discount", json!(f.discount)),
        ("processing_fee", json!(f.processing_fee)),
        ("total_amount", json!(f.total_amount)),
        ("payment_status", json!(text(&row.payment_status).unwrap_or("Full Payment"))),
        ("collected_by", json!(text(&row.collected_by).unwrap_or(ctx.uploaded_by))),
        ("branch", json!(text(&row.branch).unwrap_or_default())),
        ("uploaded_via", json!("bulk_upload")),
    ] {
        payment_extra.insert(key.to_string(), value);
    }

    let payment = Payment {
        id: new_id(),
        lead_id: lead.id.clone(),
        order_id: Some(order.id.clone()),
        amount: Some(f.amount),
        currency: Some("INR".to_string()),
        payment_date: Some(f.payment_date),
        payment_mode: Some(f.mode.clone()),
        payment_reference: text(&row.transaction_id).map(String::from),
        invoice_numbers: f.invoice_numbers.clone(),
        notes: text(&row.notes).map(String::from),
        bulk_upload_id: None,
        created_by: Some(ctx.uploaded_by.to_string()),
        created_date: Some(ctx.now),
        extra: payment_extra,
    };

    let activity = ActivityLog {
        id: new_id(),
        lead_id: lead.id.clone(),
        activity_type: "payment_received".to_string(),
        description: format!(
            "Payment of {} received via {}",
            Money::from_rupees(f.amount).format_inr(),
            f.mode
        ),
        performed_by: Some(ctx.uploaded_by.to_string()),
        metadata: json!({
            "payment_id": payment.id,
            "order_id": order.id,
            "amount": f.amount,
            "mode": f.mode,
            "transaction_id": text(&row.transaction_id),
        }),
        created_date: Some(ctx.now),
    };

    Ok(BulkPayment {
        payment,
        order,
        order_created,
        activity,
    })
}

// =============================================================================
// Bulk Allocations
// =============================================================================

/// Column headers of the bulk allocation template.
pub const ALLOCATION_TEMPLATE_HEADERS: [&str; 8] = [
    "event_name",
    "lead_identifier",
    "tickets_to_allocate",
    "category_name",
    "stand_section",
    "notes",
    "order_id",
    "price_override",
];

/// Example rows shipped with the bulk allocation template.
pub const ALLOCATION_TEMPLATE_SAMPLES: [[&str; 8]; 2] = [
    [
        "IPL Final 2025",
        "9876543210",
        "2",
        "Premium",
        "North Stand",
        "Client requested aisle seats",
        "",
        "",
    ],
    [
        "IPL Final 2025",
        "client@example.com",
        "4",
        "General",
        "",
        "",
        "",
        "5000",
    ],
];

/// Column headers of the allocation export.
pub const ALLOCATION_EXPORT_HEADERS: [&str; 13] = [
    "allocation_id",
    "event_name",
    "lead_name",
    "lead_id",
    "tickets_allocated",
    "category_name",
    "stand_section",
    "order_ids",
    "notes",
    "created_by",
    "created_date",
    "price_per_ticket",
    "total_value",
];

/// One row of a bulk allocation upload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AllocationRow {
    pub event_name: Option<String>,
    pub lead_identifier: Option<String>,
    pub tickets_to_allocate: Option<String>,
    pub category_name: Option<String>,
    pub stand_section: Option<String>,
    pub notes: Option<String>,
    pub order_id: Option<String>,
    pub price_override: Option<String>,
}

/// Everything the allocation preview reads, loaded once per upload.
///
/// Processing mutates the inventories held here, so later rows of the same
/// upload see the stock left by earlier rows.
#[derive(Debug, Clone, Default)]
pub struct AllocationBook {
    inventory: Vec<Inventory>,
    leads: Vec<Lead>,
    orders: HashMap<String, Order>,
    /// (lead id, inventory id) → tickets already allocated
    allocated: HashMap<(String, String), i64>,
}

impl AllocationBook {
    pub fn new(
        inventory: Vec<Inventory>,
        leads: Vec<Lead>,
        orders: Vec<Order>,
        allocations: &[Allocation],
    ) -> Self {
        let mut allocated: HashMap<(String, String), i64> = HashMap::new();
        for a in allocations {
            if let (Some(lead), Some(inv)) = (&a.lead_id, &a.inventory_id) {
                *allocated.entry((lead.clone(), inv.clone())).or_default() += a.tickets_allocated;
            }
        }
        AllocationBook {
            inventory: inventory.into_iter().filter(|i| !i.is_deleted).collect(),
            leads,
            orders: orders.into_iter().map(|o| (o.id.clone(), o)).collect(),
            allocated,
        }
    }

    fn inventory_index(&self, event_name: &str) -> Option<usize> {
        self.inventory
            .iter()
            .position(|i| i.event_name.trim() == event_name.trim())
    }

    /// Finds a lead by phone (as given, digits only, +91) or email.
    pub fn find_lead(&self, identifier: &str) -> Option<&Lead> {
        let identifier = identifier.trim();
        for variant in phone_variants(identifier) {
            if let Some(lead) = self
                .leads
                .iter()
                .find(|l| l.phone.as_deref().map(str::trim) == Some(variant.as_str()))
            {
                return Some(lead);
            }
        }
        self.leads.iter().find(|l| {
            l.email
                .as_deref()
                .is_some_and(|e| e.trim().eq_ignore_ascii_case(identifier))
        })
    }

    pub fn inventory(&self) -> &[Inventory] {
        &self.inventory
    }

    pub fn order(&self, id: &str) -> Option<&Order> {
        self.orders.get(id)
    }
}

/// Preview of one allocation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPreview {
    pub row: usize,
    pub status: RowStatus,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub event_name: Option<String>,
    pub lead_identifier: Option<String>,
    pub lead_id: Option<String>,
    pub lead_name: Option<String>,
    pub inventory_id: Option<String>,
    pub tickets: i64,
    pub category_name: Option<String>,
    pub stand_section: Option<String>,
    pub order_id: Option<String>,
    pub price_override: Option<f64>,
    pub notes: Option<String>,
    #[serde(skip)]
    category_index: Option<usize>,
    #[serde(skip)]
    order_linked: bool,
}

impl AllocationPreview {
    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.status = RowStatus::Error;
    }

    pub fn is_valid(&self) -> bool {
        self.status == RowStatus::Valid
    }
}

/// Counts shown above the allocation preview table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSummary {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub error_rows: usize,
    pub warning_rows: usize,
    pub total_tickets: i64,
    #[serde(rename = "canProceed")]
    pub can_proceed: bool,
}

impl AllocationSummary {
    pub fn from_previews(previews: &[AllocationPreview]) -> Self {
        let valid: Vec<_> = previews.iter().filter(|p| p.is_valid()).collect();
        AllocationSummary {
            total_rows: previews.len(),
            valid_rows: valid.len(),
            error_rows: previews.len() - valid.len(),
            warning_rows: previews.iter().filter(|p| !p.warnings.is_empty()).count(),
            total_tickets: valid.iter().map(|p| p.tickets).sum(),
            can_proceed: !valid.is_empty(),
        }
    }
}

/// Checks one allocation row against the book.
pub fn preview_allocation(book: &AllocationBook, row: &AllocationRow, index: usize) -> AllocationPreview {
    let mut p = AllocationPreview {
        row: sheet_row(index),
        status: RowStatus::Valid,
        errors: Vec::new(),
        warnings: Vec::new(),
        event_name: text(&row.event_name).map(String::from),
        lead_identifier: text(&row.lead_identifier).map(String::from),
        lead_id: None,
        lead_name: None,
        inventory_id: None,
        tickets: 0,
        category_name: text(&row.category_name).map(String::from),
        stand_section: text(&row.stand_section).map(String::from),
        order_id: text(&row.order_id).map(String::from),
        price_override: None,
        notes: text(&row.notes).map(String::from),
        category_index: None,
        order_linked: false,
    };

    if p.event_name.is_none() {
        p.error("Event name is required");
    }
    if p.lead_identifier.is_none() {
        p.error("Lead identifier (phone/email) is required");
    }
    match text(&row.tickets_to_allocate).and_then(|t| t.parse::<i64>().ok()) {
        Some(n) if n > 0 => p.tickets = n,
        _ => p.error("Valid number of tickets is required"),
    }
    match parse_number("Price override", text(&row.price_override)) {
        Ok(price) => p.price_override = price,
        Err(err) => p.error(err.to_string()),
    }

    let mut inventory = None;
    if let Some(name) = p.event_name.clone() {
        inventory = book.inventory_index(&name).map(|idx| &book.inventory[idx]);
        if inventory.is_none() {
            p.error(format!("Event \"{name}\" not found in inventory"));
        }
    }

    let mut lead = None;
    if let Some(identifier) = p.lead_identifier.clone() {
        lead = book.find_lead(&identifier);
        if lead.is_none() {
            p.error(format!("Lead not found with identifier: {identifier}"));
        }
    }
    if let Some(lead) = lead {
        p.lead_id = Some(lead.id.clone());
        p.lead_name = lead.name.clone();
    }

    if let Some(inv) = inventory {
        p.inventory_id = Some(inv.id.clone());
        let category = p.category_name.clone();
        match (inv.has_categories(), category) {
            (true, Some(name)) => {
                let section = p.stand_section.clone();
                match inv.find_category(&name, section.as_deref()) {
                    Some(idx) => {
                        p.category_index = Some(idx);
                        let available = inv.categories[idx].available_tickets;
                        if p.tickets > 0 && available < p.tickets {
                            p.error(format!(
                                "Not enough tickets available in category. Available: {available}, Requested: {}",
                                p.tickets
                            ));
                        }
                    }
                    None => match section {
                        Some(section) => p.error(format!(
                            "Category \"{name}\" with section \"{section}\" not found for this event"
                        )),
                        None => p.error(format!("Category \"{name}\" not found for this event")),
                    },
                }
            }
            (true, None) => {
                p.warnings.push(
                    "No category specified for categorized inventory - allocation may fail".to_string(),
                );
                check_general_pool(&mut p, inv);
            }
            (false, Some(_)) => {
                p.warnings.push(
                    "Category specified but inventory has no categories - will allocate from general pool"
                        .to_string(),
                );
                check_general_pool(&mut p, inv);
            }
            (false, None) => check_general_pool(&mut p, inv),
        }

        if let Some(lead) = lead {
            let existing = book
                .allocated
                .get(&(lead.id.clone(), inv.id.clone()))
                .copied()
                .unwrap_or(0);
            if existing > 0 {
                p.warnings.push(format!(
                    "Lead already has {existing} tickets allocated for this event"
                ));
            }
        }
    }

    if let Some(order_id) = p.order_id.clone() {
        match book.order(&order_id) {
            Some(order) => {
                let same_lead = match (&order.lead_id, &p.lead_id) {
                    (Some(a), Some(b)) => a == b,
                    _ => true,
                };
                if same_lead {
                    p.order_linked = true;
                } else {
                    p.error(format!("Order \"{order_id}\" belongs to a different lead"));
                }
            }
            None => p.warnings.push(format!(
                "Order \"{order_id}\" not found - will create allocation without order link"
            )),
        }
    }

    p
}

fn check_general_pool(p: &mut AllocationPreview, inv: &Inventory) {
    if p.tickets > 0 && inv.available_tickets < p.tickets {
        p.error(format!(
            "Not enough tickets available. Available: {}, Requested: {}",
            inv.available_tickets, p.tickets
        ));
    }
}

/// Writes produced by one processed allocation row.
#[derive(Debug, Clone)]
pub struct AllocationWrite {
    pub allocation: Allocation,
    /// Inventory id whose stock changed; read its final state from the book.
    pub inventory_id: String,
    /// Order updated with the new allocation id.
    pub order: Option<Order>,
}

/// Applies a valid preview: decrements stock in the book and returns the new
/// allocation document.
pub fn process_allocation(
    book: &mut AllocationBook,
    preview: &AllocationPreview,
    created_by: &str,
    now: DateTime<Utc>,
) -> CoreResult<AllocationWrite> {
    let invalid = || CoreError::InvalidState {
        entity: "allocation row".to_string(),
        id: preview.row.to_string(),
        status: "invalid".to_string(),
    };
    if !preview.is_valid() {
        return Err(invalid());
    }
    let inventory_id = preview.inventory_id.clone().ok_or_else(invalid)?;
    let lead_id = preview.lead_id.clone().ok_or_else(invalid)?;
    let inv = book
        .inventory
        .iter_mut()
        .find(|i| i.id == inventory_id)
        .ok_or_else(invalid)?;

    inv.allocate(preview.category_index, preview.tickets)?;

    let category = preview.category_index.and_then(|idx| inv.categories.get(idx));
    let buying_price = category
        .and_then(|c| c.buying_price)
        .or(inv.buying_price)
        .unwrap_or(0.0);
    let selling_price = preview
        .price_override
        .or_else(|| category.and_then(|c| c.selling_price))
        .or(inv.selling_price);
    let category_name = category
        .map(|c| c.name.clone())
        .or_else(|| preview.category_name.clone());
    let stand_section = category
        .and_then(|c| c.section.clone())
        .or_else(|| preview.stand_section.clone());
    let event_name = inv.event_name.clone();
    let event_date = inv.event_date;

    *book
        .allocated
        .entry((lead_id.clone(), inventory_id.clone()))
        .or_default() += preview.tickets;

    let order = if preview.order_linked {
        preview.order_id.as_ref().and_then(|id| book.orders.get(id)).cloned()
    } else {
        None
    };

    let mut extra = serde_json::Map::new();
    extra.insert("lead_name".into(), json!(preview.lead_name));
    extra.insert("event_date".into(), json!(event_date.map(|d| to_iso_millis(&d))));
    extra.insert("created_via".into(), json!("bulk_upload"));
    extra.insert("price_override".into(), json!(preview.price_override.is_some()));

    let allocation = Allocation {
        id: new_id(),
        lead_id: Some(lead_id),
        order_id: order.as_ref().map(|o| o.id.clone()),
        order_number: order.as_ref().and_then(|o| o.order_number.clone()),
        order_ids: order.iter().map(|o| o.id.clone()).collect(),
        inventory_id: Some(inventory_id.clone()),
        event_name: Some(event_name),
        category_name,
        stand_section,
        tickets_allocated: preview.tickets,
        selling_price,
        buying_price: Some(buying_price),
        total_buying_price: Some((Money::from_rupees(buying_price) * preview.tickets).rupees()),
        allocation_date: Some(now),
        notes: preview.notes.clone(),
        created_by: Some(created_by.to_string()),
        extra,
    };

    let order = order.map(|mut o| {
        o.allocation_ids.push(allocation.id.clone());
        o.updated_date = Some(now);
        if let Some(stored) = book.orders.get_mut(&o.id) {
            stored.allocation_ids = o.allocation_ids.clone();
        }
        o
    });

    Ok(AllocationWrite {
        allocation,
        inventory_id,
        order,
    })
}

/// One export line for an allocation, in [`ALLOCATION_EXPORT_HEADERS`] order.
pub fn allocation_export_record(allocation: &Allocation, lead_name: Option<&str>) -> Vec<String> {
    let name = lead_name
        .map(String::from)
        .or_else(|| allocation.extra.get("lead_name").and_then(Value::as_str).map(String::from))
        .unwrap_or_default();
    let price = allocation.selling_price.unwrap_or(0.0);
    let total = Money::from_rupees(price) * allocation.tickets_allocated;
    vec![
        allocation.id.clone(),
        allocation.event_name.clone().unwrap_or_default(),
        name,
        allocation.lead_id.clone().unwrap_or_default(),
        allocation.tickets_allocated.to_string(),
        allocation.category_name.clone().unwrap_or_default(),
        allocation.stand_section.clone().unwrap_or_default(),
        allocation.order_keys().collect::<Vec<_>>().join("; "),
        allocation.notes.clone().unwrap_or_default(),
        allocation.created_by.clone().unwrap_or_default(),
        allocation
            .allocation_date
            .map(|d| ist_date_string(&d))
            .unwrap_or_default(),
        format!("{price:.2}"),
        format!("{:.2}", total.rupees()),
    ]
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InventoryCategory;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 21, 10, 0, 0).unwrap()
    }

    fn order_row() -> OrderRow {
        OrderRow {
            lead_id: Some("L1".into()),
            client_name: Some("Rahul Mehta".into()),
            event_name: Some("IPL Final".into()),
            rate: Some("10000".into()),
            quantity: Some("2".into()),
            service_fee_amount: Some("2000".into()),
            state_location: Some("Haryana".into()),
            category_of_sale: Some("Retail".into()),
            ..Default::default()
        }
    }

    fn lead() -> Lead {
        Lead {
            id: "L1".into(),
            name: Some("Rahul Mehta".into()),
            email: Some("rahul@example.com".into()),
            phone: Some("9876543210".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_order_row_reports_every_problem() {
        let row = OrderRow {
            quantity: Some("two".into()),
            customer_type: Some("martian".into()),
            payment_method: Some("Barter".into()),
            ..Default::default()
        };
        let report = validate_order_row(&row, 3);
        assert_eq!(report.row, 5);
        assert_eq!(report.status, RowStatus::Invalid);
        assert!(report.errors.contains(&"Lead ID is required".to_string()));
        assert!(report.errors.contains(&"Client name is required".to_string()));
        assert!(report.errors.contains(&"Rate is required".to_string()));
        assert!(report.errors.contains(&"Quantity must be a valid number".to_string()));
        assert!(report
            .errors
            .contains(&"Customer type must be one of: indian, foreign".to_string()));
        assert!(report.errors.iter().any(|e| e.starts_with("Payment method must be one of")));
    }

    #[test]
    fn test_valid_order_row() {
        let report = validate_order_row(&order_row(), 0);
        assert!(report.is_valid());
        assert_eq!(report.lead_id.as_deref(), Some("L1"));
    }

    #[test]
    fn test_order_row_rejects_out_of_range_amounts() {
        let row = OrderRow {
            rate: Some("1000000000000000".into()),
            quantity: Some("100000".into()),
            ..order_row()
        };
        let report = validate_order_row(&row, 0);
        assert_eq!(report.status, RowStatus::Invalid);
        assert!(report.errors.contains(&"Rate must be at most 10000000000".to_string()));
        assert!(report.errors.contains(&"Quantity must be at most 10000".to_string()));

        let lead = lead();
        let ctx = UploadContext {
            lead: &lead,
            uploaded_by: "Asha",
            uploaded_by_email: None,
            fallback_event_date: None,
            now: now(),
            index: 0,
        };
        assert!(build_bulk_order(&row, &ctx).is_err());

        let zero = OrderRow {
            quantity: Some("0".into()),
            ..order_row()
        };
        let report = validate_order_row(&zero, 0);
        assert!(report.errors.contains(&"Quantity must be positive".to_string()));
    }

    #[test]
    fn test_build_bulk_order_computes_taxes() {
        let lead = lead();
        let ctx = UploadContext {
            lead: &lead,
            uploaded_by: "Asha",
            uploaded_by_email: Some("asha@example.com"),
            fallback_event_date: None,
            now: now(),
            index: 0,
        };
        let built = build_bulk_order(&order_row(), &ctx).unwrap();
        let order = &built.order;

        assert_eq!(order.status, OrderStatus::PendingApproval);
        assert_eq!(order.payment_status.as_deref(), Some("paid"));
        // Service fee sale: GST on the fee only, split intra-state
        assert_eq!(order.gst_amount, Some(360.0));
        assert_eq!(order.cgst_amount, Some(180.0));
        assert_eq!(order.final_amount, Some(22_360.0));
        assert_eq!(order.client_email.as_deref(), Some("rahul@example.com"));
        assert!(order.order_number.as_deref().unwrap().ends_with("-2"));
        assert_eq!(built.invoice.order_id, order.id);
        assert!(built.invoice.invoice_number.starts_with("INV-"));
    }

    #[test]
    fn test_build_bulk_order_rejects_invalid_row() {
        let lead = lead();
        let ctx = UploadContext {
            lead: &lead,
            uploaded_by: "Asha",
            uploaded_by_email: None,
            fallback_event_date: None,
            now: now(),
            index: 0,
        };
        let row = OrderRow {
            rate: None,
            ..order_row()
        };
        assert!(build_bulk_order(&row, &ctx).is_err());
    }

    #[test]
    fn test_mark_payment_received() {
        let mut lead = lead();
        mark_payment_received(&mut lead, "Asha", "Order ORD-1", now());
        assert_eq!(lead.status, LeadStatus::PaymentReceived);
        assert_eq!(lead.extra["payment_status"], "paid");
    }

    fn payment_row() -> PaymentRow {
        PaymentRow {
            lead_id: Some("L1".into()),
            payment_amount: Some("150000".into()),
            payment_date: Some("2025-07-20".into()),
            payment_mode: Some("UPI".into()),
            transaction_id: Some("TXN1".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_payment_row_validation() {
        assert!(validate_payment_row(&payment_row(), 0).is_valid());

        let row = PaymentRow {
            payment_amount: Some("0".into()),
            payment_mode: None,
            invoice_numbers: Some("INV-1,INV-2".into()),
            invoice_amounts: Some("100".into()),
            ..payment_row()
        };
        let report = validate_payment_row(&row, 0);
        assert_eq!(
            report.errors,
            vec![
                "Valid payment amount is required",
                "Payment mode is required",
                "Invoice count (2) doesn't match amount count (1)",
            ]
        );
    }

    #[test]
    fn test_payment_creates_order_when_lead_has_none() {
        let lead = lead();
        let ctx = UploadContext {
            lead: &lead,
            uploaded_by: "Asha",
            uploaded_by_email: None,
            fallback_event_date: None,
            now: now(),
            index: 0,
        };
        let built = build_bulk_payment(&payment_row(), None, &ctx).unwrap();
        assert!(built.order_created);
        assert_eq!(built.order.final_amount, Some(150_000.0));
        assert_eq!(built.payment.order_id.as_deref(), Some(built.order.id.as_str()));
        assert_eq!(built.activity.description, "Payment of ₹1,50,000 received via UPI");
    }

    #[test]
    fn test_payment_updates_existing_order() {
        let lead = lead();
        let ctx = UploadContext {
            lead: &lead,
            uploaded_by: "Asha",
            uploaded_by_email: None,
            fallback_event_date: None,
            now: now(),
            index: 0,
        };
        let existing = Order {
            id: "O1".into(),
            final_amount: Some(200_000.0),
            ..Default::default()
        };
        let built = build_bulk_payment(&payment_row(), Some(existing), &ctx).unwrap();
        assert!(!built.order_created);
        assert_eq!(built.order.id, "O1");
        assert_eq!(built.order.advance_amount, Some(150_000.0));
        assert_eq!(built.order.final_amount, Some(200_000.0));
        assert_eq!(built.order.payment_status.as_deref(), Some("paid"));
    }

    fn book() -> AllocationBook {
        let inventory = Inventory {
            id: "INV1".into(),
            event_name: "IPL Final".into(),
            available_tickets: 10,
            total_tickets: 10,
            buying_price: Some(3000.0),
            categories: vec![InventoryCategory {
                name: "Premium".into(),
                section: Some("North".into()),
                total_tickets: 4,
                available_tickets: 4,
                buying_price: Some(5000.0),
                selling_price: Some(8000.0),
                ..Default::default()
            }],
            ..Default::default()
        };
        let other = Lead {
            id: "L2".into(),
            email: Some("Priya@Example.com".into()),
            ..Default::default()
        };
        let orders = vec![
            Order {
                id: "O1".into(),
                lead_id: Some("L1".into()),
                ..Default::default()
            },
            Order {
                id: "O2".into(),
                lead_id: Some("L2".into()),
                ..Default::default()
            },
        ];
        let existing = Allocation {
            lead_id: Some("L2".into()),
            inventory_id: Some("INV1".into()),
            tickets_allocated: 1,
            ..Default::default()
        };
        AllocationBook::new(vec![inventory], vec![lead(), other], orders, &[existing])
    }

    fn allocation_row() -> AllocationRow {
        AllocationRow {
            event_name: Some("IPL Final".into()),
            lead_identifier: Some("+91 98765 43210".into()),
            tickets_to_allocate: Some("3".into()),
            category_name: Some("premium".into()),
            stand_section: Some("North".into()),
            order_id: Some("O1".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_find_lead_by_phone_variants_and_email() {
        let book = book();
        assert_eq!(book.find_lead("98765-43210").map(|l| l.id.as_str()), Some("L1"));
        assert_eq!(book.find_lead("priya@example.com").map(|l| l.id.as_str()), Some("L2"));
        assert!(book.find_lead("nobody@example.com").is_none());
    }

    #[test]
    fn test_preview_valid_row() {
        let p = preview_allocation(&book(), &allocation_row(), 0);
        assert!(p.is_valid(), "{:?}", p.errors);
        assert_eq!(p.lead_id.as_deref(), Some("L1"));
        assert_eq!(p.inventory_id.as_deref(), Some("INV1"));
    }

    #[test]
    fn test_preview_errors() {
        let book = book();
        let p = preview_allocation(
            &book,
            &AllocationRow {
                tickets_to_allocate: Some("5".into()),
                ..allocation_row()
            },
            0,
        );
        assert_eq!(
            p.errors,
            vec!["Not enough tickets available in category. Available: 4, Requested: 5"]
        );

        let p = preview_allocation(
            &book,
            &AllocationRow {
                stand_section: Some("South".into()),
                ..allocation_row()
            },
            0,
        );
        assert_eq!(
            p.errors,
            vec!["Category \"premium\" with section \"South\" not found for this event"]
        );

        let p = preview_allocation(
            &book,
            &AllocationRow {
                order_id: Some("O2".into()),
                ..allocation_row()
            },
            0,
        );
        assert_eq!(p.errors, vec!["Order \"O2\" belongs to a different lead"]);

        let p = preview_allocation(&book, &AllocationRow::default(), 0);
        assert_eq!(p.status, RowStatus::Error);
        assert_eq!(p.errors.len(), 3);
    }

    #[test]
    fn test_preview_warnings() {
        let p = preview_allocation(
            &book(),
            &AllocationRow {
                lead_identifier: Some("priya@example.com".into()),
                category_name: None,
                stand_section: None,
                order_id: Some("O9".into()),
                tickets_to_allocate: Some("2".into()),
                ..allocation_row()
            },
            0,
        );
        assert!(p.is_valid());
        assert_eq!(
            p.warnings,
            vec![
                "No category specified for categorized inventory - allocation may fail",
                "Lead already has 1 tickets allocated for this event",
                "Order \"O9\" not found - will create allocation without order link",
            ]
        );
    }

    #[test]
    fn test_process_decrements_stock_across_rows() {
        let mut book = book();
        let first = preview_allocation(&book, &allocation_row(), 0);
        let write = process_allocation(&mut book, &first, "Asha", now()).unwrap();

        assert_eq!(write.allocation.tickets_allocated, 3);
        assert_eq!(write.allocation.order_ids, vec!["O1"]);
        assert_eq!(write.allocation.total_buying_price, Some(15_000.0));
        assert_eq!(write.allocation.selling_price, Some(8000.0));
        assert_eq!(write.order.as_ref().unwrap().allocation_ids, vec![write.allocation.id.clone()]);

        let inv = &book.inventory()[0];
        assert_eq!(inv.categories[0].available_tickets, 1);
        assert_eq!(inv.available_tickets, 7);

        // The second identical row now exceeds what is left
        let second = preview_allocation(&book, &allocation_row(), 1);
        assert!(!second.is_valid());
        assert!(process_allocation(&mut book, &second, "Asha", now()).is_err());
    }

    #[test]
    fn test_allocation_summary_and_export() {
        let book = book();
        let previews = vec![
            preview_allocation(&book, &allocation_row(), 0),
            preview_allocation(&book, &AllocationRow::default(), 1),
        ];
        let summary = AllocationSummary::from_previews(&previews);
        assert_eq!(summary.valid_rows, 1);
        assert_eq!(summary.error_rows, 1);
        assert_eq!(summary.total_tickets, 3);
        assert!(summary.can_proceed);

        let allocation = Allocation {
            id: "A1".into(),
            tickets_allocated: 2,
            selling_price: Some(1500.0),
            order_ids: vec!["O1".into(), "O2".into()],
            ..Default::default()
        };
        let record = allocation_export_record(&allocation, Some("Rahul"));
        assert_eq!(record.len(), ALLOCATION_EXPORT_HEADERS.len());
        assert_eq!(record[7], "O1; O2");
        assert_eq!(record[12], "3000.00");
    }
}
