//! CSV bulk upload handlers.
//!
//! Upload bodies are raw `text/csv`. Validation and preview never write;
//! upload and process write every valid row and report the rest.

use axum::extract::{Query, State};
use serde::Deserialize;

use salesdesk_core::bulk::{
    AllocationPreview, AllocationRow, AllocationSummary, OrderRow, PaymentRow, RowReport, RowSummary,
    ALLOCATION_TEMPLATE_HEADERS, ALLOCATION_TEMPLATE_SAMPLES, ORDER_TEMPLATE_HEADERS, ORDER_TEMPLATE_SAMPLE,
    PAYMENT_TEMPLATE_HEADERS, PAYMENT_TEMPLATE_SAMPLE,
};
use salesdesk_core::BulkUploadLog;

use crate::auth::Auth;
use crate::error::{ApiError, ApiResult};
use crate::response::{ApiResponse, CsvFile};
use crate::services::bulk::{self, UploadReport, Uploader, ALLOCATION_UPLOAD, ORDER_UPLOAD, PAYMENT_UPLOAD};
use crate::services::csv_io::{parse_csv, write_csv};
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

fn template<const N: usize>(filename: &str, headers: &[&str; N], samples: &[[&str; N]]) -> ApiResult<CsvFile> {
    let records = samples
        .iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect::<Vec<_>>());
    let body = write_csv(headers, records)?;
    Ok(CsvFile::new(filename, body))
}

fn parse_rows<T: serde::de::DeserializeOwned>(body: &str) -> ApiResult<Vec<T>> {
    let rows: Vec<T> = parse_csv(body)?;
    if rows.is_empty() {
        return Err(ApiError::bad_request("CSV file contains no data rows"));
    }
    Ok(rows)
}

async fn history(state: &AppState, upload_type: &str, query: HistoryQuery) -> ApiResult<ApiResponse<Vec<BulkUploadLog>>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 200);
    let logs = bulk::history(&state.db, upload_type, limit).await?;
    Ok(ApiResponse::success(logs))
}

fn upload_response(report: UploadReport) -> ApiResponse<UploadReport> {
    let message = format!("Processed {} rows: {} succeeded, {} failed", report.total, report.success, report.failed);
    ApiResponse::success(report).with_message(message)
}

// =============================================================================
// Orders
// =============================================================================

pub async fn order_template(Auth(user): Auth) -> ApiResult<CsvFile> {
    user.require_finance()?;
    template("bulk_orders_template.csv", &ORDER_TEMPLATE_HEADERS, &[ORDER_TEMPLATE_SAMPLE])
}

pub async fn validate_orders(
    State(state): State<AppState>,
    Auth(user): Auth,
    body: String,
) -> ApiResult<ApiResponse<Vec<RowReport>>> {
    user.require_finance()?;
    let rows: Vec<OrderRow> = parse_rows(&body)?;
    let (reports, summary): (Vec<RowReport>, RowSummary) = bulk::validate_orders(&state.db, &rows).await?;
    Ok(ApiResponse::success(reports).with("summary", summary))
}

pub async fn upload_orders(
    State(state): State<AppState>,
    Auth(user): Auth,
    body: String,
) -> ApiResult<ApiResponse<UploadReport>> {
    user.require_finance()?;
    let rows: Vec<OrderRow> = parse_rows(&body)?;
    let uploader = Uploader {
        name: user.display_name(),
        email: &user.email,
    };
    let report = bulk::upload_orders(&state.db, &rows, uploader).await?;
    if report.success > 0 {
        state.caches.invalidate_sales().await;
    }
    Ok(upload_response(report))
}

pub async fn order_history(
    State(state): State<AppState>,
    Auth(user): Auth,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<ApiResponse<Vec<BulkUploadLog>>> {
    user.require_finance()?;
    history(&state, ORDER_UPLOAD, query).await
}

// =============================================================================
// Payments
// =============================================================================

pub async fn payment_template(Auth(user): Auth) -> ApiResult<CsvFile> {
    user.require_finance()?;
    template("bulk_payments_template.csv", &PAYMENT_TEMPLATE_HEADERS, &[PAYMENT_TEMPLATE_SAMPLE])
}

pub async fn validate_payments(
    State(state): State<AppState>,
    Auth(user): Auth,
    body: String,
) -> ApiResult<ApiResponse<Vec<RowReport>>> {
    user.require_finance()?;
    let rows: Vec<PaymentRow> = parse_rows(&body)?;
    let (reports, summary) = bulk::validate_payments(&state.db, &rows).await?;
    Ok(ApiResponse::success(reports).with("summary", summary))
}

pub async fn upload_payments(
    State(state): State<AppState>,
    Auth(user): Auth,
    body: String,
) -> ApiResult<ApiResponse<UploadReport>> {
    user.require_finance()?;
    let rows: Vec<PaymentRow> = parse_rows(&body)?;
    let uploader = Uploader {
        name: user.display_name(),
        email: &user.email,
    };
    let report = bulk::upload_payments(&state.db, &rows, uploader).await?;
    if report.success > 0 {
        state.caches.invalidate_sales().await;
    }
    Ok(upload_response(report))
}

pub async fn payment_history(
    State(state): State<AppState>,
    Auth(user): Auth,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<ApiResponse<Vec<BulkUploadLog>>> {
    user.require_finance()?;
    history(&state, PAYMENT_UPLOAD, query).await
}

// =============================================================================
// Allocations
// =============================================================================

pub async fn allocation_template(Auth(user): Auth) -> ApiResult<CsvFile> {
    user.require_inventory()?;
    template(
        "bulk_allocations_template.csv",
        &ALLOCATION_TEMPLATE_HEADERS,
        &ALLOCATION_TEMPLATE_SAMPLES,
    )
}

pub async fn preview_allocations(
    State(state): State<AppState>,
    Auth(user): Auth,
    body: String,
) -> ApiResult<ApiResponse<Vec<AllocationPreview>>> {
    user.require_inventory()?;
    let rows: Vec<AllocationRow> = parse_rows(&body)?;
    let (previews, summary): (Vec<AllocationPreview>, AllocationSummary) =
        bulk::preview_allocations(&state.db, &rows).await?;
    Ok(ApiResponse::success(previews).with("summary", summary))
}

pub async fn process_allocations(
    State(state): State<AppState>,
    Auth(user): Auth,
    body: String,
) -> ApiResult<ApiResponse<UploadReport>> {
    user.require_inventory()?;
    let rows: Vec<AllocationRow> = parse_rows(&body)?;
    let report = bulk::process_allocations(&state.db, &rows, &user.email).await?;
    if report.success > 0 {
        state.caches.invalidate_sales().await;
    }
    Ok(upload_response(report))
}

pub async fn allocation_history(
    State(state): State<AppState>,
    Auth(user): Auth,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<ApiResponse<Vec<BulkUploadLog>>> {
    user.require_inventory()?;
    history(&state, ALLOCATION_UPLOAD, query).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_template_has_sample_rows() {
        let csv = template("t.csv", &ALLOCATION_TEMPLATE_HEADERS, &ALLOCATION_TEMPLATE_SAMPLES).unwrap();
        assert_eq!(csv.body.lines().count(), 3);
        assert!(csv.body.starts_with(ALLOCATION_TEMPLATE_HEADERS[0]));
    }

    #[test]
    fn test_parse_rows_rejects_header_only_file() {
        let result: ApiResult<Vec<AllocationRow>> = parse_rows("event_name,lead_identifier\n");
        assert!(result.is_err());
    }
}
