//! CSV reading for bulk uploads and writing for exports.

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use serde::de::DeserializeOwned;

use salesdesk_core::bulk::sheet_row;

use crate::error::{ApiError, ApiResult};

/// Header spelling used by the row types: `Lead ID` → `lead_id`.
fn normalize_header(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Parses an uploaded CSV body into rows. Rows with missing trailing
/// columns are accepted; blank lines are skipped.
pub fn parse_csv<T: DeserializeOwned>(body: &str) -> ApiResult<Vec<T>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ApiError::bad_request(format!("Invalid CSV header: {}", e)))?;
    let normalized: StringRecord = headers.iter().map(normalize_header).collect();
    if normalized.iter().all(str::is_empty) {
        return Err(ApiError::bad_request("CSV file has no header row"));
    }
    reader.set_headers(normalized);

    let mut rows = Vec::new();
    for (index, record) in reader.deserialize::<T>().enumerate() {
        let row = record.map_err(|e| {
            ApiError::bad_request(format!("Row {}: {}", sheet_row(index), e))
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Renders a header line and records as CSV text.
pub fn write_csv<I>(headers: &[&str], records: I) -> ApiResult<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = WriterBuilder::new().flexible(true).from_writer(Vec::new());
    let internal = |e: csv::Error| ApiError::Internal(format!("CSV write failed: {}", e));

    writer.write_record(headers).map_err(internal)?;
    for record in records {
        writer.write_record(&record).map_err(internal)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ApiError::Internal(format!("CSV write failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| ApiError::Internal(format!("CSV is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use salesdesk_core::bulk::{AllocationRow, OrderRow};

    #[test]
    fn test_parse_normalizes_headers() {
        let body = "\u{feff}Lead ID, Client Name ,event_name,rate,quantity\nL1, Asha ,IPL,1000,2\n";
        let rows: Vec<OrderRow> = parse_csv(body).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].lead_id.as_deref(), Some("L1"));
        assert_eq!(rows[0].client_name.as_deref(), Some("Asha"));
        assert_eq!(rows[0].quantity.as_deref(), Some("2"));
    }

    #[test]
    fn test_parse_accepts_short_rows() {
        let body = "event_name,lead_identifier,tickets_to_allocate,notes\nIPL,9876543210,2\n";
        let rows: Vec<AllocationRow> = parse_csv(body).unwrap();
        assert_eq!(rows[0].tickets_to_allocate.as_deref(), Some("2"));
        assert!(rows[0].notes.is_none());
    }

    #[test]
    fn test_empty_body_rejected() {
        assert!(parse_csv::<OrderRow>("").is_err());
    }

    #[test]
    fn test_write_quotes_fields() {
        let csv = write_csv(&["name", "notes"], vec![vec!["Asha".into(), "a, b".into()]]).unwrap();
        assert_eq!(csv, "name,notes\nAsha,\"a, b\"\n");
    }
}
