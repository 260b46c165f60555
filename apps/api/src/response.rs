//! API response types.
//!
//! Successful responses share one envelope:
//!
//! ```json
//! { "success": true, "data": { ... }, "cached": true, "cacheAge": "4 minutes" }
//! ```
//!
//! Route-specific fields (`cached`, `nextUpdateIn`, `summary`, ...) sit next
//! to `data` and are added with [`ApiResponse::with`].

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};

/// Standard API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response with data.
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            extra: Map::new(),
            status: StatusCode::OK,
        }
    }

    /// 201 response for a newly created resource.
    #[must_use]
    pub fn created(data: T) -> Self {
        Self::success(data).with_status(StatusCode::CREATED)
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Adds a top-level field next to `data`.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.extra.insert(key.to_string(), value);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl ApiResponse<()> {
    /// Success without data.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            extra: Map::new(),
            status: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// A CSV file download.
#[derive(Debug)]
pub struct CsvFile {
    pub filename: String,
    pub body: String,
}

impl CsvFile {
    pub fn new(filename: impl Into<String>, body: String) -> Self {
        CsvFile {
            filename: filename.into(),
            body,
        }
    }
}

impl IntoResponse for CsvFile {
    fn into_response(self) -> Response {
        let disposition = format!("attachment; filename=\"{}\"", self.filename);
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            self.body,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shape() {
        let response = ApiResponse::success(vec![1, 2])
            .with("cached", true)
            .with("cacheAge", "3 minutes");
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(
            value,
            json!({ "success": true, "data": [1, 2], "cached": true, "cacheAge": "3 minutes" })
        );
    }

    #[test]
    fn test_message_only() {
        let value = serde_json::to_value(ApiResponse::message("done")).unwrap();
        assert_eq!(value, json!({ "success": true, "message": "done" }));
    }

    #[test]
    fn test_csv_headers() {
        let response = CsvFile::new("events.csv", "a,b\n".into()).into_response();
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"events.csv\""
        );
    }
}
