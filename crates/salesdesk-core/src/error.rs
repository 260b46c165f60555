//! # Error Types
//!
//! Domain-specific error types for salesdesk-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  salesdesk-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  salesdesk-db errors (separate crate)                                  │
//! │  └── DbError          - Document store failures                        │
//! │                                                                         │
//! │  apps/api errors                                                       │
//! │  └── ApiError         - What HTTP clients see (status + JSON body)     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → HTTP response          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Not enough tickets left to satisfy an allocation.
    ///
    /// ## User Workflow
    /// ```text
    /// Allocate 5 tickets (category "Gold")
    ///      │
    ///      ▼
    /// Check availability: available=3
    ///      │
    ///      ▼
    /// InsufficientInventory { event: "IPL Final", category: Some("Gold"), .. }
    /// ```
    #[error("Insufficient tickets for {event}{}: available {available}, requested {requested}",
        .category.as_ref().map(|c| format!(" ({c})")).unwrap_or_default())]
    InsufficientInventory {
        event: String,
        category: Option<String>,
        available: i64,
        requested: i64,
    },

    /// A category name/section did not match any category of the inventory.
    #[error("Category '{category}' not found for event {event}")]
    CategoryNotFound { event: String, category: String },

    /// A record is in a state that does not allow the requested operation.
    #[error("{entity} {id} is {status}, cannot perform operation")]
    InvalidState {
        entity: String,
        id: String,
        status: String,
    },

    /// A date or timestamp could not be parsed.
    #[error("Invalid date: '{0}'")]
    InvalidDate(String),

    /// A closed enumeration received a value outside its set.
    #[error("Unknown {kind}: '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an UnknownVariant error.
    pub fn unknown(kind: &'static str, value: impl Into<String>) -> Self {
        CoreError::UnknownVariant {
            kind,
            value: value.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic runs. The message text is what API
/// clients and CSV upload reports show.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value is above the largest amount the system accepts.
    #[error("{field} must be at most {max}")]
    TooLarge { field: String, max: String },

    /// Value must be a number.
    #[error("{field} must be a valid number")]
    NotANumber { field: String },

    /// Invalid format (e.g., invalid email, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {}", .allowed.join(", "))]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., duplicate event name).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    /// Creates a Required error.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_inventory_message() {
        let err = CoreError::InsufficientInventory {
            event: "IPL Final".to_string(),
            category: Some("Gold".to_string()),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient tickets for IPL Final (Gold): available 3, requested 5"
        );

        let err = CoreError::InsufficientInventory {
            event: "IPL Final".to_string(),
            category: None,
            available: 0,
            requested: 1,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient tickets for IPL Final: available 0, requested 1"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(
            ValidationError::required("Lead ID").to_string(),
            "Lead ID is required"
        );

        let err = ValidationError::NotAllowed {
            field: "customer_type".to_string(),
            allowed: vec!["indian".to_string(), "foreign".to_string()],
        };
        assert_eq!(err.to_string(), "customer_type must be one of: indian, foreign");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("name").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
