//! # Validation Module
//!
//! Input validation helpers shared by the CRUD routes and the CSV bulk
//! uploads.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Admin frontend                                               │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: API handler / bulk upload row                                │
//! │  ├── Deserialization (serde, lenient document readers)                 │
//! │  └── THIS MODULE: field rules                                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Document store                                               │
//! │  └── Primary key per collection                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Field names passed in here end up verbatim in user-facing messages
//! ("Rate must be a valid number"), so callers use display names.

use std::str::FromStr;

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Minimum number of digits in a usable phone number.
pub const MIN_PHONE_DIGITS: usize = 10;

/// Country prefix tried when matching phone numbers.
pub const PHONE_COUNTRY_PREFIX: &str = "+91";

// =============================================================================
// String Validators
// =============================================================================

/// Returns the trimmed value, or `Required` when it is missing or blank.
///
/// ## Example
/// ```rust
/// use salesdesk_core::validation::require;
///
/// assert_eq!(require("Client name", Some("  Acme ")).unwrap(), "Acme");
/// let err = require("Client name", Some("   ")).unwrap_err();
/// assert_eq!(err.to_string(), "Client name is required");
/// ```
pub fn require<'a>(field: &str, value: Option<&'a str>) -> ValidationResult<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::required(field)),
    }
}

/// Validates a name-like field (event name, client name).
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates an email address (shape only).
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    let invalid = || ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: "must be a valid email address".to_string(),
    };

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.is_empty()
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }

    Ok(())
}

// =============================================================================
// Phone Numbers
// =============================================================================

/// Strips everything but digits.
pub fn clean_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// Validates a phone number: at least [`MIN_PHONE_DIGITS`] digits once
/// formatting is removed.
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    if clean_phone(phone).len() < MIN_PHONE_DIGITS {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: format!("must contain at least {MIN_PHONE_DIGITS} digits"),
        });
    }
    Ok(())
}

/// Client id derived from a phone number.
///
/// Leads sharing a phone number belong to the same client.
///
/// ## Example
/// ```rust
/// use salesdesk_core::validation::client_id_for_phone;
///
/// assert_eq!(client_id_for_phone("+91 98765-43210").as_deref(), Some("client_919876543210"));
/// assert_eq!(client_id_for_phone("n/a"), None);
/// ```
pub fn client_id_for_phone(phone: &str) -> Option<String> {
    let digits = clean_phone(phone);
    (!digits.is_empty()).then(|| format!("client_{digits}"))
}

/// Candidate phone values to look a lead up by, in the order they are tried.
///
/// ```text
/// "98765 43210"     ──►  "98765 43210", "9876543210", "+919876543210"
/// "+91 98765 43210" ──►  "+91 98765 43210", "919876543210", "9876543210",
///                        "+919876543210"
/// ```
pub fn phone_variants(identifier: &str) -> Vec<String> {
    let given = identifier.trim().to_string();
    let digits = clean_phone(&given);

    let mut variants = vec![given];
    if !digits.is_empty() && !variants.contains(&digits) {
        variants.push(digits.clone());
    }
    if digits.len() >= MIN_PHONE_DIGITS {
        let local = digits[digits.len() - MIN_PHONE_DIGITS..].to_string();
        let prefixed = format!("{PHONE_COUNTRY_PREFIX}{local}");
        for candidate in [local, prefixed] {
            if !variants.contains(&candidate) {
                variants.push(candidate);
            }
        }
    }
    variants
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Parses an optional numeric field. Blank is `None`, thousands separators
/// are ignored, anything else non-numeric is `NotANumber`.
pub fn parse_number(field: &str, value: Option<&str>) -> ValidationResult<Option<f64>> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    raw.replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(Some)
        .ok_or_else(|| ValidationError::NotANumber {
            field: field.to_string(),
        })
}

/// Validates that an amount is strictly positive.
pub fn validate_positive(field: &str, amount: f64) -> ValidationResult<()> {
    if !(amount > 0.0) {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates that a number is no larger than `max`.
///
/// ## Example
/// ```rust
/// use salesdesk_core::validation::validate_at_most;
///
/// assert!(validate_at_most("Quantity", 10.0, 100.0).is_ok());
/// assert!(validate_at_most("Quantity", 101.0, 100.0).is_err());
/// ```
pub fn validate_at_most(field: &str, value: f64, max: f64) -> ValidationResult<()> {
    if value > max {
        return Err(ValidationError::TooLarge {
            field: field.to_string(),
            max: max.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Choice Validators
// =============================================================================

/// Parses an optional value from a closed set. Blank is `None`; a value
/// outside the set reports the allowed choices.
pub fn parse_choice<T: FromStr>(
    field: &str,
    value: Option<&str>,
    allowed: &[&str],
) -> ValidationResult<Option<T>> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| ValidationError::NotAllowed {
            field: field.to_string(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::CustomerType;

    #[test]
    fn test_require() {
        assert_eq!(require("Lead ID", Some(" L1 ")).unwrap(), "L1");
        assert!(require("Lead ID", None).is_err());
        assert_eq!(
            require("Lead ID", Some("")).unwrap_err().to_string(),
            "Lead ID is required"
        );
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Event name", "IPL Final").is_ok());
        assert!(validate_name("Event name", " ").is_err());
        assert!(validate_name("Event name", &"A".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("asha@example.com").is_ok());
        assert!(validate_email("asha@example").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("asha example.com").is_err());
    }

    #[test]
    fn test_phone_helpers() {
        assert_eq!(clean_phone("+91 (987) 654-3210"), "919876543210");
        assert!(validate_phone("98765 43210").is_ok());
        assert!(validate_phone("12345").is_err());
        assert_eq!(client_id_for_phone("98765 43210").as_deref(), Some("client_9876543210"));
    }

    #[test]
    fn test_phone_variants() {
        assert_eq!(
            phone_variants("98765 43210"),
            vec!["98765 43210", "9876543210", "+919876543210"]
        );
        assert_eq!(
            phone_variants("+919876543210"),
            vec!["+919876543210", "919876543210", "9876543210"]
        );
        assert_eq!(phone_variants("12345"), vec!["12345"]);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("Rate", Some("1,250.50")).unwrap(), Some(1250.5));
        assert_eq!(parse_number("Rate", Some("  ")).unwrap(), None);
        assert_eq!(
            parse_number("Rate", Some("abc")).unwrap_err().to_string(),
            "Rate must be a valid number"
        );
    }

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive("Amount", 1.0).is_ok());
        assert!(validate_positive("Amount", 0.0).is_err());
        assert!(validate_positive("Amount", f64::NAN).is_err());
    }

    #[test]
    fn test_parse_choice() {
        let allowed = ["indian", "foreign"];
        let parsed: Option<CustomerType> =
            parse_choice("Customer type", Some("Foreign"), &allowed).unwrap();
        assert_eq!(parsed, Some(CustomerType::Foreign));

        let err = parse_choice::<CustomerType>("Customer type", Some("martian"), &allowed)
            .unwrap_err();
        assert_eq!(err.to_string(), "Customer type must be one of: indian, foreign");
    }
}
