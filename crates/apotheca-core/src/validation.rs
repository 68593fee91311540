//! # Validation Module
//!
//! Input validation shared by the HTTP handlers and the repositories.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: axum extractors                                              │
//! │  └── JSON shape, types (serde)                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── lengths, ranges, formats → 400 before any transaction             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── CHECK (stock >= 0), CHECK (total = subtotal - discount + tax)     │
//! │  ├── UNIQUE (branch_id, business_date, daily_sequence)                 │
//! │  └── FOREIGN KEY constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_PRICE_CENTS, MIN_SEARCH_QUERY_LEN};

pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an entity reference sent by a client.
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ValidationError::required(field));
    }
    if id.len() > 64 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 64,
        });
    }
    Ok(())
}

/// Validates a UUID string.
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required("id"));
    }
    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::invalid("id", "must be a valid UUID"))?;
    Ok(())
}

/// Validates a required display name (product, customer, supplier...).
pub fn validate_name(field: &str, name: &str, max: usize) -> ValidationResult<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::required(field));
    }
    if name.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Validates a product search query and returns it trimmed.
///
/// ## Rules
/// - At least 3 characters (shorter queries match half the catalogue)
/// - At most 100 characters
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() < MIN_SEARCH_QUERY_LEN {
        return Err(ValidationError::TooShort {
            field: "query".to_string(),
            min: MIN_SEARCH_QUERY_LEN,
        });
    }
    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

/// Validates a branch code: 2-10 uppercase letters or digits.
///
/// ```rust
/// use apotheca_core::validation::validate_branch_code;
///
/// assert!(validate_branch_code("B01").is_ok());
/// assert!(validate_branch_code("b-1").is_err());
/// ```
pub fn validate_branch_code(code: &str) -> ValidationResult<()> {
    if code.is_empty() {
        return Err(ValidationError::required("branchCode"));
    }
    if code.len() < 2 || code.len() > 10 {
        return Err(ValidationError::invalid("branchCode", "must be 2-10 characters"));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err(ValidationError::invalid(
            "branchCode",
            "must contain only uppercase letters and digits",
        ));
    }
    Ok(())
}

/// Counter PINs are 4 to 6 digits.
pub fn validate_pin(pin: &str) -> ValidationResult<()> {
    if pin.len() < 4 || pin.len() > 6 || !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::invalid("pin", "must be 4 to 6 digits"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.chars().count() < 8 {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: 8,
        });
    }
    if password.len() > 128 {
        return Err(ValidationError::TooLong {
            field: "password".to_string(),
            max: 128,
        });
    }
    Ok(())
}

/// Password reset codes are exactly six digits.
pub fn validate_reset_code(code: &str) -> ValidationResult<()> {
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::invalid("token", "must be 6 digits"));
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity: 1..=MAX_ITEM_QUANTITY.
///
/// ## User Workflow
/// ```text
/// Pharmacist enters quantity: 10
///      │
///      ▼
/// validate_quantity(10) ← THIS FUNCTION
///      │
///      ├── qty <= 0?    → "quantity must be positive"
///      ├── qty > 9999?  → "quantity must be between 1 and 9999"
///      └── OK
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Prices may be zero (free samples) but never negative, and never above
/// `MAX_PRICE_CENTS`.
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }
    Ok(())
}

/// Stock levels set by import or adjustment.
pub fn validate_stock_level(stock: i64) -> ValidationResult<()> {
    if stock < 0 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Basis points between 0 and `max`.
pub fn validate_bps(field: &str, bps: i64, max: i64) -> ValidationResult<()> {
    if bps < 0 || bps > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
