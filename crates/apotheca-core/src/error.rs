//! # Error Types
//!
//! Domain errors for apotheca-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  apotheca-core (this file)                                             │
//! │  ├── CoreError        - Business rule violations, missing entities     │
//! │  └── ValidationError  - Malformed input                                │
//! │                                                                         │
//! │  apotheca-db                                                           │
//! │  └── DbError          - Storage failures (wraps CoreError as Rule)     │
//! │                                                                         │
//! │  pos-api                                                               │
//! │  └── ApiError         - HTTP status + {success, message, error}        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::loyalty::Points;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations and missing domain entities.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    /// No active inventory row for the product at the branch.
    #[error("No inventory for product {product_id} at branch {branch_id}")]
    InventoryNotFound {
        branch_id: String,
        product_id: String,
    },

    /// A decrement would drive stock below zero.
    ///
    /// ## User Workflow
    /// ```text
    /// Sale line: Biogesic 500mg × 7
    ///      │
    ///      ▼
    /// Stock at branch: 5
    ///      │
    ///      ▼
    /// InsufficientStock { available: 5, requested: 7 }
    ///      │
    ///      ▼
    /// Sale rolled back, stock stays 5
    /// ```
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Points redemption outside `0..=max`.
    #[error("Invalid redemption: requested {requested} points, at most {max} redeemable")]
    InvalidRedemption { requested: Points, max: Points },

    /// The session has an end time; it no longer accepts sales.
    #[error("Session {0} is closed")]
    SessionNotOpen(String),

    /// Held transaction was already completed or discarded.
    #[error("Held transaction {id} is {status}")]
    HeldTransactionNotActive { id: String, status: String },

    #[error("Cannot return {requested} of product {product_id}: only {remaining} returnable")]
    ReturnExceedsSold {
        product_id: String,
        remaining: i64,
        requested: i64,
    },

    /// Restore was asked for a supplier that is not archived.
    #[error("Supplier {0} is not archived")]
    SupplierNotArchived(String),

    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// True for errors that mean "the referenced thing does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::ProductNotFound(_)
                | CoreError::SaleNotFound(_)
                | CoreError::SessionNotFound(_)
                | CoreError::CustomerNotFound(_)
                | CoreError::BranchNotFound(_)
                | CoreError::InventoryNotFound { .. }
        )
    }

    /// True for input errors that are rejected before any transaction opens.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::Validation(_)
                | CoreError::CartTooLarge { .. }
                | CoreError::QuantityTooLarge { .. }
                | CoreError::InvalidPaymentAmount { .. }
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    #[error("{field} does not match: {reason}")]
    Mismatch { field: String, reason: String },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
