//! # apotheca-core: Pure Business Logic for Apotheca POS
//!
//! Everything in this crate is deterministic and free of I/O. The database
//! layer (`apotheca-db`) and the HTTP layer (`pos-api`) call into it for
//! every number that ends up on a receipt.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Apotheca Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 pos-api (axum REST handlers)                    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ apotheca-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌──────────┐ ┌────────┐ │   │
//! │  │   │  money  │ │ loyalty │ │ checkout │ │ invoice  │ │ types  │ │   │
//! │  │   │  Money  │ │ Points  │ │ totals   │ │ B01-...  │ │ Sale   │ │   │
//! │  │   │ TaxRate │ │ Policy  │ │ VAT      │ │ -0004    │ │ ...    │ │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └──────────┘ └────────┘ │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              apotheca-db (SQLite, transactions)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money in integer centavos, VAT rates
//! - [`loyalty`] - Points (hundredths) and the earn/redeem policy
//! - [`invoice`] - Invoice number formatting and business dates
//! - [`checkout`] - Checkout request types and totals
//! - [`pricing`] - Supplier price to selling price
//! - [`types`] - Persisted domain types
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example
//!
//! ```rust
//! use apotheca_core::loyalty::{LoyaltyPolicy, Points};
//! use apotheca_core::money::Money;
//!
//! let policy = LoyaltyPolicy::default();
//!
//! // 220.00 at 1 point per 200.00 = 1.10 points
//! let earned = policy.points_earned(Money::from_cents(22_000));
//! assert_eq!(earned, Points::from_hundredths(110));
//! ```

pub mod checkout;
pub mod error;
pub mod invoice;
pub mod loyalty;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use loyalty::{LoyaltyPolicy, Points};
pub use money::{Money, TaxRate};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items in a single sale or held transaction.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line item.
///
/// Catches typos like 1000 instead of 10 at the counter.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

/// Ceiling for any single price: product, supplier cost, cart line or
/// manual discount. ₱1,000,000.00.
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

/// Ceiling for the subtotal of one cart. ₱10,000,000.00.
pub const MAX_CART_TOTAL_CENTS: i64 = 1_000_000_000;

/// Minimum length of a product search query.
pub const MIN_SEARCH_QUERY_LEN: usize = 3;

/// Maximum rows returned by product search.
pub const SEARCH_RESULT_LIMIT: i64 = 50;

/// Display name used when a sale has no customer attached.
pub const WALK_IN_CUSTOMER_NAME: &str = "Walk-in Customer";
