//! # apotheca-db: Database Layer for Apotheca POS
//!
//! SQLite storage for the pharmacy: connection pool, embedded migrations,
//! repositories, credential hashing and the checkout orchestrator.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Apotheca POS Data Flow                             │
//! │                                                                         │
//! │  POST /api/sales (pos-api)                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   apotheca-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  Checkout     │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │ (checkout.rs) │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ Sequence      │    │              │  │   │
//! │  │   │ one tx per    │───►│ SaleRecorder  │    │ 001_initial  │  │   │
//! │  │   │ sale, state   │    │ Inventory     │    │ _schema.sql  │  │   │
//! │  │   │ machine       │    │ Loyalty ...   │    │              │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │                               │   │
//! │  │                        ┌───────▼───────┐                       │   │
//! │  │                        │   Database    │                       │   │
//! │  │                        │   (pool.rs)   │                       │   │
//! │  │                        └───────────────┘                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL, one writer at a time, busy_timeout)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`checkout`] - Sale completion as one transaction
//! - [`credentials`] - argon2 hashing, reset codes
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use apotheca_db::{CheckoutPolicy, Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/apotheca.db")).await?;
//!
//! let listings = db.products().search("amox", Some(&branch_id)).await?;
//! let sale = db.checkout(CheckoutPolicy::default()).complete_sale(&request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod credentials;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::{CheckoutOrchestrator, CheckoutPolicy, CheckoutState, CompletedSale};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::held::HeldTransactionRepository;
pub use repository::inventory::InventoryAdjuster;
pub use repository::loyalty::LoyaltyLedger;
pub use repository::prescription::PrescriptionRepository;
pub use repository::product::ProductRepository;
pub use repository::returns::ReturnRepository;
pub use repository::sale::SaleRecorder;
pub use repository::sequence::SequenceGenerator;
pub use repository::session::SessionAggregator;
