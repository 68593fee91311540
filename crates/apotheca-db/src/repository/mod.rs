//! # Repository Module
//!
//! Database repositories for Apotheca POS.
//!
//! ## Two Kinds of Methods
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Pool vs Connection                                   │
//! │                                                                         │
//! │  &self methods                    associated fns (conn: &mut Sqlite..)  │
//! │  ─────────────                    ──────────────────────────────────    │
//! │  Own a SqlitePool clone           Borrow the caller's connection       │
//! │  Reads, single-row writes         Steps of a larger transaction        │
//! │                                                                         │
//! │  db.sales().get_detail(id)        SaleRecorder::record_sale(&mut tx,..)│
//! │  db.products().search(q, b)       InventoryAdjuster::adjust(&mut tx,..)│
//! │                                                                         │
//! │  A transaction step never touches the pool: with an in-memory          │
//! │  database the pool has exactly one connection, and it is the one the   │
//! │  transaction is holding.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`sequence::SequenceGenerator`] - per-branch daily invoice sequence
//! - [`inventory::InventoryAdjuster`] - conditional stock changes + audit
//! - [`loyalty::LoyaltyLedger`] - points balance + append-only ledger
//! - [`sale::SaleRecorder`] - sale header, items, payment
//! - [`session::SessionAggregator`] - sales sessions and running totals
//! - [`held::HeldTransactionRepository`] - parked carts
//! - [`returns::ReturnRepository`] - refunds against sales
//! - [`product::ProductRepository`] - catalogue, search, bulk import
//! - [`customer::CustomerRepository`] - customers and loyalty cards
//! - [`staff::StaffRepository`] - users, pharmacists, reset tokens
//! - [`supplier::SupplierRepository`] - suppliers, links, price history
//! - [`prescription::PrescriptionRepository`] - prescriptions recorded at the counter
//! - [`branch::BranchRepository`] - branches
//! - [`dashboard::DashboardRepository`] - low stock, recent sales

pub mod branch;
pub mod customer;
pub mod dashboard;
pub mod held;
pub mod inventory;
pub mod loyalty;
pub mod prescription;
pub mod product;
pub mod returns;
pub mod sale;
pub mod sequence;
pub mod session;
pub mod staff;
pub mod supplier;

/// Generates a new entity id.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Escapes `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// =============================================================================
// Test Fixtures
// =============================================================================

/// A small pharmacy: branch `B01`, one pharmacist on an open session, three
/// products with stock, and a loyalty customer holding 80 points.
#[cfg(test)]
pub(crate) mod fixture {
    use apotheca_core::{Money, Points};
    use chrono::Utc;
    use sqlx::SqlitePool;

    use crate::pool::{Database, DbConfig};

    pub const BRANCH: &str = "branch-1";
    pub const BRANCH_CODE: &str = "B01";
    pub const PHARMACIST: &str = "staff-1";
    pub const SESSION: &str = "session-1";
    pub const PHARMACIST_SESSION: &str = "psession-1";
    pub const CUSTOMER: &str = "customer-1";
    pub const CARD: &str = "CARD-0001";
    /// ₱50.00, stock 5
    pub const PARACETAMOL: &str = "prod-paracetamol";
    /// ₱120.00, stock 20
    pub const AMOXICILLIN: &str = "prod-amoxicillin";
    /// ₱15.00, stock 100
    pub const VITAMIN_C: &str = "prod-vitamin-c";

    pub async fn database() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed(db.pool()).await;
        db
    }

    pub async fn seed(pool: &SqlitePool) {
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO branches (id, branch_code, branch_name, status, created_at)
             VALUES (?1, ?2, 'Main Branch', 'ACTIVE', ?3)",
        )
        .bind(BRANCH)
        .bind(BRANCH_CODE)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO pharmacists (id, name, branch_id, pin_hash, status, created_at)
             VALUES (?1, 'Maria Santos', ?2, 'x', 'ACTIVE', ?3)",
        )
        .bind(PHARMACIST)
        .bind(BRANCH)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO sales_sessions (id, branch_id, opened_by, start_time, total_sales_cents)
             VALUES (?1, ?2, ?3, ?4, 0)",
        )
        .bind(SESSION)
        .bind(BRANCH)
        .bind(PHARMACIST)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO pharmacist_sessions (id, session_id, staff_id, share_bps, start_time)
             VALUES (?1, ?2, ?3, 10000, ?4)",
        )
        .bind(PHARMACIST_SESSION)
        .bind(SESSION)
        .bind(PHARMACIST)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();

        for (id, name, barcode, price, stock) in [
            (PARACETAMOL, "Paracetamol 500mg", "4800000000011", 5_000, 5),
            (AMOXICILLIN, "Amoxicillin 500mg", "4800000000028", 12_000, 20),
            (VITAMIN_C, "Ascorbic Acid 500mg", "4800000000035", 1_500, 100),
        ] {
            sqlx::query(
                "INSERT INTO products (id, name, barcode, price_cents, critical_level, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 10, ?5, ?5)",
            )
            .bind(id)
            .bind(name)
            .bind(barcode)
            .bind(Money::from_cents(price))
            .bind(now)
            .execute(pool)
            .await
            .unwrap();

            sqlx::query(
                "INSERT INTO branch_inventory (id, branch_id, product_id, stock, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'ACTIVE', ?5, ?5)",
            )
            .bind(format!("inv-{}", id))
            .bind(BRANCH)
            .bind(id)
            .bind(stock)
            .bind(now)
            .execute(pool)
            .await
            .unwrap();
        }

        sqlx::query(
            "INSERT INTO customers (id, name, status, created_at) VALUES (?1, 'Juan dela Cruz', 'ACTIVE', ?2)",
        )
        .bind(CUSTOMER)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();

        let balance = Points::from_whole(80);
        sqlx::query(
            "INSERT INTO loyalty_accounts
                (customer_id, card_id, points_balance, lifetime_earned, lifetime_redeemed, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3, 0, ?4, ?4)",
        )
        .bind(CUSTOMER)
        .bind(CARD)
        .bind(balance)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();
    }

    pub async fn stock_of(pool: &SqlitePool, product_id: &str) -> i64 {
        sqlx::query_scalar(
            "SELECT stock FROM branch_inventory WHERE branch_id = ?1 AND product_id = ?2 AND status = 'ACTIVE'",
        )
        .bind(BRANCH)
        .bind(product_id)
        .fetch_one(pool)
        .await
        .unwrap()
    }
}
