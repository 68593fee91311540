//! # Held Transactions
//!
//! Parked carts. A pharmacist puts a customer's basket on hold, serves the
//! next person, then recalls it and completes the sale.
//!
//! ```text
//!   hold()            recall (client)        checkout(heldTransactionId)
//!  ───────▶  HELD  ─────────────────────────────────────────▶  COMPLETED
//!              │
//!              └── discard() ───────────────────────────────▶  DISCARDED
//! ```
//!
//! Hold numbers count up from 1 within a session. The number is computed
//! inside the INSERT, under the write lock, so two holds in the same session
//! cannot share one.

use apotheca_core::checkout::{cart_subtotal, validate_hold, CheckoutRequest, HoldRequest};
use apotheca_core::{CoreError, HeldStatus, HeldTransaction, HeldTransactionItem, ValidationError};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use super::generate_id;
use super::product::ProductRepository;
use super::session::SessionAggregator;
use crate::error::{DbError, DbResult};

const HELD_COLUMNS: &str = "id, hold_number, session_id, branch_id, customer_id, subtotal_cents, note, \
     status, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct HeldTransactionRepository {
    pool: SqlitePool,
}

impl HeldTransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        HeldTransactionRepository { pool }
    }

    /// Parks a cart on an open session.
    pub async fn hold(&self, request: &HoldRequest) -> DbResult<HeldTransaction> {
        validate_hold(request)?;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let held: Option<HeldTransaction> = sqlx::query_as(&format!(
            r#"
            INSERT INTO held_transactions (
                id, hold_number, session_id, branch_id, customer_id,
                subtotal_cents, note, status, created_at, updated_at
            )
            SELECT ?1,
                   (SELECT COALESCE(MAX(hold_number), 0) + 1 FROM held_transactions WHERE session_id = s.id),
                   s.id, s.branch_id, ?2, ?3, ?4, ?5, ?6, ?6
              FROM sales_sessions s
             WHERE s.id = ?7 AND s.branch_id = ?8 AND s.end_time IS NULL
            RETURNING {}
            "#,
            HELD_COLUMNS
        ))
        .bind(generate_id())
        .bind(&request.customer_id)
        .bind(cart_subtotal(&request.items))
        .bind(&request.note)
        .bind(HeldStatus::Held)
        .bind(now)
        .bind(&request.session_id)
        .bind(&request.branch_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(held) = held else {
            return Err(Self::why_not_holdable(&mut tx, request).await);
        };

        for (index, item) in request.items.iter().enumerate() {
            ProductRepository::require_active(&mut tx, &item.product_id).await?;
            sqlx::query(
                r#"
                INSERT INTO held_transaction_items
                    (id, held_transaction_id, line_number, product_id, quantity, unit_price_cents, subtotal_cents)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(generate_id())
            .bind(&held.id)
            .bind(index as i64 + 1)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.subtotal())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            held_id = %held.id,
            hold_number = held.hold_number,
            session_id = %held.session_id,
            "Transaction held"
        );
        Ok(held)
    }

    async fn why_not_holdable(conn: &mut SqliteConnection, request: &HoldRequest) -> DbError {
        match SessionAggregator::find_in(conn, &request.session_id).await {
            Ok(None) => CoreError::SessionNotFound(request.session_id.clone()).into(),
            Ok(Some(session)) if !session.is_open() => {
                CoreError::SessionNotOpen(request.session_id.clone()).into()
            }
            Ok(Some(_)) => ValidationError::Mismatch {
                field: "branchId".to_string(),
                reason: "session belongs to another branch".to_string(),
            }
            .into(),
            Err(e) => e,
        }
    }

    /// Soft-deletes a held cart.
    pub async fn discard(&self, id: &str) -> DbResult<HeldTransaction> {
        let mut conn = self.pool.acquire().await?;
        let discarded = Self::transition(&mut conn, id, None, HeldStatus::Discarded).await?;
        info!(held_id = %id, "Held transaction discarded");
        Ok(discarded)
    }

    /// Marks a recalled cart as sold. Runs inside the checkout transaction.
    ///
    /// The sale must come from the session that parked the cart and carry
    /// exactly the parked lines (order aside).
    pub async fn mark_completed(
        conn: &mut SqliteConnection,
        id: &str,
        sale: &CheckoutRequest,
    ) -> DbResult<HeldTransaction> {
        let held: HeldTransaction = sqlx::query_as(&format!(
            "SELECT {} FROM held_transactions WHERE id = ?1",
            HELD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("HeldTransaction", id))?;

        if held.status != HeldStatus::Held {
            return Err(CoreError::HeldTransactionNotActive {
                id: id.to_string(),
                status: held.status.to_string(),
            }
            .into());
        }
        if held.session_id != sale.session_id || held.branch_id != sale.branch_id {
            return Err(ValidationError::Mismatch {
                field: "heldTransactionId".to_string(),
                reason: "held by another session".to_string(),
            }
            .into());
        }

        let mut parked: Vec<(String, i64, i64)> = sqlx::query_as(
            "SELECT product_id, quantity, unit_price_cents
               FROM held_transaction_items
              WHERE held_transaction_id = ?1",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
        let mut sold: Vec<(String, i64, i64)> = sale
            .items
            .iter()
            .map(|item| (item.product_id.clone(), item.quantity, item.unit_price_cents.cents()))
            .collect();
        parked.sort();
        sold.sort();
        if parked != sold {
            return Err(ValidationError::Mismatch {
                field: "items".to_string(),
                reason: "cart differs from the held transaction".to_string(),
            }
            .into());
        }

        Self::transition(conn, id, Some(&sale.session_id), HeldStatus::Completed).await
    }

    /// `HELD → to`, guarded in the UPDATE itself. `session_id` further pins
    /// the cart to its owning session.
    async fn transition(
        conn: &mut SqliteConnection,
        id: &str,
        session_id: Option<&str>,
        to: HeldStatus,
    ) -> DbResult<HeldTransaction> {
        let updated: Option<HeldTransaction> = sqlx::query_as(&format!(
            "UPDATE held_transactions SET status = ?1, updated_at = ?2
             WHERE id = ?3 AND status = ?4 AND (?5 IS NULL OR session_id = ?5)
             RETURNING {}",
            HELD_COLUMNS
        ))
        .bind(to)
        .bind(Utc::now())
        .bind(id)
        .bind(HeldStatus::Held)
        .bind(session_id)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(held) = updated {
            return Ok(held);
        }

        let status: Option<HeldStatus> =
            sqlx::query_scalar("SELECT status FROM held_transactions WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

        Err(match status {
            Some(status) => CoreError::HeldTransactionNotActive {
                id: id.to_string(),
                status: status.to_string(),
            }
            .into(),
            None => DbError::not_found("HeldTransaction", id),
        })
    }

    // ===== Reads =====

    pub async fn get(&self, id: &str) -> DbResult<Option<HeldTransaction>> {
        let held = sqlx::query_as(&format!("SELECT {} FROM held_transactions WHERE id = ?1", HELD_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(held)
    }

    /// Held carts of a session; `show_all` includes completed and discarded.
    pub async fn list_for_session(&self, session_id: &str, show_all: bool) -> DbResult<Vec<HeldTransaction>> {
        let held = sqlx::query_as(&format!(
            "SELECT {} FROM held_transactions
             WHERE session_id = ?1 AND (?2 OR status = 'HELD')
             ORDER BY hold_number",
            HELD_COLUMNS
        ))
        .bind(session_id)
        .bind(show_all)
        .fetch_all(&self.pool)
        .await?;
        Ok(held)
    }

    /// Lines of a held cart with current product names.
    pub async fn items(&self, held_id: &str) -> DbResult<Vec<HeldTransactionItem>> {
        let items = sqlx::query_as(
            r#"
            SELECT hi.id, hi.held_transaction_id, hi.line_number, hi.product_id,
                   p.name AS product_name, hi.quantity, hi.unit_price_cents, hi.subtotal_cents
              FROM held_transaction_items hi
              JOIN products p ON p.id = hi.product_id
             WHERE hi.held_transaction_id = ?1
             ORDER BY hi.line_number
            "#,
        )
        .bind(held_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
