//! # Sale Recorder
//!
//! Writes a completed sale: header, line items and payment.
//!
//! ## What Gets Written
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_sale(conn, header, items, payment)                             │
//! │       │                                                                 │
//! │       ├── items non-empty, quantity > 0                                │
//! │       ├── Σ quantity × unit_price == header.subtotal (exact centavos)  │
//! │       ├── tendered > 0 when total > 0                                  │
//! │       ├── every product exists and is ACTIVE                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  sales          (1 row)                                                │
//! │  sale_items     (1 row per line, input order, line_number 1..n)        │
//! │  sale_payments  (1 row)                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Unit prices are snapshotted on the item, so later price changes never
//! rewrite a receipt.

use apotheca_core::checkout::{LineItemInput, SaleTotals};
use apotheca_core::{
    CoreError, DiscountType, Money, Payment, PaymentMethod, Points, Sale, SaleDetail, SaleItem,
    SaleStatus, ValidationError,
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::generate_id;
use super::product::ProductRepository;
use crate::error::DbResult;

pub(crate) const SALE_COLUMNS: &str = "id, invoice_number, branch_id, session_id, pharmacist_session_id, \
     customer_id, payment_method, discount_type, discount_id_number, subtotal_cents, discount_cents, \
     tax_cents, total_cents, points_earned, points_redeemed, daily_sequence, business_date, status, created_at";

const ITEM_COLUMNS: &str =
    "id, sale_id, line_number, product_id, quantity, unit_price_cents, subtotal_cents";

const PAYMENT_COLUMNS: &str =
    "id, sale_id, payment_method, amount_tendered_cents, change_cents, reference_number, created_at";

/// Everything about a sale except its lines and payment.
#[derive(Debug, Clone)]
pub struct NewSale {
    pub invoice_number: String,
    pub branch_id: String,
    pub session_id: String,
    pub pharmacist_session_id: String,
    pub customer_id: Option<String>,
    pub discount_type: DiscountType,
    pub discount_id_number: Option<String>,
    pub totals: SaleTotals,
    pub points_earned: Points,
    pub points_redeemed: Points,
    pub daily_sequence: i64,
    pub business_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub payment_method: PaymentMethod,
    pub amount_tendered_cents: Money,
    pub change_cents: Money,
    pub reference_number: Option<String>,
}

/// Quantity sold and already returned for one product of a sale.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SoldLine {
    pub product_id: String,
    pub sold: i64,
    pub returned: i64,
    pub unit_price_cents: Money,
}

impl SoldLine {
    pub fn returnable(&self) -> i64 {
        self.sold - self.returned
    }
}

#[derive(Debug, Clone)]
pub struct SaleRecorder {
    pool: SqlitePool,
}

impl SaleRecorder {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRecorder { pool }
    }

    // ===== Transaction steps =====

    /// Validates and persists a sale. Returns the new sale id.
    pub async fn record_sale(
        conn: &mut SqliteConnection,
        header: &NewSale,
        items: &[LineItemInput],
        payment: &NewPayment,
    ) -> DbResult<String> {
        Self::check(header, items, payment)?;
        for item in items {
            ProductRepository::require_active(conn, &item.product_id).await?;
        }

        let sale_id = generate_id();
        let totals = &header.totals;

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, invoice_number, branch_id, session_id, pharmacist_session_id,
                customer_id, payment_method, discount_type, discount_id_number,
                subtotal_cents, discount_cents, tax_cents, total_cents,
                points_earned, points_redeemed, daily_sequence, business_date,
                status, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9,
                ?10, ?11, ?12, ?13,
                ?14, ?15, ?16, ?17,
                ?18, ?19
            )
            "#,
        )
        .bind(&sale_id)
        .bind(&header.invoice_number)
        .bind(&header.branch_id)
        .bind(&header.session_id)
        .bind(&header.pharmacist_session_id)
        .bind(&header.customer_id)
        .bind(payment.payment_method)
        .bind(header.discount_type)
        .bind(&header.discount_id_number)
        .bind(totals.subtotal_cents)
        .bind(totals.discount_cents)
        .bind(totals.tax_cents)
        .bind(totals.total_cents)
        .bind(header.points_earned)
        .bind(header.points_redeemed)
        .bind(header.daily_sequence)
        .bind(header.business_date)
        .bind(SaleStatus::Completed)
        .bind(header.created_at)
        .execute(&mut *conn)
        .await?;

        for (index, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sale_items (id, sale_id, line_number, product_id, quantity, unit_price_cents, subtotal_cents)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(generate_id())
            .bind(&sale_id)
            .bind(index as i64 + 1)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.subtotal())
            .execute(&mut *conn)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO sale_payments (id, sale_id, payment_method, amount_tendered_cents, change_cents, reference_number, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(generate_id())
        .bind(&sale_id)
        .bind(payment.payment_method)
        .bind(payment.amount_tendered_cents)
        .bind(payment.change_cents)
        .bind(&payment.reference_number)
        .bind(header.created_at)
        .execute(&mut *conn)
        .await?;

        debug!(
            sale_id = %sale_id,
            invoice_number = %header.invoice_number,
            lines = items.len(),
            "Sale recorded"
        );
        Ok(sale_id)
    }

    fn check(header: &NewSale, items: &[LineItemInput], payment: &NewPayment) -> DbResult<()> {
        if items.is_empty() {
            return Err(ValidationError::required("items").into());
        }
        for item in items {
            if item.quantity <= 0 {
                return Err(ValidationError::MustBePositive {
                    field: "quantity".to_string(),
                }
                .into());
            }
        }

        let line_total: Money = items.iter().map(LineItemInput::subtotal).sum();
        if line_total != header.totals.subtotal_cents {
            return Err(ValidationError::Mismatch {
                field: "subtotalCents".to_string(),
                reason: format!(
                    "items sum to {} but header says {}",
                    line_total, header.totals.subtotal_cents
                ),
            }
            .into());
        }

        if header.totals.total_cents.is_positive() && !payment.amount_tendered_cents.is_positive() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "tendered amount must be positive".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Per-product sold and returned quantities, read inside a transaction.
    pub async fn sold_lines(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SoldLine>> {
        let lines = sqlx::query_as(
            r#"
            SELECT si.product_id AS product_id,
                   SUM(si.quantity) AS sold,
                   COALESCE((SELECT SUM(ri.quantity)
                               FROM return_items ri
                               JOIN sales_returns sr ON sr.id = ri.return_id
                              WHERE sr.sale_id = si.sale_id AND ri.product_id = si.product_id), 0) AS returned,
                   MIN(si.unit_price_cents) AS unit_price_cents
              FROM sale_items si
             WHERE si.sale_id = ?1
             GROUP BY si.product_id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(lines)
    }

    pub async fn update_status(
        conn: &mut SqliteConnection,
        sale_id: &str,
        status: SaleStatus,
    ) -> DbResult<()> {
        sqlx::query("UPDATE sales SET status = ?1 WHERE id = ?2")
            .bind(status)
            .bind(sale_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    // ===== Reads =====

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as(&format!("SELECT {} FROM sales WHERE id = ?1", SALE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sale)
    }

    pub async fn get_by_invoice_number(&self, invoice_number: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as(&format!(
            "SELECT {} FROM sales WHERE invoice_number = ?1",
            SALE_COLUMNS
        ))
        .bind(invoice_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(sale)
    }

    /// Lines in receipt order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as(&format!(
            "SELECT {} FROM sale_items WHERE sale_id = ?1 ORDER BY line_number",
            ITEM_COLUMNS
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn get_payment(&self, sale_id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as(&format!(
            "SELECT {} FROM sale_payments WHERE sale_id = ?1",
            PAYMENT_COLUMNS
        ))
        .bind(sale_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(payment)
    }

    /// Sale with its items and payment.
    pub async fn get_detail(&self, id: &str) -> DbResult<Option<SaleDetail>> {
        let Some(sale) = self.get_by_id(id).await? else {
            return Ok(None);
        };
        let items = self.get_items(id).await?;
        let payment = self.get_payment(id).await?;

        Ok(Some(SaleDetail {
            sale,
            items,
            payment,
        }))
    }

    pub async fn list_for_session(&self, session_id: &str) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as(&format!(
            "SELECT {} FROM sales WHERE session_id = ?1 ORDER BY daily_sequence",
            SALE_COLUMNS
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sales)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
