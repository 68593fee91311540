//! # Returns
//!
//! Refunds against a completed sale. Returned quantities go back on the
//! shelf (`RETURN` movement) and the sale moves to `PARTIALLY_RETURNED` or
//! `RETURNED`.
//!
//! A product can never be returned more times than it was sold, counting
//! every earlier return of the same sale. Refunds use the unit price on the
//! receipt, not today's shelf price.

use std::collections::BTreeMap;

use apotheca_core::checkout::{validate_return, ReturnRequest};
use apotheca_core::{CoreError, Money, MovementReason, ReturnItem, SaleStatus, SalesReturn};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use super::generate_id;
use super::inventory::{InventoryAdjuster, StockAdjustment};
use super::sale::SaleRecorder;
use crate::error::DbResult;

const RETURN_COLUMNS: &str = "id, sale_id, branch_id, pharmacist_session_id, reason, refund_cents, created_at";

const RETURN_ITEM_COLUMNS: &str = "id, return_id, product_id, quantity, unit_price_cents, subtotal_cents";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnReceipt {
    #[serde(rename = "return")]
    pub sales_return: SalesReturn,
    pub items: Vec<ReturnItem>,
    pub sale_status: SaleStatus,
}

#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    /// Records a return, restocks the items and updates the sale status.
    pub async fn process_return(&self, request: &ReturnRequest) -> DbResult<ReturnReceipt> {
        validate_return(request)?;

        // Same product on two lines counts as one request.
        let mut requested: BTreeMap<&str, i64> = BTreeMap::new();
        for item in &request.items {
            *requested.entry(item.product_id.as_str()).or_default() += item.quantity;
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let header: Option<SalesReturn> = sqlx::query_as(&format!(
            r#"
            INSERT INTO sales_returns (id, sale_id, branch_id, pharmacist_session_id, reason, refund_cents, created_at)
            SELECT ?1, s.id, s.branch_id, ?2, ?3, 0, ?4
              FROM sales s
             WHERE s.id = ?5
            RETURNING {}
            "#,
            RETURN_COLUMNS
        ))
        .bind(generate_id())
        .bind(&request.pharmacist_session_id)
        .bind(request.reason.trim())
        .bind(now)
        .bind(&request.sale_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut header) = header else {
            return Err(CoreError::SaleNotFound(request.sale_id.clone()).into());
        };

        let sold = SaleRecorder::sold_lines(&mut tx, &request.sale_id).await?;
        let mut items = Vec::with_capacity(requested.len());
        let mut refund = Money::zero();

        for (product_id, quantity) in &requested {
            let line = sold.iter().find(|l| l.product_id == *product_id);
            let remaining = line.map_or(0, |l| l.returnable());
            let Some(line) = line.filter(|_| *quantity <= remaining) else {
                return Err(CoreError::ReturnExceedsSold {
                    product_id: product_id.to_string(),
                    remaining,
                    requested: *quantity,
                }
                .into());
            };

            let item = ReturnItem {
                id: generate_id(),
                return_id: header.id.clone(),
                product_id: product_id.to_string(),
                quantity: *quantity,
                unit_price_cents: line.unit_price_cents,
                subtotal_cents: line.unit_price_cents.multiply_quantity(*quantity),
            };

            sqlx::query(
                r#"
                INSERT INTO return_items (id, return_id, product_id, quantity, unit_price_cents, subtotal_cents)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&item.id)
            .bind(&item.return_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.subtotal_cents)
            .execute(&mut *tx)
            .await?;

            InventoryAdjuster::adjust(
                &mut tx,
                &StockAdjustment {
                    branch_id: header.branch_id.clone(),
                    product_id: item.product_id.clone(),
                    delta: item.quantity,
                    reason: MovementReason::Return,
                    reference_id: Some(header.id.clone()),
                },
            )
            .await?;

            refund += item.subtotal_cents;
            items.push(item);
        }

        sqlx::query("UPDATE sales_returns SET refund_cents = ?1 WHERE id = ?2")
            .bind(refund)
            .bind(&header.id)
            .execute(&mut *tx)
            .await?;
        header.refund_cents = refund;

        let fully_returned = sold.iter().all(|line| {
            let now_returned = requested.get(line.product_id.as_str()).copied().unwrap_or(0);
            line.returned + now_returned >= line.sold
        });
        let sale_status = if fully_returned {
            SaleStatus::Returned
        } else {
            SaleStatus::PartiallyReturned
        };
        SaleRecorder::update_status(&mut tx, &request.sale_id, sale_status).await?;

        tx.commit().await?;

        info!(
            return_id = %header.id,
            sale_id = %request.sale_id,
            refund = %refund,
            "Return processed"
        );
        Ok(ReturnReceipt {
            sales_return: header,
            items,
            sale_status,
        })
    }

    pub async fn list_for_sale(&self, sale_id: &str) -> DbResult<Vec<SalesReturn>> {
        let returns = sqlx::query_as(&format!(
            "SELECT {} FROM sales_returns WHERE sale_id = ?1 ORDER BY created_at, rowid",
            RETURN_COLUMNS
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(returns)
    }

    pub async fn items(&self, return_id: &str) -> DbResult<Vec<ReturnItem>> {
        let items = sqlx::query_as(&format!(
            "SELECT {} FROM return_items WHERE return_id = ?1 ORDER BY rowid",
            RETURN_ITEM_COLUMNS
        ))
        .bind(return_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
