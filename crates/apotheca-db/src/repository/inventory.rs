//! # Inventory Adjuster
//!
//! Branch stock changes, each paired with an `inventory_history` audit row.
//!
//! ## Conditional Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE branch_inventory                                                │
//! │     SET stock = stock + :delta                                          │
//! │   WHERE branch_id = :b AND product_id = :p AND status = 'ACTIVE'        │
//! │     AND stock + :delta >= 0                                             │
//! │  RETURNING id, stock                                                    │
//! │       │                                                                 │
//! │       ├── 1 row  → write audit row (previous = stock - delta)           │
//! │       │                                                                 │
//! │       └── 0 rows → look again:                                          │
//! │              ├── no ACTIVE row     → InventoryNotFound                  │
//! │              └── row with stock s  → InsufficientStock { available: s } │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The check and the write are one statement, so two checkouts racing for
//! the last box cannot both succeed.

use apotheca_core::{CoreError, InventoryMovement, InventoryRecord, MovementReason};
use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::generate_id;
use crate::error::{DbError, DbResult};

const INVENTORY_COLUMNS: &str =
    "id, branch_id, product_id, stock, expiry_date, status, updated_at";

const MOVEMENT_COLUMNS: &str =
    "id, inventory_id, reason, quantity_delta, previous_stock, current_stock, reference_id, created_at";

/// A relative stock change for one product at one branch.
#[derive(Debug, Clone)]
pub struct StockAdjustment {
    pub branch_id: String,
    pub product_id: String,
    /// Negative for sales, positive for returns.
    pub delta: i64,
    pub reason: MovementReason,
    /// Sale, return or import id.
    pub reference_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InventoryAdjuster {
    pool: SqlitePool,
}

impl InventoryAdjuster {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryAdjuster { pool }
    }

    // ===== Transaction steps =====

    /// Applies `adjustment.delta` and writes the audit row.
    pub async fn adjust(
        conn: &mut SqliteConnection,
        adjustment: &StockAdjustment,
    ) -> DbResult<InventoryMovement> {
        let now = Utc::now();

        let updated: Option<(String, i64)> = sqlx::query_as(
            r#"
            UPDATE branch_inventory
               SET stock = stock + ?1, updated_at = ?2
             WHERE branch_id = ?3 AND product_id = ?4 AND status = 'ACTIVE'
               AND stock + ?1 >= 0
            RETURNING id, stock
            "#,
        )
        .bind(adjustment.delta)
        .bind(now)
        .bind(&adjustment.branch_id)
        .bind(&adjustment.product_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some((inventory_id, current_stock)) = updated else {
            let available: Option<i64> = sqlx::query_scalar(
                "SELECT stock FROM branch_inventory
                 WHERE branch_id = ?1 AND product_id = ?2 AND status = 'ACTIVE'",
            )
            .bind(&adjustment.branch_id)
            .bind(&adjustment.product_id)
            .fetch_optional(&mut *conn)
            .await?;

            return Err(match available {
                None => CoreError::InventoryNotFound {
                    branch_id: adjustment.branch_id.clone(),
                    product_id: adjustment.product_id.clone(),
                },
                Some(available) => CoreError::InsufficientStock {
                    product_id: adjustment.product_id.clone(),
                    available,
                    requested: -adjustment.delta,
                },
            }
            .into());
        };

        let movement = InventoryMovement {
            id: generate_id(),
            inventory_id,
            reason: adjustment.reason,
            quantity_delta: adjustment.delta,
            previous_stock: current_stock - adjustment.delta,
            current_stock,
            reference_id: adjustment.reference_id.clone(),
            created_at: now,
        };
        Self::insert_movement(conn, &movement).await?;

        debug!(
            product_id = %adjustment.product_id,
            delta = adjustment.delta,
            stock = current_stock,
            "Stock adjusted"
        );
        Ok(movement)
    }

    /// Sets an absolute stock level on one inventory row.
    ///
    /// The audit row is written first, straight from the pre-image, so the
    /// recorded previous stock is the value the update replaced.
    pub async fn set_stock(
        conn: &mut SqliteConnection,
        inventory_id: &str,
        new_stock: i64,
        expiry_date: Option<NaiveDate>,
        reference_id: Option<&str>,
    ) -> DbResult<InventoryMovement> {
        apotheca_core::validation::validate_stock_level(new_stock)?;
        let now = Utc::now();

        let movement: Option<InventoryMovement> = sqlx::query_as(&format!(
            r#"
            INSERT INTO inventory_history
                (id, inventory_id, reason, quantity_delta, previous_stock, current_stock, reference_id, created_at)
            SELECT ?1, bi.id, ?2, ?3 - bi.stock, bi.stock, ?3, ?4, ?5
              FROM branch_inventory bi
             WHERE bi.id = ?6 AND bi.status = 'ACTIVE'
            RETURNING {}
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(generate_id())
        .bind(MovementReason::BulkImport)
        .bind(new_stock)
        .bind(reference_id)
        .bind(now)
        .bind(inventory_id)
        .fetch_optional(&mut *conn)
        .await?;

        let movement = movement.ok_or_else(|| DbError::not_found("Inventory", inventory_id))?;
        Self::overwrite(conn, &movement, expiry_date).await?;
        Ok(movement)
    }

    /// Bulk-import variant of [`set_stock`](Self::set_stock) keyed by barcode.
    ///
    /// Returns `None` when the branch has no ACTIVE row for that barcode.
    /// The statement is a write even when it matches nothing, so it also
    /// takes the database write lock for the surrounding transaction.
    pub async fn set_stock_by_barcode(
        conn: &mut SqliteConnection,
        branch_id: &str,
        barcode: &str,
        new_stock: i64,
        expiry_date: Option<NaiveDate>,
        reference_id: Option<&str>,
    ) -> DbResult<Option<InventoryMovement>> {
        apotheca_core::validation::validate_stock_level(new_stock)?;
        let now = Utc::now();

        let movement: Option<InventoryMovement> = sqlx::query_as(&format!(
            r#"
            INSERT INTO inventory_history
                (id, inventory_id, reason, quantity_delta, previous_stock, current_stock, reference_id, created_at)
            SELECT ?1, bi.id, ?2, ?3 - bi.stock, bi.stock, ?3, ?4, ?5
              FROM branch_inventory bi
              JOIN products p ON p.id = bi.product_id
             WHERE bi.branch_id = ?6 AND p.barcode = ?7 AND bi.status = 'ACTIVE'
            RETURNING {}
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(generate_id())
        .bind(MovementReason::BulkImport)
        .bind(new_stock)
        .bind(reference_id)
        .bind(now)
        .bind(branch_id)
        .bind(barcode)
        .fetch_optional(&mut *conn)
        .await?;

        match movement {
            Some(movement) => {
                Self::overwrite(conn, &movement, expiry_date).await?;
                Ok(Some(movement))
            }
            None => Ok(None),
        }
    }

    async fn overwrite(
        conn: &mut SqliteConnection,
        movement: &InventoryMovement,
        expiry_date: Option<NaiveDate>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE branch_inventory
               SET stock = ?1, expiry_date = COALESCE(?2, expiry_date), updated_at = ?3
             WHERE id = ?4
            "#,
        )
        .bind(movement.current_stock)
        .bind(expiry_date)
        .bind(movement.created_at)
        .bind(&movement.inventory_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Creates the ACTIVE stock row for a product new to the branch.
    pub async fn create_record(
        conn: &mut SqliteConnection,
        branch_id: &str,
        product_id: &str,
        stock: i64,
        expiry_date: Option<NaiveDate>,
        reference_id: Option<&str>,
    ) -> DbResult<InventoryRecord> {
        apotheca_core::validation::validate_stock_level(stock)?;
        let now = Utc::now();

        let record: InventoryRecord = sqlx::query_as(&format!(
            r#"
            INSERT INTO branch_inventory
                (id, branch_id, product_id, stock, expiry_date, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 'ACTIVE', ?6, ?6)
            RETURNING {}
            "#,
            INVENTORY_COLUMNS
        ))
        .bind(generate_id())
        .bind(branch_id)
        .bind(product_id)
        .bind(stock)
        .bind(expiry_date)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        if stock > 0 {
            let movement = InventoryMovement {
                id: generate_id(),
                inventory_id: record.id.clone(),
                reason: MovementReason::BulkImport,
                quantity_delta: stock,
                previous_stock: 0,
                current_stock: stock,
                reference_id: reference_id.map(str::to_string),
                created_at: now,
            };
            Self::insert_movement(conn, &movement).await?;
        }

        Ok(record)
    }

    /// The ACTIVE row for a product at a branch, read inside a transaction.
    pub async fn find_active_in(
        conn: &mut SqliteConnection,
        branch_id: &str,
        product_id: &str,
    ) -> DbResult<Option<InventoryRecord>> {
        let record = sqlx::query_as(&format!(
            "SELECT {} FROM branch_inventory
             WHERE branch_id = ?1 AND product_id = ?2 AND status = 'ACTIVE'",
            INVENTORY_COLUMNS
        ))
        .bind(branch_id)
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(record)
    }

    async fn insert_movement(
        conn: &mut SqliteConnection,
        movement: &InventoryMovement,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_history
                (id, inventory_id, reason, quantity_delta, previous_stock, current_stock, reference_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.inventory_id)
        .bind(movement.reason)
        .bind(movement.quantity_delta)
        .bind(movement.previous_stock)
        .bind(movement.current_stock)
        .bind(&movement.reference_id)
        .bind(movement.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    // ===== Reads =====

    pub async fn get_active(
        &self,
        branch_id: &str,
        product_id: &str,
    ) -> DbResult<Option<InventoryRecord>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_active_in(&mut conn, branch_id, product_id).await
    }

    /// Audit trail for one inventory row, oldest first.
    pub async fn movements(&self, inventory_id: &str) -> DbResult<Vec<InventoryMovement>> {
        let rows = sqlx::query_as(&format!(
            "SELECT {} FROM inventory_history WHERE inventory_id = ?1 ORDER BY created_at, rowid",
            MOVEMENT_COLUMNS
        ))
        .bind(inventory_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixture::{self, AMOXICILLIN, BRANCH, PARACETAMOL};

    fn sale_of(product_id: &str, qty: i64) -> StockAdjustment {
        StockAdjustment {
            branch_id: BRANCH.to_string(),
            product_id: product_id.to_string(),
            delta: -qty,
            reason: MovementReason::Sale,
            reference_id: Some("sale-1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_adjust_decrements_and_audits() {
        let db = fixture::database().await;

        let movement = {
            let mut conn = db.pool().acquire().await.unwrap();
            InventoryAdjuster::adjust(&mut conn, &sale_of(AMOXICILLIN, 3)).await.unwrap()
        };

        assert_eq!(movement.previous_stock, 20);
        assert_eq!(movement.current_stock, 17);
        assert_eq!(movement.quantity_delta, -3);
        assert_eq!(fixture::stock_of(db.pool(), AMOXICILLIN).await, 17);

        let trail = db.inventory().movements(&movement.inventory_id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].reason, MovementReason::Sale);
    }

    #[tokio::test]
    async fn test_adjust_rejects_negative_stock() {
        let db = fixture::database().await;

        let err = {
            let mut conn = db.pool().acquire().await.unwrap();
            InventoryAdjuster::adjust(&mut conn, &sale_of(PARACETAMOL, 7)).await.unwrap_err()
        };

        match err {
            DbError::Rule(CoreError::InsufficientStock { available, requested, .. }) => {
                assert_eq!(available, 5);
                assert_eq!(requested, 7);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fixture::stock_of(db.pool(), PARACETAMOL).await, 5);
    }

    #[tokio::test]
    async fn test_adjust_missing_inventory() {
        let db = fixture::database().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let err = InventoryAdjuster::adjust(&mut conn, &sale_of("no-such-product", 1))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_set_stock_records_pre_image() {
        let db = fixture::database().await;
        let inventory_id = format!("inv-{}", AMOXICILLIN);

        let movement = {
            let mut conn = db.pool().acquire().await.unwrap();
            InventoryAdjuster::set_stock(&mut conn, &inventory_id, 50, None, Some("import-1"))
                .await
                .unwrap()
        };

        assert_eq!(movement.previous_stock, 20);
        assert_eq!(movement.current_stock, 50);
        assert_eq!(movement.quantity_delta, 30);
        assert_eq!(movement.reason, MovementReason::BulkImport);
        assert_eq!(fixture::stock_of(db.pool(), AMOXICILLIN).await, 50);
    }

    #[tokio::test]
    async fn test_set_stock_rejects_negative() {
        let db = fixture::database().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let err = InventoryAdjuster::set_stock(&mut conn, "inv-x", -1, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::Validation(_))));
    }
}
