//! # Dashboard Repository
//!
//! Read-only views for the management dashboard.

use apotheca_core::{LowStockItem, Sale};
use sqlx::SqlitePool;

use super::sale::SALE_COLUMNS;
use crate::error::DbResult;

/// Upper bound for `recent_sales`.
pub const MAX_RECENT_SALES: i64 = 100;

#[derive(Debug, Clone)]
pub struct DashboardRepository {
    pool: SqlitePool,
}

impl DashboardRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DashboardRepository { pool }
    }

    /// Active products whose branch stock is at or below their critical level,
    /// emptiest first.
    pub async fn low_stock(&self, branch_id: &str) -> DbResult<Vec<LowStockItem>> {
        let items = sqlx::query_as(
            r#"
            SELECT p.id AS product_id, p.name, p.brand_name, i.stock, p.critical_level, i.expiry_date
              FROM branch_inventory i
              JOIN products p ON p.id = i.product_id
             WHERE i.branch_id = ?1
               AND i.status = 'ACTIVE'
               AND p.status = 'ACTIVE'
               AND i.stock <= p.critical_level
             ORDER BY i.stock, p.name
            "#,
        )
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Latest sales at a branch, newest first.
    pub async fn recent_sales(&self, branch_id: &str, limit: i64) -> DbResult<Vec<Sale>> {
        let limit = limit.clamp(1, MAX_RECENT_SALES);
        let sales = sqlx::query_as(&format!(
            "SELECT {} FROM sales WHERE branch_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            SALE_COLUMNS
        ))
        .bind(branch_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(sales)
    }
}
