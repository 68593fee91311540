//! # Product Repository
//!
//! Catalogue reads for the counter, product creation and bulk stock import.
//!
//! ## Search Ranking
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  query "amox", branch B01                                               │
//! │                                                                         │
//! │  rank 0  barcode = query           (scanner typed into the search box) │
//! │  rank 1  name LIKE 'amox%'                                             │
//! │  rank 2  brand_name LIKE 'amox%'                                       │
//! │  rank 3  name/brand/category LIKE '%amox%'                             │
//! │                                                                         │
//! │  then by name, LIMIT 50; stock and expiry from the branch's ACTIVE     │
//! │  inventory row (NULL when the branch does not carry the product)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use apotheca_core::validation::{validate_name, validate_price_cents, validate_search_query};
use apotheca_core::{CoreError, Money, Product, ProductListing, RecordStatus, SEARCH_RESULT_LIMIT};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::inventory::InventoryAdjuster;
use super::{escape_like, generate_id};
use crate::error::{DbError, DbResult};

pub(crate) const PRODUCT_COLUMNS: &str = "id, name, brand_name, barcode, category, dosage, price_cents, \
     markup_bps, critical_level, requires_prescription, status, created_at, updated_at";

const LISTING_SELECT: &str = r#"
    SELECT p.id, p.name, p.brand_name, p.barcode, p.dosage, p.price_cents,
           p.requires_prescription, bi.stock AS stock, bi.expiry_date AS expiry_date
      FROM products p
      LEFT JOIN branch_inventory bi
             ON bi.product_id = p.id AND bi.branch_id = ?1 AND bi.status = 'ACTIVE'
"#;

/// Most rows a single bulk import may carry.
pub const MAX_IMPORT_ROWS: usize = 5_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub brand_name: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub dosage: Option<String>,
    pub price_cents: Money,
    #[serde(default)]
    pub markup_bps: i64,
    #[serde(default = "default_critical_level")]
    pub critical_level: i64,
    #[serde(default)]
    pub requires_prescription: bool,
}

fn default_critical_level() -> i64 {
    10
}

/// One line of a supplier delivery sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRow {
    pub barcode: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub brand_name: Option<String>,
    #[serde(default)]
    pub price_cents: Option<Money>,
    pub quantity: i64,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRow {
    /// Zero-based index into the submitted rows.
    pub row: usize,
    pub barcode: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub import_id: String,
    /// Existing inventory rows whose stock was replaced.
    pub updated: usize,
    /// Known products newly stocked at this branch.
    pub stocked: usize,
    /// Products created from the sheet.
    pub created: usize,
    pub skipped: Vec<SkippedRow>,
}

#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    // ===== Counter reads =====

    /// Ranked product search. Queries shorter than 3 characters are rejected.
    pub async fn search(&self, query: &str, branch_id: Option<&str>) -> DbResult<Vec<ProductListing>> {
        let query = validate_search_query(query)?;
        let escaped = escape_like(&query);
        let contains = format!("%{}%", escaped);
        let prefix = format!("{}%", escaped);

        debug!(query = %query, branch_id = ?branch_id, "Searching products");

        let listings = sqlx::query_as(&format!(
            r#"
            {}
             WHERE p.status = 'ACTIVE'
               AND (p.barcode = ?2
                    OR p.name LIKE ?3 ESCAPE '\'
                    OR p.brand_name LIKE ?3 ESCAPE '\'
                    OR p.category LIKE ?3 ESCAPE '\')
             ORDER BY CASE
                        WHEN p.barcode = ?2 THEN 0
                        WHEN p.name LIKE ?4 ESCAPE '\' THEN 1
                        WHEN p.brand_name LIKE ?4 ESCAPE '\' THEN 2
                        ELSE 3
                      END,
                      p.name
             LIMIT ?5
            "#,
            LISTING_SELECT
        ))
        .bind(branch_id)
        .bind(&query)
        .bind(&contains)
        .bind(&prefix)
        .bind(SEARCH_RESULT_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(listings)
    }

    /// Exact barcode lookup for scanners.
    pub async fn get_by_barcode(
        &self,
        barcode: &str,
        branch_id: Option<&str>,
    ) -> DbResult<Option<ProductListing>> {
        let listing = sqlx::query_as(&format!(
            "{} WHERE p.barcode = ?2 AND p.status = 'ACTIVE'",
            LISTING_SELECT
        ))
        .bind(branch_id)
        .bind(barcode)
        .fetch_optional(&self.pool)
        .await?;

        Ok(listing)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as(&format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    pub async fn create(&self, product: &NewProduct) -> DbResult<Product> {
        let mut conn = self.pool.acquire().await?;
        Self::insert(&mut conn, product).await
    }

    // ===== Transaction steps =====

    pub async fn insert(conn: &mut SqliteConnection, product: &NewProduct) -> DbResult<Product> {
        validate_name("name", &product.name, 200)?;
        validate_price_cents("priceCents", product.price_cents.cents())?;
        let now = Utc::now();

        let created = sqlx::query_as(&format!(
            r#"
            INSERT INTO products (
                id, name, brand_name, barcode, category, dosage, price_cents,
                markup_bps, critical_level, requires_prescription, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(generate_id())
        .bind(product.name.trim())
        .bind(&product.brand_name)
        .bind(&product.barcode)
        .bind(&product.category)
        .bind(&product.dosage)
        .bind(product.price_cents)
        .bind(product.markup_bps)
        .bind(product.critical_level)
        .bind(product.requires_prescription)
        .bind(RecordStatus::Active)
        .bind(now)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => {
                DbError::duplicate("barcode", product.barcode.clone().unwrap_or_default())
            }
            other => other,
        })?;

        Ok(created)
    }

    /// Fails with `ProductNotFound` unless the product exists and is ACTIVE.
    pub async fn require_active(conn: &mut SqliteConnection, product_id: &str) -> DbResult<()> {
        let status: Option<RecordStatus> =
            sqlx::query_scalar("SELECT status FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_optional(&mut *conn)
                .await?;

        match status {
            Some(RecordStatus::Active) => Ok(()),
            _ => Err(CoreError::ProductNotFound(product_id.to_string()).into()),
        }
    }

    pub async fn find_by_barcode_in(
        conn: &mut SqliteConnection,
        barcode: &str,
    ) -> DbResult<Option<Product>> {
        let product = sqlx::query_as(&format!(
            "SELECT {} FROM products WHERE barcode = ?1",
            PRODUCT_COLUMNS
        ))
        .bind(barcode)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(product)
    }

    /// Replaces a product's shelf price.
    pub async fn set_price(
        conn: &mut SqliteConnection,
        product_id: &str,
        price: Money,
        markup_bps: i64,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE products SET price_cents = ?1, markup_bps = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(price)
        .bind(markup_bps)
        .bind(Utc::now())
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(product_id.to_string()).into());
        }
        Ok(())
    }

    // ===== Bulk import =====

    /// Applies a delivery sheet to one branch in a single transaction.
    ///
    /// ```text
    /// barcode known, stocked here   → stock set to quantity (BULK_IMPORT)
    /// barcode known, not stocked    → inventory row created
    /// barcode unknown, name + price → product and inventory row created
    /// anything else                 → skipped with a reason
    /// ```
    pub async fn bulk_import(&self, branch_id: &str, rows: &[ImportRow]) -> DbResult<ImportSummary> {
        if rows.is_empty() {
            return Err(apotheca_core::ValidationError::required("rows").into());
        }
        if rows.len() > MAX_IMPORT_ROWS {
            return Err(apotheca_core::ValidationError::OutOfRange {
                field: "rows".to_string(),
                min: 1,
                max: MAX_IMPORT_ROWS as i64,
            }
            .into());
        }

        let import_id = generate_id();
        let reference = Some(import_id.as_str());
        let mut summary = ImportSummary {
            import_id: import_id.clone(),
            ..Default::default()
        };

        let mut tx = self.pool.begin().await?;

        for (index, row) in rows.iter().enumerate() {
            let barcode = row.barcode.trim();
            let skip = |reason: &str| SkippedRow {
                row: index,
                barcode: barcode.to_string(),
                reason: reason.to_string(),
            };

            if barcode.is_empty() {
                summary.skipped.push(skip("barcode is required"));
                continue;
            }
            if row.quantity < 0 {
                summary.skipped.push(skip("quantity must not be negative"));
                continue;
            }

            // Write first: the pre-image audit row doubles as the lock.
            let replaced = InventoryAdjuster::set_stock_by_barcode(
                &mut tx,
                branch_id,
                barcode,
                row.quantity,
                row.expiry_date,
                reference,
            )
            .await?;
            if replaced.is_some() {
                summary.updated += 1;
                continue;
            }

            if let Some(product) = Self::find_by_barcode_in(&mut tx, barcode).await? {
                InventoryAdjuster::create_record(
                    &mut tx,
                    branch_id,
                    &product.id,
                    row.quantity,
                    row.expiry_date,
                    reference,
                )
                .await?;
                summary.stocked += 1;
                continue;
            }

            let (Some(name), Some(price)) = (row.name.as_deref(), row.price_cents) else {
                summary.skipped.push(skip("unknown barcode needs name and priceCents"));
                continue;
            };
            if name.trim().is_empty() || price.is_negative() {
                summary.skipped.push(skip("unknown barcode needs name and priceCents"));
                continue;
            }

            let product = Self::insert(
                &mut tx,
                &NewProduct {
                    name: name.to_string(),
                    brand_name: row.brand_name.clone(),
                    barcode: Some(barcode.to_string()),
                    price_cents: price,
                    critical_level: default_critical_level(),
                    ..Default::default()
                },
            )
            .await?;
            InventoryAdjuster::create_record(
                &mut tx,
                branch_id,
                &product.id,
                row.quantity,
                row.expiry_date,
                reference,
            )
            .await?;
            summary.created += 1;
        }

        tx.commit().await?;

        info!(
            branch_id = %branch_id,
            import_id = %summary.import_id,
            updated = summary.updated,
            stocked = summary.stocked,
            created = summary.created,
            skipped = summary.skipped.len(),
            "Bulk import applied"
        );
        Ok(summary)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixture::{self, AMOXICILLIN, BRANCH, PARACETAMOL};

    #[tokio::test]
    async fn test_search_ranks_barcode_then_prefix() {
        let db = fixture::database().await;

        let hits = db.products().search("4800000000028", Some(BRANCH)).await.unwrap();
        assert_eq!(hits[0].id, AMOXICILLIN);
        assert_eq!(hits[0].stock, Some(20));

        let hits = db.products().search("para", Some(BRANCH)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, PARACETAMOL);
    }

    #[tokio::test]
    async fn test_search_contains_after_prefix() {
        let db = fixture::database().await;

        // "Ascorbic Acid 500mg" contains "500", as do the others; all rank 3
        let hits = db.products().search("500mg", None).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].name, "Amoxicillin 500mg");
        assert!(hits.iter().all(|h| h.stock.is_none()));
    }

    #[tokio::test]
    async fn test_search_rejects_short_query() {
        let db = fixture::database().await;
        let err = db.products().search("am", Some(BRANCH)).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_get_by_barcode() {
        let db = fixture::database().await;

        let hit = db.products().get_by_barcode("4800000000011", Some(BRANCH)).await.unwrap();
        assert_eq!(hit.unwrap().stock, Some(5));
        assert!(db.products().get_by_barcode("000", Some(BRANCH)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bulk_import_updates_creates_and_skips() {
        let db = fixture::database().await;
        let rows = vec![
            ImportRow {
                barcode: "4800000000011".to_string(),
                name: None,
                brand_name: None,
                price_cents: None,
                quantity: 40,
                expiry_date: NaiveDate::from_ymd_opt(2027, 1, 31),
            },
            ImportRow {
                barcode: "4800000000999".to_string(),
                name: Some("Cetirizine 10mg".to_string()),
                brand_name: Some("Virlix".to_string()),
                price_cents: Some(Money::from_cents(900)),
                quantity: 12,
                expiry_date: None,
            },
            ImportRow {
                barcode: "4800000000777".to_string(),
                name: None,
                brand_name: None,
                price_cents: None,
                quantity: 3,
                expiry_date: None,
            },
        ];

        let summary = db.products().bulk_import(BRANCH, &rows).await.unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].row, 2);

        assert_eq!(fixture::stock_of(db.pool(), PARACETAMOL).await, 40);
        let created = db.products().get_by_barcode("4800000000999", Some(BRANCH)).await.unwrap().unwrap();
        assert_eq!(created.stock, Some(12));
        assert_eq!(created.price_cents.cents(), 900);
    }
}
