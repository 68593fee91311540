//! # Supplier Repository
//!
//! Suppliers, what they sell us at what price, and the shelf prices derived
//! from that.
//!
//! ## Price Calculation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  product_suppliers (preferred, or the one named)                       │
//! │      supplier_price ₱80.00   ceiling ₱100.00                           │
//! │              │                                                          │
//! │              ▼   markup 30%                                             │
//! │      selling_price = min(80.00 × 1.30, 100.00) = ₱100.00               │
//! │              │                                                          │
//! │              ├──► products.price_cents, products.markup_bps             │
//! │              └──► price_history (append)                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use apotheca_core::pricing::selling_price;
use apotheca_core::validation::{validate_bps, validate_name, validate_price_cents};
use apotheca_core::{
    CoreError, Money, PriceHistoryEntry, ProductSupplier, RecordStatus, Supplier, ValidationError,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use super::generate_id;
use super::product::ProductRepository;
use crate::error::{DbError, DbResult};

const SUPPLIER_COLUMNS: &str = "id, supplier_name, contact_person, email, phone, address, status, created_at, updated_at";

const LINK_COLUMNS: &str = "id, product_id, supplier_id, supplier_price_cents, ceiling_price_cents, \
     is_preferred, status, created_at, updated_at";

const PRICE_HISTORY_COLUMNS: &str = "id, product_id, supplier_id, supplier_price_cents, markup_bps, \
     ceiling_price_cents, unit_price_cents, created_at";

/// Markups above 1000% are almost certainly typos.
pub const MAX_MARKUP_BPS: i64 = 100_000;

/// Create and update payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierInput {
    pub supplier_name: String,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSupplierInput {
    pub product_id: String,
    pub supplier_id: String,
    pub supplier_price_cents: Money,
    #[serde(default)]
    pub ceiling_price_cents: Option<Money>,
    #[serde(default)]
    pub is_preferred: bool,
}

/// Body of `PUT /api/pms/product-suppliers/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSupplierUpdate {
    pub supplier_price_cents: Money,
    #[serde(default)]
    pub ceiling_price_cents: Option<Money>,
    #[serde(default)]
    pub is_preferred: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceCalculation {
    /// Defaults to the product's preferred supplier.
    #[serde(default)]
    pub supplier_id: Option<String>,
    pub markup_bps: i64,
}

#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    // =========================================================================
    // Suppliers
    // =========================================================================

    /// Suppliers by name; archived ones only when asked for.
    pub async fn list(&self, include_archived: bool) -> DbResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as(&format!(
            "SELECT {} FROM suppliers WHERE ?1 OR status <> 'ARCHIVED' ORDER BY supplier_name",
            SUPPLIER_COLUMNS
        ))
        .bind(include_archived)
        .fetch_all(&self.pool)
        .await?;
        Ok(suppliers)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as(&format!("SELECT {} FROM suppliers WHERE id = ?1", SUPPLIER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(supplier)
    }

    pub async fn create(&self, input: &SupplierInput) -> DbResult<Supplier> {
        validate_name("supplierName", &input.supplier_name, 200)?;
        let now = Utc::now();

        let supplier: Supplier = sqlx::query_as(&format!(
            r#"
            INSERT INTO suppliers (id, supplier_name, contact_person, email, phone, address, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            RETURNING {}
            "#,
            SUPPLIER_COLUMNS
        ))
        .bind(generate_id())
        .bind(input.supplier_name.trim())
        .bind(&input.contact_person)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(RecordStatus::Active)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        info!(supplier_id = %supplier.id, name = %supplier.supplier_name, "Supplier created");
        Ok(supplier)
    }

    pub async fn update(&self, id: &str, input: &SupplierInput) -> DbResult<Supplier> {
        validate_name("supplierName", &input.supplier_name, 200)?;

        let supplier: Option<Supplier> = sqlx::query_as(&format!(
            r#"
            UPDATE suppliers
               SET supplier_name = ?1, contact_person = ?2, email = ?3, phone = ?4, address = ?5, updated_at = ?6
             WHERE id = ?7
            RETURNING {}
            "#,
            SUPPLIER_COLUMNS
        ))
        .bind(input.supplier_name.trim())
        .bind(&input.contact_person)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        supplier.ok_or_else(|| DbError::not_found("Supplier", id))
    }

    /// Soft delete. Price history keeps pointing at the archived row.
    pub async fn archive(&self, id: &str) -> DbResult<Supplier> {
        let supplier: Option<Supplier> = sqlx::query_as(&format!(
            "UPDATE suppliers SET status = ?1, updated_at = ?2 WHERE id = ?3 RETURNING {}",
            SUPPLIER_COLUMNS
        ))
        .bind(RecordStatus::Archived)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let supplier = supplier.ok_or_else(|| DbError::not_found("Supplier", id))?;
        info!(supplier_id = %id, "Supplier archived");
        Ok(supplier)
    }

    /// `ARCHIVED → ACTIVE`.
    pub async fn restore(&self, id: &str) -> DbResult<Supplier> {
        let restored: Option<Supplier> = sqlx::query_as(&format!(
            "UPDATE suppliers SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4 RETURNING {}",
            SUPPLIER_COLUMNS
        ))
        .bind(RecordStatus::Active)
        .bind(Utc::now())
        .bind(id)
        .bind(RecordStatus::Archived)
        .fetch_optional(&self.pool)
        .await?;

        match restored {
            Some(supplier) => {
                info!(supplier_id = %id, "Supplier restored");
                Ok(supplier)
            }
            None if self.get(id).await?.is_some() => {
                Err(CoreError::SupplierNotArchived(id.to_string()).into())
            }
            None => Err(DbError::not_found("Supplier", id)),
        }
    }

    /// Archives several suppliers at once. Unknown ids are skipped; returns
    /// how many rows changed.
    pub async fn bulk_archive(&self, ids: &[String]) -> DbResult<u64> {
        if ids.is_empty() {
            return Err(ValidationError::required("supplierIds").into());
        }
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let mut archived = 0;
        for id in ids {
            archived += sqlx::query(
                "UPDATE suppliers SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status <> ?1",
            )
            .bind(RecordStatus::Archived)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        info!(requested = ids.len(), archived, "Suppliers archived");
        Ok(archived)
    }

    // =========================================================================
    // Product Links
    // =========================================================================

    /// Creates or updates the link between a product and a supplier.
    ///
    /// Marking a link preferred clears the flag on the product's other links.
    pub async fn link_product(&self, input: &ProductSupplierInput) -> DbResult<ProductSupplier> {
        validate_price_cents("supplierPriceCents", input.supplier_price_cents.cents())?;
        if let Some(ceiling) = input.ceiling_price_cents {
            validate_price_cents("ceilingPriceCents", ceiling.cents())?;
        }

        {
            let mut conn = self.pool.acquire().await?;
            ProductRepository::require_active(&mut conn, &input.product_id).await?;
        }
        match self.get(&input.supplier_id).await? {
            Some(s) if s.status == RecordStatus::Active => {}
            _ => return Err(DbError::not_found("Supplier", &input.supplier_id)),
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if input.is_preferred {
            sqlx::query(
                "UPDATE product_suppliers SET is_preferred = 0, updated_at = ?1
                 WHERE product_id = ?2 AND supplier_id <> ?3 AND is_preferred = 1",
            )
            .bind(now)
            .bind(&input.product_id)
            .bind(&input.supplier_id)
            .execute(&mut *tx)
            .await?;
        }

        let link: ProductSupplier = sqlx::query_as(&format!(
            r#"
            INSERT INTO product_suppliers
                (id, product_id, supplier_id, supplier_price_cents, ceiling_price_cents, is_preferred, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'ACTIVE', ?7, ?7)
            ON CONFLICT (product_id, supplier_id) DO UPDATE SET
                supplier_price_cents = excluded.supplier_price_cents,
                ceiling_price_cents = excluded.ceiling_price_cents,
                is_preferred = excluded.is_preferred,
                status = 'ACTIVE',
                updated_at = excluded.updated_at
            RETURNING {}
            "#,
            LINK_COLUMNS
        ))
        .bind(generate_id())
        .bind(&input.product_id)
        .bind(&input.supplier_id)
        .bind(input.supplier_price_cents)
        .bind(input.ceiling_price_cents)
        .bind(input.is_preferred)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            product_id = %link.product_id,
            supplier_id = %link.supplier_id,
            preferred = link.is_preferred,
            "Product supplier linked"
        );
        Ok(link)
    }

    /// Active links of a product, preferred first.
    pub async fn links_for_product(&self, product_id: &str) -> DbResult<Vec<ProductSupplier>> {
        let links = sqlx::query_as(&format!(
            "SELECT {} FROM product_suppliers WHERE product_id = ?1 AND status = 'ACTIVE'
             ORDER BY is_preferred DESC, created_at",
            LINK_COLUMNS
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    /// Changes the cost side of a link and appends a price history row at the
    /// product's current shelf price.
    pub async fn update_link(&self, link_id: &str, update: &ProductSupplierUpdate) -> DbResult<ProductSupplier> {
        validate_price_cents("supplierPriceCents", update.supplier_price_cents.cents())?;
        if let Some(ceiling) = update.ceiling_price_cents {
            validate_price_cents("ceilingPriceCents", ceiling.cents())?;
        }
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // preferred flag is cleared on siblings first so the partial unique
        // index never sees two
        if update.is_preferred {
            sqlx::query(
                "UPDATE product_suppliers SET is_preferred = 0, updated_at = ?1
                 WHERE product_id = (SELECT product_id FROM product_suppliers WHERE id = ?2)
                   AND id <> ?2 AND is_preferred = 1",
            )
            .bind(now)
            .bind(link_id)
            .execute(&mut *tx)
            .await?;
        }

        let link: Option<ProductSupplier> = sqlx::query_as(&format!(
            r#"
            UPDATE product_suppliers
               SET supplier_price_cents = ?1, ceiling_price_cents = ?2, is_preferred = ?3, updated_at = ?4
             WHERE id = ?5 AND status = 'ACTIVE'
            RETURNING {}
            "#,
            LINK_COLUMNS
        ))
        .bind(update.supplier_price_cents)
        .bind(update.ceiling_price_cents)
        .bind(update.is_preferred)
        .bind(now)
        .bind(link_id)
        .fetch_optional(&mut *tx)
        .await?;
        let link = link.ok_or_else(|| DbError::not_found("ProductSupplier", link_id))?;

        sqlx::query(
            r#"
            INSERT INTO price_history
                (id, product_id, supplier_id, supplier_price_cents, markup_bps, ceiling_price_cents, unit_price_cents, created_at)
            SELECT ?1, p.id, ?2, ?3, p.markup_bps, ?4, p.price_cents, ?5
              FROM products p
             WHERE p.id = ?6
            "#,
        )
        .bind(generate_id())
        .bind(&link.supplier_id)
        .bind(link.supplier_price_cents)
        .bind(link.ceiling_price_cents)
        .bind(now)
        .bind(&link.product_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(link_id = %link_id, supplier_price = %link.supplier_price_cents, "Product supplier updated");
        Ok(link)
    }

    /// Archives a link. When it was the preferred one, the cheapest remaining
    /// active link takes over.
    pub async fn remove_link(&self, link_id: &str) -> DbResult<ProductSupplier> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let was_preferred: Option<bool> = sqlx::query_scalar(
            "SELECT is_preferred FROM product_suppliers WHERE id = ?1 AND status = 'ACTIVE'",
        )
        .bind(link_id)
        .fetch_optional(&mut *tx)
        .await?;
        let was_preferred = was_preferred.ok_or_else(|| DbError::not_found("ProductSupplier", link_id))?;

        let removed: ProductSupplier = sqlx::query_as(&format!(
            "UPDATE product_suppliers SET status = ?1, is_preferred = 0, updated_at = ?2 WHERE id = ?3 RETURNING {}",
            LINK_COLUMNS
        ))
        .bind(RecordStatus::Archived)
        .bind(now)
        .bind(link_id)
        .fetch_one(&mut *tx)
        .await?;

        if was_preferred {
            sqlx::query(
                r#"
                UPDATE product_suppliers SET is_preferred = 1, updated_at = ?1
                 WHERE id = (
                    SELECT id FROM product_suppliers
                     WHERE product_id = ?2 AND status = 'ACTIVE'
                     ORDER BY supplier_price_cents, created_at
                     LIMIT 1
                 )
                "#,
            )
            .bind(now)
            .bind(&removed.product_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(link_id = %link_id, product_id = %removed.product_id, "Product supplier removed");
        Ok(removed)
    }

    // =========================================================================
    // Pricing
    // =========================================================================

    /// Recomputes a product's shelf price from a supplier link and records it.
    pub async fn calculate_price(
        &self,
        product_id: &str,
        calculation: &PriceCalculation,
    ) -> DbResult<PriceHistoryEntry> {
        validate_bps("markupBps", calculation.markup_bps, MAX_MARKUP_BPS)?;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Write first: takes the lock and proves the product exists.
        let touched = sqlx::query("UPDATE products SET updated_at = ?1 WHERE id = ?2 AND status = 'ACTIVE'")
            .bind(now)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(product_id.to_string()).into());
        }

        let link: Option<ProductSupplier> = match &calculation.supplier_id {
            Some(supplier_id) => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM product_suppliers
                     WHERE product_id = ?1 AND supplier_id = ?2 AND status = 'ACTIVE'",
                    LINK_COLUMNS
                ))
                .bind(product_id)
                .bind(supplier_id)
                .fetch_optional(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM product_suppliers
                     WHERE product_id = ?1 AND is_preferred = 1 AND status = 'ACTIVE'",
                    LINK_COLUMNS
                ))
                .bind(product_id)
                .fetch_optional(&mut *tx)
                .await?
            }
        };

        let Some(link) = link else {
            let which = calculation.supplier_id.as_deref().unwrap_or("preferred");
            return Err(DbError::not_found("ProductSupplier", format!("{}/{}", product_id, which)));
        };

        let unit_price = selling_price(
            link.supplier_price_cents,
            calculation.markup_bps as u32,
            link.ceiling_price_cents,
        );

        ProductRepository::set_price(&mut tx, product_id, unit_price, calculation.markup_bps).await?;

        let entry: PriceHistoryEntry = sqlx::query_as(&format!(
            r#"
            INSERT INTO price_history
                (id, product_id, supplier_id, supplier_price_cents, markup_bps, ceiling_price_cents, unit_price_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING {}
            "#,
            PRICE_HISTORY_COLUMNS
        ))
        .bind(generate_id())
        .bind(product_id)
        .bind(&link.supplier_id)
        .bind(link.supplier_price_cents)
        .bind(calculation.markup_bps)
        .bind(link.ceiling_price_cents)
        .bind(unit_price)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            product_id = %product_id,
            supplier_id = %link.supplier_id,
            unit_price = %unit_price,
            "Product price recalculated"
        );
        Ok(entry)
    }

    /// Price changes for a product, newest first.
    pub async fn price_history(&self, product_id: &str) -> DbResult<Vec<PriceHistoryEntry>> {
        let history = sqlx::query_as(&format!(
            "SELECT {} FROM price_history WHERE product_id = ?1 ORDER BY rowid DESC",
            PRICE_HISTORY_COLUMNS
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(history)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
