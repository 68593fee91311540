//! # Loyalty Ledger
//!
//! Balance mutations for loyalty accounts. The rules (how many points a
//! subtotal earns, how many may be redeemed) live in
//! `apotheca_core::loyalty::LoyaltyPolicy`; this module only moves points.
//!
//! Every mutation is one conditional UPDATE of `loyalty_accounts` plus
//! exactly one `loyalty_ledger` row, so
//! `points_balance = lifetime_earned - lifetime_redeemed` holds after every
//! statement (the table CHECK enforces it too).

use apotheca_core::{CoreError, LedgerEntryType, LoyaltyAccount, LoyaltyLedgerEntry, Points, ValidationError};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::generate_id;
use crate::error::{DbError, DbResult};

pub(crate) const ACCOUNT_COLUMNS: &str =
    "customer_id, card_id, points_balance, lifetime_earned, lifetime_redeemed, created_at, updated_at";

const LEDGER_COLUMNS: &str = "id, customer_id, entry_type, points, balance_after, sale_id, created_at";

#[derive(Debug, Clone)]
pub struct LoyaltyLedger {
    pool: SqlitePool,
}

impl LoyaltyLedger {
    pub fn new(pool: SqlitePool) -> Self {
        LoyaltyLedger { pool }
    }

    // ===== Transaction steps =====

    /// The customer's account, or `None` when they have no loyalty card.
    pub async fn find_account(
        conn: &mut SqliteConnection,
        customer_id: &str,
    ) -> DbResult<Option<LoyaltyAccount>> {
        let account = sqlx::query_as(&format!(
            "SELECT {} FROM loyalty_accounts WHERE customer_id = ?1",
            ACCOUNT_COLUMNS
        ))
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(account)
    }

    /// Credits earned points. Zero points are a no-op and return `None`.
    pub async fn apply_earn(
        conn: &mut SqliteConnection,
        customer_id: &str,
        points: Points,
        sale_id: Option<&str>,
    ) -> DbResult<Option<LoyaltyLedgerEntry>> {
        Self::check_amount(points)?;
        if points.is_zero() {
            return Ok(None);
        }
        let now = Utc::now();

        let balance_after: Option<Points> = sqlx::query_scalar(
            r#"
            UPDATE loyalty_accounts
               SET points_balance = points_balance + ?1,
                   lifetime_earned = lifetime_earned + ?1,
                   updated_at = ?2
             WHERE customer_id = ?3
            RETURNING points_balance
            "#,
        )
        .bind(points)
        .bind(now)
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?;

        let balance_after =
            balance_after.ok_or_else(|| DbError::not_found("LoyaltyAccount", customer_id))?;

        let entry =
            Self::append(conn, customer_id, LedgerEntryType::Earned, points, balance_after, sale_id)
                .await?;
        debug!(customer_id = %customer_id, points = %points, balance = %balance_after, "Points earned");
        Ok(Some(entry))
    }

    /// Debits redeemed points.
    ///
    /// The balance guard is part of the UPDATE, so a concurrent redemption
    /// that already spent the points makes this one fail with
    /// `InvalidRedemption` instead of driving the balance negative.
    pub async fn apply_redeem(
        conn: &mut SqliteConnection,
        customer_id: &str,
        points: Points,
        sale_id: Option<&str>,
    ) -> DbResult<Option<LoyaltyLedgerEntry>> {
        Self::check_amount(points)?;
        if points.is_zero() {
            return Ok(None);
        }
        let now = Utc::now();

        let balance_after: Option<Points> = sqlx::query_scalar(
            r#"
            UPDATE loyalty_accounts
               SET points_balance = points_balance - ?1,
                   lifetime_redeemed = lifetime_redeemed + ?1,
                   updated_at = ?2
             WHERE customer_id = ?3 AND points_balance >= ?1
            RETURNING points_balance
            "#,
        )
        .bind(points)
        .bind(now)
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(balance_after) = balance_after else {
            return match Self::find_account(conn, customer_id).await? {
                Some(account) => Err(CoreError::InvalidRedemption {
                    requested: points,
                    max: account.points_balance,
                }
                .into()),
                None => Err(DbError::not_found("LoyaltyAccount", customer_id)),
            };
        };

        let entry = Self::append(
            conn,
            customer_id,
            LedgerEntryType::Redeemed,
            points,
            balance_after,
            sale_id,
        )
        .await?;
        debug!(customer_id = %customer_id, points = %points, balance = %balance_after, "Points redeemed");
        Ok(Some(entry))
    }

    /// Opens an account with a zero balance.
    pub async fn open_account(
        conn: &mut SqliteConnection,
        customer_id: &str,
        card_id: &str,
    ) -> DbResult<LoyaltyAccount> {
        let now = Utc::now();

        let account = sqlx::query_as(&format!(
            r#"
            INSERT INTO loyalty_accounts
                (customer_id, card_id, points_balance, lifetime_earned, lifetime_redeemed, created_at, updated_at)
            VALUES (?1, ?2, 0, 0, 0, ?3, ?3)
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(customer_id)
        .bind(card_id)
        .bind(now)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("cardId", card_id),
            other => other,
        })?;

        Ok(account)
    }

    fn check_amount(points: Points) -> DbResult<()> {
        if points.hundredths() < 0 {
            return Err(ValidationError::MustBePositive {
                field: "points".to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn append(
        conn: &mut SqliteConnection,
        customer_id: &str,
        entry_type: LedgerEntryType,
        points: Points,
        balance_after: Points,
        sale_id: Option<&str>,
    ) -> DbResult<LoyaltyLedgerEntry> {
        let entry = LoyaltyLedgerEntry {
            id: generate_id(),
            customer_id: customer_id.to_string(),
            entry_type,
            points,
            balance_after,
            sale_id: sale_id.map(str::to_string),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO loyalty_ledger (id, customer_id, entry_type, points, balance_after, sale_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.customer_id)
        .bind(entry.entry_type)
        .bind(entry.points)
        .bind(entry.balance_after)
        .bind(&entry.sale_id)
        .bind(entry.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(entry)
    }

    // ===== Reads =====

    pub async fn get_account(&self, customer_id: &str) -> DbResult<Option<LoyaltyAccount>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_account(&mut conn, customer_id).await
    }

    /// Ledger entries for a customer, newest first.
    pub async fn history(&self, customer_id: &str, limit: i64) -> DbResult<Vec<LoyaltyLedgerEntry>> {
        let entries = sqlx::query_as(&format!(
            "SELECT {} FROM loyalty_ledger WHERE customer_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            LEDGER_COLUMNS
        ))
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixture::{self, CUSTOMER};

    #[tokio::test]
    async fn test_earn_then_redeem_keeps_identity() {
        let db = fixture::database().await;

        {
            let mut tx = db.pool().begin().await.unwrap();
            LoyaltyLedger::apply_earn(&mut tx, CUSTOMER, Points::from_hundredths(110), None)
                .await
                .unwrap();
            LoyaltyLedger::apply_redeem(&mut tx, CUSTOMER, Points::from_whole(30), None)
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }

        let account = db.loyalty().get_account(CUSTOMER).await.unwrap().unwrap();
        assert_eq!(account.points_balance, Points::from_hundredths(5_110));
        assert_eq!(
            account.points_balance,
            account.lifetime_earned - account.lifetime_redeemed
        );

        let history = db.loyalty().history(CUSTOMER, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].entry_type, LedgerEntryType::Redeemed);
        assert_eq!(history[0].balance_after, Points::from_hundredths(5_110));
    }

    #[tokio::test]
    async fn test_redeem_more_than_balance_fails() {
        let db = fixture::database().await;

        let err = {
            let mut conn = db.pool().acquire().await.unwrap();
            LoyaltyLedger::apply_redeem(&mut conn, CUSTOMER, Points::from_whole(81), None)
                .await
                .unwrap_err()
        };

        match err {
            DbError::Rule(CoreError::InvalidRedemption { max, .. }) => {
                assert_eq!(max, Points::from_whole(80));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let account = db.loyalty().get_account(CUSTOMER).await.unwrap().unwrap();
        assert_eq!(account.points_balance, Points::from_whole(80));
        assert!(db.loyalty().history(CUSTOMER, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_points_are_skipped() {
        let db = fixture::database().await;

        {
            let mut conn = db.pool().acquire().await.unwrap();
            let earned = LoyaltyLedger::apply_earn(&mut conn, CUSTOMER, Points::zero(), None)
                .await
                .unwrap();
            assert!(earned.is_none());
        }

        assert!(db.loyalty().history(CUSTOMER, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_account() {
        let db = fixture::database().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let err = LoyaltyLedger::apply_earn(&mut conn, "nobody", Points::from_whole(1), None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(LoyaltyLedger::find_account(&mut conn, "nobody").await.unwrap().is_none());
    }
}
