//! # Sequence Generator
//!
//! Per-branch, per-business-day invoice sequence.
//!
//! ## Reservation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    INSERT INTO invoice_sequences ... ON CONFLICT DO UPDATE             │
//! │    RETURNING last_sequence          ← first statement: takes the       │
//! │                                       SQLite write lock                │
//! │    ... rest of the checkout ...                                        │
//! │  COMMIT                              ← lock released                   │
//! │                                                                         │
//! │  Two checkouts for the same branch-day therefore run one after the     │
//! │  other; the second sees the first's counter row and gets seq + 1.      │
//! │  A rolled-back checkout rolls its increment back too, so numbers       │
//! │  stay gapless.                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The counter is seeded from `MAX(sales.daily_sequence)` so a counter row
//! that is missing (or behind imported sales) never reissues a number.

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct SequenceGenerator {
    pool: SqlitePool,
}

impl SequenceGenerator {
    pub fn new(pool: SqlitePool) -> Self {
        SequenceGenerator { pool }
    }

    /// Reserves the next daily sequence inside the caller's transaction.
    ///
    /// Returns `max(daily_sequence) + 1` for the branch and date, `1` for
    /// the first sale of the day.
    pub async fn next_sequence(
        conn: &mut SqliteConnection,
        branch_id: &str,
        business_date: NaiveDate,
    ) -> DbResult<i64> {
        let sequence: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO invoice_sequences (branch_id, business_date, last_sequence)
            VALUES (
                ?1, ?2,
                (SELECT COALESCE(MAX(daily_sequence), 0) + 1
                 FROM sales
                 WHERE branch_id = ?1 AND business_date = ?2)
            )
            ON CONFLICT (branch_id, business_date) DO UPDATE
                SET last_sequence = MAX(invoice_sequences.last_sequence + 1, excluded.last_sequence)
            RETURNING last_sequence
            "#,
        )
        .bind(branch_id)
        .bind(business_date)
        .fetch_one(&mut *conn)
        .await?;

        debug!(branch_id = %branch_id, %business_date, sequence, "Reserved invoice sequence");
        Ok(sequence)
    }

    /// The sequence the next sale would get, without reserving it.
    pub async fn peek_next_sequence(
        &self,
        branch_id: &str,
        business_date: NaiveDate,
    ) -> DbResult<i64> {
        let next: i64 = sqlx::query_scalar(
            r#"
            SELECT MAX(
                COALESCE((SELECT last_sequence FROM invoice_sequences
                          WHERE branch_id = ?1 AND business_date = ?2), 0),
                COALESCE((SELECT MAX(daily_sequence) FROM sales
                          WHERE branch_id = ?1 AND business_date = ?2), 0)
            ) + 1
            "#,
        )
        .bind(branch_id)
        .bind(business_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(next)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[tokio::test]
    async fn test_sequence_starts_at_one_and_increments() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        assert_eq!(SequenceGenerator::next_sequence(&mut conn, "b1", day(15)).await.unwrap(), 1);
        assert_eq!(SequenceGenerator::next_sequence(&mut conn, "b1", day(15)).await.unwrap(), 2);
        assert_eq!(SequenceGenerator::next_sequence(&mut conn, "b1", day(15)).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_sequence_is_scoped_by_branch_and_day() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        SequenceGenerator::next_sequence(&mut conn, "b1", day(15)).await.unwrap();
        SequenceGenerator::next_sequence(&mut conn, "b1", day(15)).await.unwrap();

        assert_eq!(SequenceGenerator::next_sequence(&mut conn, "b2", day(15)).await.unwrap(), 1);
        assert_eq!(SequenceGenerator::next_sequence(&mut conn, "b1", day(16)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rolled_back_reservation_is_reissued() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        {
            let mut tx = db.pool().begin().await.unwrap();
            assert_eq!(SequenceGenerator::next_sequence(&mut tx, "b1", day(15)).await.unwrap(), 1);
            tx.rollback().await.unwrap();
        }

        let mut tx = db.pool().begin().await.unwrap();
        assert_eq!(SequenceGenerator::next_sequence(&mut tx, "b1", day(15)).await.unwrap(), 1);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_peek_does_not_reserve() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sequences = db.sequences();

        assert_eq!(sequences.peek_next_sequence("b1", day(15)).await.unwrap(), 1);
        assert_eq!(sequences.peek_next_sequence("b1", day(15)).await.unwrap(), 1);

        {
            let mut conn = db.pool().acquire().await.unwrap();
            SequenceGenerator::next_sequence(&mut conn, "b1", day(15)).await.unwrap();
        }
        assert_eq!(sequences.peek_next_sequence("b1", day(15)).await.unwrap(), 2);
    }
}
