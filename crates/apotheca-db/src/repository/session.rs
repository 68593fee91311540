//! # Session Aggregator
//!
//! Sales sessions (a counter shift) and the pharmacists working them.
//!
//! ## Lifecycle
//! ```text
//! open_session(branch, staff)
//!      │  sales_sessions      end_time NULL, total 0
//!      │  pharmacist_sessions share 100%
//!      ▼
//! add_to_session_total(+total) × N     (one per completed sale)
//!      │
//!      ▼
//! close_session(id)                    end_time set on both; terminal
//! ```
//!
//! Every mutation is guarded by `end_time IS NULL` in the statement itself,
//! so a sale racing a logout either lands before the close or fails with
//! `SessionNotOpen`.

use apotheca_core::{CoreError, Money, PharmacistSession, RecordStatus, SalesSession, ValidationError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use super::generate_id;
use crate::error::DbResult;

const SESSION_COLUMNS: &str = "id, branch_id, opened_by, start_time, end_time, total_sales_cents";

const PHARMACIST_SESSION_COLUMNS: &str = "id, session_id, staff_id, share_bps, start_time, end_time";

/// A freshly opened session and the opener's participation in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOpened {
    pub session: SalesSession,
    pub pharmacist_session: PharmacistSession,
}

#[derive(Debug, Clone)]
pub struct SessionAggregator {
    pool: SqlitePool,
}

impl SessionAggregator {
    pub fn new(pool: SqlitePool) -> Self {
        SessionAggregator { pool }
    }

    /// Opens a sales session at `branch_id` for pharmacist `staff_id`.
    pub async fn open_session(&self, branch_id: &str, staff_id: &str) -> DbResult<SessionOpened> {
        let staff: Option<(String, RecordStatus)> =
            sqlx::query_as("SELECT branch_id, status FROM pharmacists WHERE id = ?1")
                .bind(staff_id)
                .fetch_optional(&self.pool)
                .await?;

        match staff {
            Some((home, RecordStatus::Active)) if home == branch_id => {}
            Some((_, RecordStatus::Active)) => {
                return Err(ValidationError::Mismatch {
                    field: "branchId".to_string(),
                    reason: "pharmacist is not assigned to this branch".to_string(),
                }
                .into())
            }
            _ => return Err(crate::error::DbError::not_found("Pharmacist", staff_id)),
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let session: SalesSession = sqlx::query_as(&format!(
            r#"
            INSERT INTO sales_sessions (id, branch_id, opened_by, start_time, total_sales_cents)
            VALUES (?1, ?2, ?3, ?4, 0)
            RETURNING {}
            "#,
            SESSION_COLUMNS
        ))
        .bind(generate_id())
        .bind(branch_id)
        .bind(staff_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let pharmacist_session: PharmacistSession = sqlx::query_as(&format!(
            r#"
            INSERT INTO pharmacist_sessions (id, session_id, staff_id, share_bps, start_time)
            VALUES (?1, ?2, ?3, 10000, ?4)
            RETURNING {}
            "#,
            PHARMACIST_SESSION_COLUMNS
        ))
        .bind(generate_id())
        .bind(&session.id)
        .bind(staff_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(session_id = %session.id, branch_id = %branch_id, staff_id = %staff_id, "Sales session opened");
        Ok(SessionOpened {
            session,
            pharmacist_session,
        })
    }

    /// Ends a session and every pharmacist session still open in it.
    ///
    /// Closing an already closed session fails with `SessionNotOpen`.
    pub async fn close_session(&self, session_id: &str) -> DbResult<SalesSession> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let closed: Option<SalesSession> = sqlx::query_as(&format!(
            "UPDATE sales_sessions SET end_time = ?1 WHERE id = ?2 AND end_time IS NULL RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(now)
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(session) = closed else {
            return Err(Self::not_open_or_missing(&mut tx, session_id).await?.into());
        };

        sqlx::query(
            "UPDATE pharmacist_sessions SET end_time = ?1 WHERE session_id = ?2 AND end_time IS NULL",
        )
        .bind(now)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            session_id = %session_id,
            total_sales = %session.total_sales_cents,
            "Sales session closed"
        );
        Ok(session)
    }

    // ===== Transaction steps =====

    /// Adds a completed sale's total to the open session.
    pub async fn add_to_session_total(
        conn: &mut SqliteConnection,
        session_id: &str,
        amount: Money,
    ) -> DbResult<Money> {
        let total: Option<Money> = sqlx::query_scalar(
            r#"
            UPDATE sales_sessions
               SET total_sales_cents = total_sales_cents + ?1
             WHERE id = ?2 AND end_time IS NULL
            RETURNING total_sales_cents
            "#,
        )
        .bind(amount)
        .bind(session_id)
        .fetch_optional(&mut *conn)
        .await?;

        match total {
            Some(total) => Ok(total),
            None => Err(Self::not_open_or_missing(conn, session_id).await?.into()),
        }
    }

    pub async fn find_in(conn: &mut SqliteConnection, session_id: &str) -> DbResult<Option<SalesSession>> {
        let session = sqlx::query_as(&format!("SELECT {} FROM sales_sessions WHERE id = ?1", SESSION_COLUMNS))
            .bind(session_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(session)
    }

    pub async fn find_pharmacist_session_in(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<PharmacistSession>> {
        let session = sqlx::query_as(&format!(
            "SELECT {} FROM pharmacist_sessions WHERE id = ?1",
            PHARMACIST_SESSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(session)
    }

    /// Picks the error for a guarded UPDATE that matched nothing.
    async fn not_open_or_missing(conn: &mut SqliteConnection, session_id: &str) -> DbResult<CoreError> {
        let exists = Self::find_in(conn, session_id).await?.is_some();
        Ok(if exists {
            CoreError::SessionNotOpen(session_id.to_string())
        } else {
            CoreError::SessionNotFound(session_id.to_string())
        })
    }

    // ===== Reads =====

    pub async fn get(&self, session_id: &str) -> DbResult<Option<SalesSession>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_in(&mut conn, session_id).await
    }

    pub async fn get_pharmacist_session(&self, id: &str) -> DbResult<Option<PharmacistSession>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_pharmacist_session_in(&mut conn, id).await
    }

    /// Sessions at a branch that have not been closed yet.
    pub async fn open_sessions(&self, branch_id: &str) -> DbResult<Vec<SalesSession>> {
        let sessions = sqlx::query_as(&format!(
            "SELECT {} FROM sales_sessions WHERE branch_id = ?1 AND end_time IS NULL ORDER BY start_time",
            SESSION_COLUMNS
        ))
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::fixture::{self, BRANCH, PHARMACIST, SESSION};

    #[tokio::test]
    async fn test_open_and_close_session() {
        let db = fixture::database().await;

        let opened = db.sessions().open_session(BRANCH, PHARMACIST).await.unwrap();
        assert!(opened.session.is_open());
        assert_eq!(opened.pharmacist_session.session_id, opened.session.id);
        assert_eq!(opened.pharmacist_session.share_bps, 10_000);

        let closed = db.sessions().close_session(&opened.session.id).await.unwrap();
        assert!(!closed.is_open());

        let psession = db
            .sessions()
            .get_pharmacist_session(&opened.pharmacist_session.id)
            .await
            .unwrap()
            .unwrap();
        assert!(psession.end_time.is_some());
    }

    #[tokio::test]
    async fn test_close_twice_fails() {
        let db = fixture::database().await;

        db.sessions().close_session(SESSION).await.unwrap();
        let err = db.sessions().close_session(SESSION).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::SessionNotOpen(_))));

        let err = db.sessions().close_session("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_add_to_session_total() {
        let db = fixture::database().await;

        {
            let mut conn = db.pool().acquire().await.unwrap();
            SessionAggregator::add_to_session_total(&mut conn, SESSION, Money::from_cents(22_000))
                .await
                .unwrap();
            let total = SessionAggregator::add_to_session_total(&mut conn, SESSION, Money::from_cents(1_500))
                .await
                .unwrap();
            assert_eq!(total.cents(), 23_500);
        }

        db.sessions().close_session(SESSION).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let err = SessionAggregator::add_to_session_total(&mut conn, SESSION, Money::from_cents(100))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::SessionNotOpen(_))));
    }

    #[tokio::test]
    async fn test_open_session_checks_pharmacist_branch() {
        let db = fixture::database().await;

        let err = db.sessions().open_session("other-branch", PHARMACIST).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::Validation(_))));

        let err = db.sessions().open_session(BRANCH, "ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
