//! Branches and their invoice codes.

use apotheca_core::validation::{validate_branch_code, validate_name};
use apotheca_core::{Branch, RecordStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use super::generate_id;
use crate::error::{DbError, DbResult};

const BRANCH_COLUMNS: &str = "id, branch_code, branch_name, address, status, created_at";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBranch {
    pub branch_code: String,
    pub branch_name: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BranchRepository {
    pool: SqlitePool,
}

impl BranchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BranchRepository { pool }
    }

    pub async fn create(&self, branch: &NewBranch) -> DbResult<Branch> {
        let code = branch.branch_code.trim();
        validate_branch_code(code)?;
        validate_name("branchName", &branch.branch_name, 200)?;

        let created: Branch = sqlx::query_as(&format!(
            r#"
            INSERT INTO branches (id, branch_code, branch_name, address, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING {}
            "#,
            BRANCH_COLUMNS
        ))
        .bind(generate_id())
        .bind(code)
        .bind(branch.branch_name.trim())
        .bind(&branch.address)
        .bind(RecordStatus::Active)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("branchCode", code),
            other => other,
        })?;

        info!(branch_id = %created.id, branch_code = %created.branch_code, "Branch created");
        Ok(created)
    }

    pub async fn list(&self) -> DbResult<Vec<Branch>> {
        let branches = sqlx::query_as(&format!("SELECT {} FROM branches ORDER BY branch_code", BRANCH_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        Ok(branches)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Branch>> {
        let branch = sqlx::query_as(&format!("SELECT {} FROM branches WHERE id = ?1", BRANCH_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(branch)
    }

    /// Invoice prefix of an active branch.
    pub async fn code_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<String>> {
        let code = sqlx::query_scalar("SELECT branch_code FROM branches WHERE id = ?1 AND status = 'ACTIVE'")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(code)
    }
}
