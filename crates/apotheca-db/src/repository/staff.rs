//! # Staff Repository
//!
//! Management system users (ADMIN / MANAGER, password login), counter
//! pharmacists (PIN login) and password reset codes.
//!
//! ## Password Reset
//! ```text
//! issue_reset_token(emp)        upsert argon2(code), expires = now + ttl
//!      │                        returns the plain 6-digit code once
//!      ▼
//! verify_reset_token(emp, code) expired → row deleted, false
//!      │
//!      ▼
//! reset_password(emp, code, pw) DELETE ... RETURNING consumes the code,
//!                               wrong code rolls the delete back
//! ```
//!
//! Hashes never leave this module; callers only see `User` / `Pharmacist`.

use apotheca_core::validation::{validate_name, validate_password, validate_pin, validate_reset_code};
use apotheca_core::{CoreError, Pharmacist, RecordStatus, Role, User, ValidationError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::generate_id;
use crate::credentials::{generate_reset_code, hash_secret, verify_secret};
use crate::error::{DbError, DbResult};

const USER_COLUMNS: &str = "id, employee_id, name, email, role, branch_id, status, created_at";

const PHARMACIST_COLUMNS: &str = "id, name, branch_id, status, created_at";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub employee_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub branch_id: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPharmacist {
    pub name: String,
    pub branch_id: String,
    pub pin: String,
}

fn invalid_reset_code() -> DbError {
    ValidationError::invalid("token", "reset code is invalid or expired").into()
}

#[derive(Debug, Clone)]
pub struct StaffRepository {
    pool: SqlitePool,
}

impl StaffRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StaffRepository { pool }
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub async fn create_user(&self, user: &NewUser) -> DbResult<User> {
        if !user.role.is_pms_user() {
            return Err(ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: vec!["ADMIN".to_string(), "MANAGER".to_string()],
            }
            .into());
        }
        validate_name("employeeId", &user.employee_id, 50)?;
        validate_name("name", &user.name, 200)?;
        validate_password(&user.password)?;

        let password_hash = hash_secret(&user.password)?;
        let now = Utc::now();

        let created = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (id, employee_id, name, email, role, branch_id, password_hash, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(generate_id())
        .bind(user.employee_id.trim())
        .bind(user.name.trim())
        .bind(&user.email)
        .bind(user.role)
        .bind(&user.branch_id)
        .bind(password_hash)
        .bind(RecordStatus::Active)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("employeeId", user.employee_id.trim()),
            other => other,
        })?;

        info!(employee_id = %user.employee_id, role = %user.role, "User created");
        Ok(created)
    }

    pub async fn get_user(&self, employee_id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as(&format!("SELECT {} FROM users WHERE employee_id = ?1", USER_COLUMNS))
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Checks a management login. `None` for unknown, inactive or wrong password.
    pub async fn authenticate_user(&self, employee_id: &str, password: &str) -> DbResult<Option<User>> {
        let hash: Option<String> = sqlx::query_scalar(
            "SELECT password_hash FROM users WHERE employee_id = ?1 AND status = 'ACTIVE'",
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        match hash {
            Some(hash) if verify_secret(password, &hash) => self.get_user(employee_id).await,
            _ => {
                warn!(employee_id = %employee_id, "Rejected management login");
                Ok(None)
            }
        }
    }

    // =========================================================================
    // Pharmacists
    // =========================================================================

    pub async fn create_pharmacist(&self, pharmacist: &NewPharmacist) -> DbResult<Pharmacist> {
        validate_name("name", &pharmacist.name, 200)?;
        validate_pin(&pharmacist.pin)?;

        let branch: Option<String> = sqlx::query_scalar("SELECT id FROM branches WHERE id = ?1")
            .bind(&pharmacist.branch_id)
            .fetch_optional(&self.pool)
            .await?;
        if branch.is_none() {
            return Err(CoreError::BranchNotFound(pharmacist.branch_id.clone()).into());
        }

        let pin_hash = hash_secret(&pharmacist.pin)?;

        let created: Pharmacist = sqlx::query_as(&format!(
            r#"
            INSERT INTO pharmacists (id, name, branch_id, pin_hash, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING {}
            "#,
            PHARMACIST_COLUMNS
        ))
        .bind(generate_id())
        .bind(pharmacist.name.trim())
        .bind(&pharmacist.branch_id)
        .bind(pin_hash)
        .bind(RecordStatus::Active)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        info!(staff_id = %created.id, branch_id = %created.branch_id, "Pharmacist created");
        Ok(created)
    }

    pub async fn get_pharmacist(&self, staff_id: &str) -> DbResult<Option<Pharmacist>> {
        let pharmacist = sqlx::query_as(&format!("SELECT {} FROM pharmacists WHERE id = ?1", PHARMACIST_COLUMNS))
            .bind(staff_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(pharmacist)
    }

    /// Checks a counter PIN. `None` for unknown, inactive or wrong PIN.
    pub async fn authenticate_pharmacist(&self, staff_id: &str, pin: &str) -> DbResult<Option<Pharmacist>> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT pin_hash FROM pharmacists WHERE id = ?1 AND status = 'ACTIVE'")
                .bind(staff_id)
                .fetch_optional(&self.pool)
                .await?;

        match hash {
            Some(hash) if verify_secret(pin, &hash) => self.get_pharmacist(staff_id).await,
            _ => {
                warn!(staff_id = %staff_id, "Rejected counter login");
                Ok(None)
            }
        }
    }

    // =========================================================================
    // Password Reset
    // =========================================================================

    /// Replaces the employee's reset code with a fresh one valid for `ttl`.
    ///
    /// Returns `None` when no active user has that employee id.
    pub async fn issue_reset_token(&self, employee_id: &str, ttl: Duration) -> DbResult<Option<String>> {
        let code = generate_reset_code();
        let token_hash = hash_secret(&code)?;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (employee_id, token_hash, expires_at, created_at)
            SELECT employee_id, ?2, ?3, ?4
              FROM users
             WHERE employee_id = ?1 AND status = 'ACTIVE'
            ON CONFLICT (employee_id) DO UPDATE SET
                token_hash = excluded.token_hash,
                expires_at = excluded.expires_at,
                created_at = excluded.created_at
            "#,
        )
        .bind(employee_id)
        .bind(token_hash)
        .bind(now + ttl)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(employee_id = %employee_id, "Reset requested for unknown employee");
            return Ok(None);
        }

        info!(employee_id = %employee_id, "Password reset code issued");
        Ok(Some(code))
    }

    /// True when `code` is the employee's current, unexpired reset code.
    /// An expired code is deleted on sight.
    pub async fn verify_reset_token(&self, employee_id: &str, code: &str) -> DbResult<bool> {
        if validate_reset_code(code).is_err() {
            return Ok(false);
        }

        let token: Option<(String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT token_hash, expires_at FROM password_reset_tokens WHERE employee_id = ?1",
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((token_hash, expires_at)) = token else {
            return Ok(false);
        };

        if expires_at <= Utc::now() {
            sqlx::query("DELETE FROM password_reset_tokens WHERE employee_id = ?1 AND token_hash = ?2")
                .bind(employee_id)
                .bind(&token_hash)
                .execute(&self.pool)
                .await?;
            return Ok(false);
        }

        Ok(verify_secret(code, &token_hash))
    }

    /// Consumes the reset code and sets a new password.
    pub async fn reset_password(&self, employee_id: &str, code: &str, new_password: &str) -> DbResult<()> {
        validate_reset_code(code)?;
        validate_password(new_password)?;
        let password_hash = hash_secret(new_password)?;

        let mut tx = self.pool.begin().await?;

        let token: Option<(String, DateTime<Utc>)> = sqlx::query_as(
            "DELETE FROM password_reset_tokens WHERE employee_id = ?1 RETURNING token_hash, expires_at",
        )
        .bind(employee_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((token_hash, expires_at)) = token else {
            return Err(invalid_reset_code());
        };

        if expires_at <= Utc::now() {
            // keep the delete: expired codes are dead either way
            tx.commit().await?;
            return Err(invalid_reset_code());
        }
        if !verify_secret(code, &token_hash) {
            tx.rollback().await?;
            warn!(employee_id = %employee_id, "Wrong password reset code");
            return Err(invalid_reset_code());
        }

        sqlx::query("UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE employee_id = ?3")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(employee_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(employee_id = %employee_id, "Password reset");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
