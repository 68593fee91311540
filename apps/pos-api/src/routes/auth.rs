//! Login, logout and password reset.

use apotheca_core::{Pharmacist, User};
use apotheca_db::repository::session::SessionOpened;
use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::Claims;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::AppState;

/// Same answer for unknown and known employee ids.
const RESET_REQUESTED: &str = "If the employee exists, a reset code has been issued";

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/pms/login", post(pms_login))
        .route("/api/auth/pos/login", post(pos_login))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/verify-reset-token", post(verify_reset_token))
        .route("/api/auth/reset-password", post(reset_password))
}

/// Behind the pharmacist gate.
pub fn pos_routes() -> Router<AppState> {
    Router::new().route("/api/auth/pos/logout", post(pos_logout))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PmsLoginRequest {
    pub employee_id: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PmsLoginResponse {
    pub success: bool,
    pub token: String,
    pub user: User,
}

async fn pms_login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<PmsLoginRequest>,
) -> Result<Json<PmsLoginResponse>, ApiError> {
    let user = state
        .db
        .staff()
        .authenticate_user(body.employee_id.trim(), &body.password)
        .await?
        .filter(|user| user.role.is_pms_user())
        .ok_or_else(|| {
            warn!(employee_id = %body.employee_id, "PMS login rejected");
            ApiError::Unauthorized("Invalid employee id or password".to_string())
        })?;

    let token = state.jwt.issue_pms_token(&user)?;
    info!(employee_id = %user.employee_id, role = %user.role, "PMS login");

    Ok(Json(PmsLoginResponse {
        success: true,
        token,
        user,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PosLoginRequest {
    pub staff_id: String,
    pub pin: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PosLoginResponse {
    pub success: bool,
    pub token: String,
    pub pharmacist: Pharmacist,
    #[serde(flatten)]
    pub session: SessionOpened,
}

/// PIN login; opens a sales session the token is bound to.
async fn pos_login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<PosLoginRequest>,
) -> Result<Json<PosLoginResponse>, ApiError> {
    let pharmacist = state
        .db
        .staff()
        .authenticate_pharmacist(body.staff_id.trim(), &body.pin)
        .await?
        .ok_or_else(|| {
            warn!(staff_id = %body.staff_id, "POS login rejected");
            ApiError::Unauthorized("Invalid staff id or PIN".to_string())
        })?;

    let opened = state
        .db
        .sessions()
        .open_session(&pharmacist.branch_id, &pharmacist.id)
        .await?;
    let token = state.jwt.issue_pos_token(&pharmacist, &opened)?;

    Ok(Json(PosLoginResponse {
        success: true,
        token,
        pharmacist,
        session: opened,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub success: bool,
    pub session_id: String,
}

/// Ends the session opened at login.
async fn pos_logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<LogoutResponse>, ApiError> {
    let session_id = claims
        .sales_session_id
        .ok_or_else(|| ApiError::Unauthorized("Token has no sales session".to_string()))?;

    let session = state.db.sessions().close_session(&session_id).await?;
    info!(session_id = %session.id, staff_id = %claims.sub, "POS logout");

    Ok(Json(LogoutResponse {
        success: true,
        session_id: session.id,
    }))
}

// =============================================================================
// Password Reset
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub employee_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordResponse {
    pub success: bool,
    pub message: String,
    /// Development only; production delivers the code out of band.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_code: Option<String>,
}

async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>, ApiError> {
    let code = state
        .db
        .staff()
        .issue_reset_token(body.employee_id.trim(), state.config.reset_token_ttl())
        .await?;

    if code.is_some() {
        info!(employee_id = %body.employee_id, "Password reset code issued");
    }

    Ok(Json(ForgotPasswordResponse {
        success: true,
        message: RESET_REQUESTED.to_string(),
        reset_code: code.filter(|_| state.config.is_development()),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResetTokenRequest {
    pub employee_id: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResetTokenResponse {
    pub success: bool,
    pub valid: bool,
}

async fn verify_reset_token(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<VerifyResetTokenRequest>,
) -> Result<Json<VerifyResetTokenResponse>, ApiError> {
    let valid = state
        .db
        .staff()
        .verify_reset_token(body.employee_id.trim(), body.token.trim())
        .await?;

    Ok(Json(VerifyResetTokenResponse { success: true, valid }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub employee_id: String,
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

async fn reset_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .db
        .staff()
        .reset_password(body.employee_id.trim(), body.token.trim(), &body.new_password)
        .await?;

    info!(employee_id = %body.employee_id, "Password reset");
    Ok(Json(MessageResponse {
        success: true,
        message: "Password updated".to_string(),
    }))
}
