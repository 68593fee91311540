//! Error types for the POS API.
//!
//! Every handler returns `Result<_, ApiError>`; the status code is decided
//! here, once.
//!
//! ```text
//!  ValidationError / CoreError::Validation ─► 400
//!  *NotFound                               ─► 404
//!  business rule (stock, session, points)  ─► 409
//!  duplicate key                           ─► 409
//!  bearer token missing / bad              ─► 401
//!  wrong role                              ─► 403
//!  anything else from the database         ─► 500
//! ```
//!
//! Body: `{"success": false, "message": "...", "error": "..."}`, where
//! `error` carries the underlying detail only in development.

use apotheca_core::{CoreError, ValidationError};
use apotheca_db::DbError;
use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// POS API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions")]
    Forbidden,

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError::Db(DbError::Rule(e))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Db(e) => db_status(e),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short message safe to show at the counter.
    fn public_message(&self) -> String {
        match self {
            ApiError::Db(e) if db_status(e).is_server_error() => "Internal server error".to_string(),
            ApiError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

fn db_status(e: &DbError) -> StatusCode {
    match e {
        DbError::NotFound { .. } => StatusCode::NOT_FOUND,
        DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
        DbError::Rule(rule) if rule.is_validation() => StatusCode::BAD_REQUEST,
        DbError::Rule(rule) if rule.is_not_found() => StatusCode::NOT_FOUND,
        DbError::Rule(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error text kept on the response so [`with_error_detail`] can expose it.
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    pub message: String,
    pub detail: String,
}

impl ErrorDetail {
    pub fn render(&self, status: StatusCode, include_detail: bool) -> Response {
        let body = ErrorBody {
            success: false,
            message: self.message.clone(),
            error: include_detail.then(|| self.detail.clone()),
        };
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(self.clone());
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        ErrorDetail {
            message: self.public_message(),
            detail: self.to_string(),
        }
        .render(status, false)
    }
}

/// Development-only layer: re-renders error bodies with the `error` detail.
pub async fn with_error_detail(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    match response.extensions().get::<ErrorDetail>().cloned() {
        Some(detail) => detail.render(response.status(), true),
        None => response,
    }
}
