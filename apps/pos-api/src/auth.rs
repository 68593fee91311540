//! JWT authentication module.
//!
//! Handles token issuance for both logins and the role gates in front of
//! the route groups.
//!
//! ```text
//!  PMS login (employeeId + password)  ──► token{role ADMIN|MANAGER}     8h
//!  POS login (staffId + PIN)          ──► token{role PHARMACIST,
//!                                               branchId,
//!                                               salesSessionId,
//!                                               pharmacistSessionId}  12h
//!
//!  Authorization: Bearer <token>
//!        │
//!        ▼
//!  require_* middleware ── missing / invalid / expired ──► 401
//!        │             └── role not allowed ─────────────► 403
//!        ▼
//!  handler (Extension<Claims>)
//! ```

use apotheca_core::{Pharmacist, Role, User};
use apotheca_db::repository::session::SessionOpened;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Subject (user id or pharmacist staff id)
    pub sub: String,

    pub role: Role,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,

    /// Sales session opened by the POS login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_session_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pharmacist_session_id: Option<String>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

/// JWT token manager.
#[derive(Clone)]
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    pms_lifetime: Duration,
    pos_lifetime: Duration,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("pms_lifetime", &self.pms_lifetime)
            .field("pos_lifetime", &self.pos_lifetime)
            .finish_non_exhaustive()
    }
}

impl JwtManager {
    pub fn new(secret: &str, pms_token_hours: i64, pos_token_hours: i64) -> Self {
        JwtManager {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            pms_lifetime: Duration::hours(pms_token_hours),
            pos_lifetime: Duration::hours(pos_token_hours),
        }
    }

    /// Token for a management system user.
    pub fn issue_pms_token(&self, user: &User) -> Result<String, ApiError> {
        let mut claims = self.claims(&user.id, user.role, self.pms_lifetime);
        claims.employee_id = Some(user.employee_id.clone());
        claims.branch_id = user.branch_id.clone();
        self.sign(&claims)
    }

    /// Token for a pharmacist, bound to the session their login opened.
    pub fn issue_pos_token(&self, pharmacist: &Pharmacist, opened: &SessionOpened) -> Result<String, ApiError> {
        let mut claims = self.claims(&pharmacist.id, Role::Pharmacist, self.pos_lifetime);
        claims.branch_id = Some(pharmacist.branch_id.clone());
        claims.sales_session_id = Some(opened.session.id.clone());
        claims.pharmacist_session_id = Some(opened.pharmacist_session.id.clone());
        self.sign(&claims)
    }

    /// Validate and decode a token. Expiry is checked by `jsonwebtoken`.
    pub fn validate_token(&self, token: &str) -> Result<Claims, ApiError> {
        let token_data: TokenData<Claims> = decode(token, &self.decoding, &Validation::default())
            .map_err(|e| ApiError::Unauthorized(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }

    fn claims(&self, subject: &str, role: Role, lifetime: Duration) -> Claims {
        let now = Utc::now();
        Claims {
            sub: subject.to_string(),
            role,
            employee_id: None,
            branch_id: None,
            sales_session_id: None,
            pharmacist_session_id: None,
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String, ApiError> {
        encode(&Header::default(), claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("Failed to generate token: {}", e)))
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// =============================================================================
// Role Gates
// =============================================================================

fn authorize(state: &AppState, request: &mut Request, allowed: fn(Role) -> bool) -> Result<(), ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token)
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = state.jwt.validate_token(token)?;
    if !allowed(claims.role) {
        return Err(ApiError::Forbidden);
    }

    request.extensions_mut().insert(claims);
    Ok(())
}

/// POS routes: pharmacists only.
pub async fn require_pharmacist(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, &mut request, |role| role == Role::Pharmacist)?;
    Ok(next.run(request).await)
}

/// Management routes: ADMIN or MANAGER.
pub async fn require_pms_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, &mut request, |role| role.is_pms_user())?;
    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, &mut request, |role| role == Role::Admin)?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use apotheca_core::RecordStatus;

    fn admin() -> User {
        User {
            id: "u-1".to_string(),
            employee_id: "ADMIN-001".to_string(),
            name: "Admin".to_string(),
            email: None,
            role: Role::Admin,
            branch_id: None,
            status: RecordStatus::Active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test-secret-0123456789", 8, 12);

        let token = manager.issue_pms_token(&admin()).unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.employee_id.as_deref(), Some("ADMIN-001"));
        assert!(claims.sales_session_id.is_none());
        assert_eq!(claims.exp - claims.iat, 8 * 3600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = JwtManager::new("test-secret-0123456789", 8, 12);
        let other = JwtManager::new("another-secret-9876543210", 8, 12);

        let token = issuer.issue_pms_token(&admin()).unwrap();
        assert!(matches!(other.validate_token(&token), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        // Lifetime far beyond the default 60s leeway
        let manager = JwtManager::new("test-secret-0123456789", -1, -1);
        let token = manager.issue_pms_token(&admin()).unwrap();
        assert!(manager.validate_token(&token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Basic abc"), None);
    }
}
