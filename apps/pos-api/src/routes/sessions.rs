//! Sales sessions outside the login/logout flow.

use apotheca_core::SalesSession;
use apotheca_db::repository::session::SessionOpened;
use axum::{
    extract::{Path, State},
    routing::{patch, post},
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::auth::Claims;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/sessions", post(open_session))
        .route("/api/sessions/:id", patch(close_session))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    pub branch_id: Option<String>,
}

/// Opens another session for the calling pharmacist.
async fn open_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(body): ApiJson<OpenSessionRequest>,
) -> Result<Json<SessionOpened>, ApiError> {
    let branch_id = body
        .branch_id
        .or(claims.branch_id)
        .ok_or_else(|| ApiError::BadRequest("branchId is required".to_string()))?;

    let opened = state.db.sessions().open_session(&branch_id, &claims.sub).await?;
    Ok(Json(opened))
}

/// Ends the session. A second close answers 409.
async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SalesSession>, ApiError> {
    let session = state.db.sessions().close_session(&id).await?;
    Ok(Json(session))
}
