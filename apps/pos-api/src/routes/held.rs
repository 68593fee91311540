//! Held (parked) carts.
//!
//! Path segments share the `:id` name: for the list route it is the session
//! id, everywhere else the held transaction id.

use apotheca_core::checkout::HoldRequest;
use apotheca_core::{HeldTransaction, HeldTransactionItem};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/transactions/hold", post(hold))
        .route("/api/transactions/held/:id", get(list_for_session).delete(discard))
        .route("/api/transactions/held/:id/items", get(items))
}

async fn hold(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<HoldRequest>,
) -> Result<Json<HeldTransaction>, ApiError> {
    let held = state.db.held().hold(&request).await?;
    Ok(Json(held))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeldListQuery {
    #[serde(default)]
    pub show_all: bool,
}

async fn list_for_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<HeldListQuery>,
) -> Result<Json<Vec<HeldTransaction>>, ApiError> {
    let held = state
        .db
        .held()
        .list_for_session(&session_id, query.show_all)
        .await?;
    Ok(Json(held))
}

/// Recall: the cart lines, for the counter to load back into the basket.
async fn items(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<HeldTransactionItem>>, ApiError> {
    if state.db.held().get(&id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Held transaction not found: {}", id)));
    }
    Ok(Json(state.db.held().items(&id).await?))
}

async fn discard(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HeldTransaction>, ApiError> {
    let held = state.db.held().discard(&id).await?;
    Ok(Json(held))
}
