//! Sale completion and lookup.

use apotheca_core::checkout::CheckoutRequest;
use apotheca_core::invoice::format_invoice_number;
use apotheca_core::SaleDetail;
use apotheca_db::CompletedSale;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::Claims;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/sales", post(complete_sale))
        .route("/api/sales/next-sequence", get(next_sequence))
        .route("/api/sales/:id", get(get_sale))
}

/// Runs the checkout. The body's branch and sessions must be the ones this
/// token was issued for.
async fn complete_sale(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(request): ApiJson<CheckoutRequest>,
) -> Result<Json<CompletedSale>, ApiError> {
    let owned = claims.branch_id.as_deref() == Some(request.branch_id.as_str())
        && claims.sales_session_id.as_deref() == Some(request.session_id.as_str())
        && claims.pharmacist_session_id.as_deref() == Some(request.pharmacist_session_id.as_str());
    if !owned {
        return Err(ApiError::Forbidden);
    }

    let sale = state.checkout.complete_sale(&request).await?;
    Ok(Json(sale))
}

async fn get_sale(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SaleDetail>, ApiError> {
    state
        .db
        .sales()
        .get_detail(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Sale not found: {}", id)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchQuery {
    pub branch_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextSequence {
    pub daily_sequence: i64,
    pub invoice_number: String,
}

/// Preview only; the number is assigned for real inside the checkout.
async fn next_sequence(
    State(state): State<AppState>,
    Query(query): Query<BranchQuery>,
) -> Result<Json<NextSequence>, ApiError> {
    let branch = state
        .db
        .branches()
        .get(&query.branch_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Branch not found: {}", query.branch_id)))?;

    let clock = state.checkout.policy().clock;
    let now = Utc::now();
    let daily_sequence = state
        .db
        .sequences()
        .peek_next_sequence(&branch.id, clock.business_date(now))
        .await?;

    Ok(Json(NextSequence {
        daily_sequence,
        invoice_number: format_invoice_number(&branch.branch_code, &clock.local(now), daily_sequence),
    }))
}
