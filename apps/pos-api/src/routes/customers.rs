//! Loyalty customers.

use apotheca_core::CustomerWithCard;
use apotheca_db::repository::customer::NewCustomer;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/customers", post(create_customer))
        .route("/api/customers/card/:card_id", get(find_by_card))
}

async fn find_by_card(
    State(state): State<AppState>,
    Path(card_id): Path<String>,
) -> Result<Json<CustomerWithCard>, ApiError> {
    state
        .db
        .customers()
        .find_by_card(card_id.trim())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No customer with card {}", card_id)))
}

/// Customer and loyalty account are created together or not at all.
async fn create_customer(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewCustomer>,
) -> Result<Json<CustomerWithCard>, ApiError> {
    let created = state.db.customers().create_with_card(&body).await?;
    Ok(Json(created))
}
