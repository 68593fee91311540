//! Product lookup at the counter.

use apotheca_core::ProductListing;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::auth::Claims;
use crate::error::ApiError;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/products/search", get(search))
        .route("/api/products/barcode/:barcode", get(by_barcode))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
    /// Defaults to the pharmacist's own branch.
    pub branch_id: Option<String>,
}

async fn search(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<ProductListing>>, ApiError> {
    let branch_id = params.branch_id.or(claims.branch_id);
    let listings = state
        .db
        .products()
        .search(&params.query, branch_id.as_deref())
        .await?;
    Ok(Json(listings))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarcodeQuery {
    pub branch_id: Option<String>,
}

async fn by_barcode(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(barcode): Path<String>,
    Query(params): Query<BarcodeQuery>,
) -> Result<Json<ProductListing>, ApiError> {
    let branch_id = params.branch_id.or(claims.branch_id);
    state
        .db
        .products()
        .get_by_barcode(&barcode, branch_id.as_deref())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No product with barcode {}", barcode)))
}
