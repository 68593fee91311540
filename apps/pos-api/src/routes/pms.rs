//! Back office: suppliers, pricing, stock imports and the dashboard.

use apotheca_core::{LowStockItem, PriceHistoryEntry, ProductSupplier, Sale, Supplier};
use apotheca_db::repository::dashboard::MAX_RECENT_SALES;
use apotheca_db::repository::product::{ImportRow, ImportSummary};
use apotheca_db::repository::supplier::{
    PriceCalculation, ProductSupplierInput, ProductSupplierUpdate, SupplierInput,
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::Claims;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/pms/suppliers", get(list_suppliers).post(create_supplier))
        .route("/api/pms/suppliers/bulk-archive", post(bulk_archive_suppliers))
        .route("/api/pms/suppliers/:id", put(update_supplier).delete(archive_supplier))
        .route("/api/pms/suppliers/:id/restore", post(restore_supplier))
        .route("/api/pms/product-suppliers", post(link_product))
        .route("/api/pms/product-suppliers/:id", put(update_link).delete(remove_link))
        .route("/api/pms/products/:id/price-history", get(price_history))
        .route("/api/pms/products/:id/calculate-price", post(calculate_price))
        .route("/api/pms/bulk-import", post(bulk_import))
        .route("/api/pms/dashboard/low-stock", get(low_stock))
        .route("/api/pms/dashboard/recent-sales", get(recent_sales))
}

// =============================================================================
// Suppliers
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierListQuery {
    #[serde(default)]
    pub include_archived: bool,
}

async fn list_suppliers(
    State(state): State<AppState>,
    Query(query): Query<SupplierListQuery>,
) -> Result<Json<Vec<Supplier>>, ApiError> {
    Ok(Json(state.db.suppliers().list(query.include_archived).await?))
}

async fn create_supplier(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SupplierInput>,
) -> Result<Json<Supplier>, ApiError> {
    Ok(Json(state.db.suppliers().create(&body).await?))
}

async fn update_supplier(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<SupplierInput>,
) -> Result<Json<Supplier>, ApiError> {
    Ok(Json(state.db.suppliers().update(&id, &body).await?))
}

/// Soft delete; links and price history stay.
async fn archive_supplier(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Supplier>, ApiError> {
    Ok(Json(state.db.suppliers().archive(&id).await?))
}

async fn restore_supplier(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Supplier>, ApiError> {
    let supplier = state.db.suppliers().restore(&id).await?;
    info!(supplier_id = %id, by = %claims.sub, "Supplier restored");
    Ok(Json(supplier))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkArchiveRequest {
    pub supplier_ids: Vec<String>,
    #[serde(default)]
    pub archive_reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkArchiveResponse {
    pub success: bool,
    pub archived: u64,
}

async fn bulk_archive_suppliers(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(body): ApiJson<BulkArchiveRequest>,
) -> Result<Json<BulkArchiveResponse>, ApiError> {
    let archived = state.db.suppliers().bulk_archive(&body.supplier_ids).await?;
    info!(
        archived,
        reason = body.archive_reason.as_deref().unwrap_or("-"),
        by = %claims.sub,
        "Suppliers bulk archived"
    );
    Ok(Json(BulkArchiveResponse { success: true, archived }))
}

// =============================================================================
// Pricing
// =============================================================================

async fn link_product(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ProductSupplierInput>,
) -> Result<Json<ProductSupplier>, ApiError> {
    Ok(Json(state.db.suppliers().link_product(&body).await?))
}

async fn update_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ProductSupplierUpdate>,
) -> Result<Json<ProductSupplier>, ApiError> {
    Ok(Json(state.db.suppliers().update_link(&id, &body).await?))
}

/// Archives the link; the cheapest remaining supplier becomes preferred.
async fn remove_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductSupplier>, ApiError> {
    Ok(Json(state.db.suppliers().remove_link(&id).await?))
}

async fn price_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PriceHistoryEntry>>, ApiError> {
    Ok(Json(state.db.suppliers().price_history(&id).await?))
}

async fn calculate_price(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<PriceCalculation>,
) -> Result<Json<PriceHistoryEntry>, ApiError> {
    let entry = state.db.suppliers().calculate_price(&id, &body).await?;
    info!(
        product_id = %id,
        price_cents = entry.unit_price_cents.cents(),
        by = %claims.sub,
        "Selling price recalculated"
    );
    Ok(Json(entry))
}

// =============================================================================
// Stock
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkImportRequest {
    pub branch_id: String,
    pub rows: Vec<ImportRow>,
}

async fn bulk_import(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<BulkImportRequest>,
) -> Result<Json<ImportSummary>, ApiError> {
    Ok(Json(state.db.products().bulk_import(&body.branch_id, &body.rows).await?))
}

// =============================================================================
// Dashboard
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQuery {
    pub branch_id: String,
    pub limit: Option<i64>,
}

async fn low_stock(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Vec<LowStockItem>>, ApiError> {
    Ok(Json(state.db.dashboard().low_stock(&query.branch_id).await?))
}

async fn recent_sales(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Vec<Sale>>, ApiError> {
    let limit = query.limit.unwrap_or(20).min(MAX_RECENT_SALES);
    Ok(Json(state.db.dashboard().recent_sales(&query.branch_id, limit).await?))
}
