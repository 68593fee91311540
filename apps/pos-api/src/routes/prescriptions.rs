//! Prescriptions recorded at the counter.

use apotheca_core::PrescriptionDetail;
use apotheca_db::repository::prescription::NewPrescription;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};

use crate::auth::Claims;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/prescriptions", post(create_prescription))
        .route("/api/prescriptions/:id", get(get_prescription))
}

/// Recorded against the token's branch and pharmacist.
async fn create_prescription(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(body): ApiJson<NewPrescription>,
) -> Result<Json<PrescriptionDetail>, ApiError> {
    let branch_id = claims.branch_id.as_deref().ok_or(ApiError::Forbidden)?;
    let created = state
        .db
        .prescriptions()
        .create(branch_id, &claims.sub, &body)
        .await?;
    Ok(Json(created))
}

async fn get_prescription(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PrescriptionDetail>, ApiError> {
    state
        .db
        .prescriptions()
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Prescription not found: {}", id)))
}
