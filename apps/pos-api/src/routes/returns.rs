//! Returns against completed sales.

use apotheca_core::checkout::ReturnRequest;
use apotheca_db::repository::returns::ReturnReceipt;
use axum::{extract::State, routing::post, Extension, Json, Router};

use crate::auth::Claims;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/returns", post(process_return))
}

async fn process_return(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(mut request): ApiJson<ReturnRequest>,
) -> Result<Json<ReturnReceipt>, ApiError> {
    if request.pharmacist_session_id.is_none() {
        request.pharmacist_session_id = claims.pharmacist_session_id;
    }

    let receipt = state.db.returns().process_return(&request).await?;
    Ok(Json(receipt))
}
