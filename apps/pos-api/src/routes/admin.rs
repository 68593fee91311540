//! Branch and staff administration (ADMIN only).

use apotheca_core::{Branch, Pharmacist, User};
use apotheca_db::repository::branch::NewBranch;
use apotheca_db::repository::staff::{NewPharmacist, NewUser};
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use tracing::info;

use crate::auth::Claims;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/branches", get(list_branches).post(create_branch))
        .route("/api/admin/pharmacists", post(create_pharmacist))
        .route("/api/admin/users", post(create_user))
}

async fn list_branches(State(state): State<AppState>) -> Result<Json<Vec<Branch>>, ApiError> {
    Ok(Json(state.db.branches().list().await?))
}

async fn create_branch(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewBranch>,
) -> Result<Json<Branch>, ApiError> {
    Ok(Json(state.db.branches().create(&body).await?))
}

async fn create_pharmacist(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(body): ApiJson<NewPharmacist>,
) -> Result<Json<Pharmacist>, ApiError> {
    let pharmacist = state.db.staff().create_pharmacist(&body).await?;
    info!(staff_id = %pharmacist.id, by = %claims.sub, "Pharmacist created");
    Ok(Json(pharmacist))
}

/// PMS accounts only; pharmacists go through `/api/admin/pharmacists`.
async fn create_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(body): ApiJson<NewUser>,
) -> Result<Json<User>, ApiError> {
    let user = state.db.staff().create_user(&body).await?;
    info!(employee_id = %user.employee_id, role = %user.role, by = %claims.sub, "User created");
    Ok(Json(user))
}
