//! Route table.
//!
//! Each group sits behind its own role gate via `route_layer`, so unknown
//! paths still fall through to a plain 404 instead of a 401.

use axum::{middleware, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{require_admin, require_pharmacist, require_pms_user};
use crate::error::with_error_detail;
use crate::AppState;

pub mod admin;
pub mod auth;
pub mod customers;
pub mod held;
pub mod pms;
pub mod prescriptions;
pub mod products;
pub mod returns;
pub mod sales;
pub mod sessions;

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let pos = Router::new()
        .merge(sales::routes())
        .merge(products::routes())
        .merge(held::routes())
        .merge(returns::routes())
        .merge(sessions::routes())
        .merge(customers::routes())
        .merge(prescriptions::routes())
        .merge(auth::pos_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_pharmacist));

    let pms = pms::routes().route_layer(middleware::from_fn_with_state(state.clone(), require_pms_user));

    let admin = admin::routes().route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let mut app = Router::new()
        .route("/health", get(health))
        .merge(auth::public_routes())
        .merge(pos)
        .merge(pms)
        .merge(admin);

    if state.config.is_development() {
        app = app.layer(middleware::from_fn(with_error_detail));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
