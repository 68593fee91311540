//! # Apotheca POS API
//!
//! REST server for the pharmacy counter (POS) and the back office (PMS).
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          POS API Routes                                 │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  public        │  │  POS           │  │  PMS (ADMIN / MANAGER)     ││
//! │  │                │  │  (PHARMACIST)  │  │                            ││
//! │  │ • /health      │  │ • sales        │  │ • suppliers                ││
//! │  │ • pms login    │  │ • products     │  │ • product-suppliers        ││
//! │  │ • pos login    │  │ • held carts   │  │ • calculate-price          ││
//! │  │ • password     │  │ • returns      │  │ • bulk-import              ││
//! │  │   reset        │  │ • sessions     │  │ • dashboard                ││
//! │  │                │  │ • customers    │  │                            ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌────────────────┐  ┌──────────────────────────────────────────────┐  │
//! │  │ ADMIN          │  │  AppState                                    │  │
//! │  │ • branches     │  │  Database · CheckoutOrchestrator · JWT ·     │  │
//! │  │ • pharmacists  │  │  AppConfig                                   │  │
//! │  │ • users        │  │                                              │  │
//! │  └────────────────┘  └──────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config`]: `apotheca.toml` plus `APOTHECA__SECTION__KEY` variables.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use std::sync::Arc;

use apotheca_db::{CheckoutOrchestrator, Database};

// Re-exports
pub use config::AppConfig;
pub use error::ApiError;
pub use routes::router;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub checkout: CheckoutOrchestrator,
    pub jwt: Arc<auth::JwtManager>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig) -> Result<Self, config::ConfigError> {
        let policy = config.checkout_policy()?;
        let jwt = auth::JwtManager::new(
            &config.auth.jwt_secret,
            config.auth.pms_token_hours,
            config.auth.pos_token_hours,
        );

        Ok(AppState {
            checkout: db.checkout(policy),
            db,
            jwt: Arc::new(jwt),
            config: Arc::new(config),
        })
    }
}
