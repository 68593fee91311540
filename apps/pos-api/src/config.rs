//! POS API configuration module.
//!
//! Layered with the `config` crate, later sources win:
//!
//! ```text
//!   AppConfig::default()
//!        │
//!        ▼
//!   apotheca.toml              (or the file named by APOTHECA_CONFIG, optional)
//!        │
//!        ▼
//!   APOTHECA__<SECTION>__<KEY> (e.g. APOTHECA__SERVER__PORT=9090)
//! ```

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use apotheca_core::{invoice::BusinessClock, LoyaltyPolicy, TaxRate};
use apotheca_db::{CheckoutPolicy, DbConfig};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Signing secret shipped for local development. Refused in production.
pub const DEV_JWT_SECRET: &str = "apotheca-dev-secret-change-in-production";

const DEFAULT_CONFIG_FILE: &str = "apotheca.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunEnvironment {
    #[default]
    Development,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file, created on first start.
    pub path: PathBuf,
    pub max_connections: u32,
    /// How long a writer waits for the SQLite write lock.
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: PathBuf::from("./apotheca.db"),
            max_connections: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub pms_token_hours: i64,
    pub pos_token_hours: i64,
    pub reset_token_ttl_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            pms_token_hours: 8,
            pos_token_hours: 12,
            reset_token_ttl_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    pub currency_per_point: i64,
    pub currency_per_redeemable_point: i64,
    pub point_value_cents: i64,
    /// 1200 = 12% VAT. Zero when shelf prices already include it.
    pub vat_rate_bps: u32,
    /// Business-day offset from UTC; +480 for Asia/Manila.
    pub utc_offset_minutes: i32,
    pub transaction_timeout_ms: u64,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        let loyalty = LoyaltyPolicy::default();
        CheckoutConfig {
            currency_per_point: loyalty.currency_per_point,
            currency_per_redeemable_point: loyalty.currency_per_redeemable_point,
            point_value_cents: loyalty.point_value_cents,
            vat_rate_bps: 0,
            utc_offset_minutes: 480,
            transaction_timeout_ms: 30_000,
        }
    }
}

/// POS API configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub checkout: CheckoutConfig,
    pub environment: RunEnvironment,
}

impl AppConfig {
    /// Load configuration from the optional file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = env::var("APOTHECA_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let defaults = Config::try_from(&AppConfig::default())?;
        let config: AppConfig = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name(&file).required(false))
            .add_source(Environment::with_prefix("APOTHECA").separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment == RunEnvironment::Production && self.auth.jwt_secret == DEV_JWT_SECRET {
            return Err(ConfigError::InsecureSecret);
        }
        if self.auth.jwt_secret.len() < 16 {
            return Err(ConfigError::InvalidValue("auth.jwt_secret".to_string()));
        }
        if self.checkout.currency_per_point <= 0
            || self.checkout.currency_per_redeemable_point <= 0
            || self.checkout.point_value_cents <= 0
        {
            return Err(ConfigError::InvalidValue("checkout loyalty rates".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue("database.max_connections".to_string()));
        }
        BusinessClock::new(self.checkout.utc_offset_minutes)
            .map_err(|_| ConfigError::InvalidValue("checkout.utc_offset_minutes".to_string()))?;
        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == RunEnvironment::Development
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("server.host".to_string()))
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    pub fn checkout_policy(&self) -> Result<CheckoutPolicy, ConfigError> {
        let checkout = &self.checkout;
        let clock = BusinessClock::new(checkout.utc_offset_minutes)
            .map_err(|_| ConfigError::InvalidValue("checkout.utc_offset_minutes".to_string()))?;

        Ok(CheckoutPolicy {
            loyalty: LoyaltyPolicy {
                currency_per_point: checkout.currency_per_point,
                currency_per_redeemable_point: checkout.currency_per_redeemable_point,
                point_value_cents: checkout.point_value_cents,
            },
            vat_rate: TaxRate::from_bps(checkout.vat_rate_bps),
            clock,
            transaction_timeout: Duration::from_millis(checkout.transaction_timeout_ms),
        })
    }

    pub fn reset_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.auth.reset_token_ttl_minutes)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("auth.jwt_secret must be set in production")]
    InsecureSecret,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.is_development());
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_production_rejects_dev_secret() {
        let mut config = AppConfig::default();
        config.environment = RunEnvironment::Production;
        assert!(matches!(config.validate(), Err(ConfigError::InsecureSecret)));

        config.auth.jwt_secret = "a-real-secret-from-the-vault".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_checkout_policy_from_config() {
        let mut config = AppConfig::default();
        config.checkout.vat_rate_bps = 1200;
        config.checkout.transaction_timeout_ms = 2_000;

        let policy = config.checkout_policy().unwrap();
        assert_eq!(policy.vat_rate, TaxRate::from_bps(1200));
        assert_eq!(policy.transaction_timeout, Duration::from_secs(2));
        assert_eq!(policy.loyalty, LoyaltyPolicy::default());
    }

    #[test]
    fn test_bad_offset_rejected() {
        let mut config = AppConfig::default();
        config.checkout.utc_offset_minutes = 24 * 60;
        assert!(config.validate().is_err());
    }
}
