//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the
//! `config` and `dotenvy` crates. Variables use the `MEMBERSHIP_BILLING`
//! prefix and `__` between nested keys.
//!
//! # Example
//!
//! ```no_run
//! use membership_billing::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod auth;
mod database;
mod error;
mod payment;
mod server;

pub use auth::AuthConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, logging)
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL connection. Without it the service runs on in-memory stores.
    pub database: Option<DatabaseConfig>,

    /// Bearer token verification
    pub auth: AuthConfig,

    /// Stripe credentials and checkout settings
    pub payment: PaymentConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `MEMBERSHIP_BILLING` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `MEMBERSHIP_BILLING__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `MEMBERSHIP_BILLING__PAYMENT__STRIPE_API_KEY=...` -> `payment.stripe_api_key = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or a value
    /// cannot be parsed into its field type.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("MEMBERSHIP_BILLING")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found, section by section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        } else if self.server.is_production() {
            return Err(ValidationError::MissingRequired("DATABASE__URL"));
        }
        self.auth.validate(&self.server.environment)?;
        self.payment.validate(&self.server.environment)?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[(&str, &str)] = &[
        ("MEMBERSHIP_BILLING__AUTH__JWT_SECRET", "dev-secret"),
        ("MEMBERSHIP_BILLING__PAYMENT__STRIPE_API_KEY", "sk_test_xxx"),
        ("MEMBERSHIP_BILLING__PAYMENT__STRIPE_WEBHOOK_SECRET", "whsec_xxx"),
        (
            "MEMBERSHIP_BILLING__PAYMENT__SUCCESS_URL",
            "https://app.example.com/membership/success",
        ),
        (
            "MEMBERSHIP_BILLING__PAYMENT__CANCEL_URL",
            "https://app.example.com/membership",
        ),
    ];

    const OPTIONAL: &[&str] = &[
        "MEMBERSHIP_BILLING__DATABASE__URL",
        "MEMBERSHIP_BILLING__SERVER__PORT",
        "MEMBERSHIP_BILLING__SERVER__ENVIRONMENT",
    ];

    fn set_minimal_env() {
        for (key, value) in VARS {
            env::set_var(key, value);
        }
    }

    fn clear_env() {
        for (key, _) in VARS {
            env::remove_var(key);
        }
        for key in OPTIONAL {
            env::remove_var(key);
        }
    }

    fn load_with(extra: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        set_minimal_env();
        for (key, value) in extra {
            env::set_var(key, value);
        }
        let result = AppConfig::load();
        clear_env();
        result
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[]).unwrap();

        assert!(config.database.is_none());
        assert_eq!(config.payment.currency, "usd");
        assert_eq!(config.server.port, 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_section_is_picked_up() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[(
            "MEMBERSHIP_BILLING__DATABASE__URL",
            "postgresql://test@localhost/billing",
        )])
        .unwrap();

        let database = config.database.unwrap();
        assert_eq!(database.url, "postgresql://test@localhost/billing");
        assert!(database.run_migrations);
    }

    #[test]
    fn test_custom_server_port() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[("MEMBERSHIP_BILLING__SERVER__PORT", "3000")]).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_production_requires_database() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config =
            load_with(&[("MEMBERSHIP_BILLING__SERVER__ENVIRONMENT", "production")]).unwrap();

        assert!(config.is_production());
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("DATABASE__URL"))
        );
    }
}
