//! Payment configuration

use secrecy::SecretString;
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe secret API key
    #[serde(default)]
    pub stripe_api_key: String,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,

    /// ISO currency for checkout, lowercase
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Where Checkout sends the buyer after paying
    pub success_url: String,

    /// Where Checkout sends the buyer after backing out
    pub cancel_url: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Maximum age of a signed webhook, in seconds
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_secs: i64,

    /// Use the in-process mock provider instead of calling Stripe
    #[serde(default)]
    pub use_mock_provider: bool,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    pub fn api_key(&self) -> SecretString {
        SecretString::new(self.stripe_api_key.clone())
    }

    pub fn webhook_secret(&self) -> SecretString {
        SecretString::new(self.stripe_webhook_secret.clone())
    }

    /// Validate payment configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.use_mock_provider {
            if *environment == Environment::Production {
                return Err(ValidationError::MockProviderInProduction);
            }
        } else {
            if self.stripe_api_key.is_empty() {
                return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"));
            }
            if !self.stripe_api_key.starts_with("sk_") && !self.stripe_api_key.starts_with("rk_") {
                return Err(ValidationError::InvalidStripeKey);
            }
        }

        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_WEBHOOK_SECRET"));
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }

        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(ValidationError::InvalidCurrency(self.currency.clone()));
        }
        if !is_absolute_url(&self.success_url) {
            return Err(ValidationError::InvalidRedirectUrl("success_url"));
        }
        if !is_absolute_url(&self.cancel_url) {
            return Err(ValidationError::InvalidRedirectUrl("cancel_url"));
        }
        if !(1..=3600).contains(&self.webhook_tolerance_secs) {
            return Err(ValidationError::InvalidWebhookTolerance);
        }

        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_api_key: String::new(),
            stripe_webhook_secret: String::new(),
            currency: default_currency(),
            success_url: String::new(),
            cancel_url: String::new(),
            api_base_url: default_api_base_url(),
            webhook_tolerance_secs: default_webhook_tolerance(),
            use_mock_provider: false,
        }
    }
}

fn is_absolute_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_api_base_url() -> String {
    "https://api.stripe.com/v1".to_string()
}

fn default_webhook_tolerance() -> i64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> PaymentConfig {
        PaymentConfig {
            stripe_api_key: "sk_test_abcd1234".to_string(),
            stripe_webhook_secret: "whsec_xyz789".to_string(),
            success_url: "https://app.example.com/membership/success".to_string(),
            cancel_url: "https://app.example.com/membership".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = PaymentConfig::default();
        assert_eq!(config.currency, "usd");
        assert_eq!(config.webhook_tolerance_secs, 300);
        assert_eq!(config.api_base_url, "https://api.stripe.com/v1");
    }

    #[test]
    fn test_validation_valid_config() {
        let config = valid();
        assert!(config.is_test_mode());
        assert!(config.validate(&Environment::Production).is_ok());
    }

    #[test]
    fn test_validation_key_prefixes() {
        let config = PaymentConfig {
            stripe_api_key: "pk_test_xxx".to_string(),
            ..valid()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidStripeKey)
        );

        let config = PaymentConfig {
            stripe_webhook_secret: "secret_xxx".to_string(),
            ..valid()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidStripeWebhookSecret)
        );
    }

    #[test]
    fn test_mock_provider_needs_no_api_key_but_not_in_production() {
        let config = PaymentConfig {
            stripe_api_key: String::new(),
            use_mock_provider: true,
            ..valid()
        };
        assert!(config.validate(&Environment::Development).is_ok());
        assert_eq!(
            config.validate(&Environment::Production),
            Err(ValidationError::MockProviderInProduction)
        );
    }

    #[test]
    fn test_validation_currency_and_urls() {
        let config = PaymentConfig {
            currency: "USD".to_string(),
            ..valid()
        };
        assert!(matches!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidCurrency(_))
        ));

        let config = PaymentConfig {
            success_url: "/membership/success".to_string(),
            ..valid()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidRedirectUrl("success_url"))
        );
    }

    #[test]
    fn test_validation_tolerance_bounds() {
        let config = PaymentConfig {
            webhook_tolerance_secs: 0,
            ..valid()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidWebhookTolerance)
        );
    }
}
