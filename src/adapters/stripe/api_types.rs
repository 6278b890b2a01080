//! Stripe REST response shapes.
//!
//! Only fields the adapter reads are declared; serde ignores the rest.

use serde::Deserialize;
use std::collections::HashMap;

use crate::ports::{PaymentError, PaymentErrorCode};

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeObjectId {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    pub status: String,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub items: StripeList<StripeSubscriptionItem>,
    /// Expanded via `expand[]=default_payment_method`.
    #[serde(default)]
    pub default_payment_method: Option<StripePaymentMethod>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeSubscription {
    fn first_item(&self) -> Option<&StripeSubscriptionItem> {
        self.items.data.first()
    }

    /// Newer API versions report the period on the item only.
    pub fn period_start(&self) -> Option<i64> {
        self.current_period_start
            .or_else(|| self.first_item().and_then(|i| i.current_period_start))
    }

    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end
            .or_else(|| self.first_item().and_then(|i| i.current_period_end))
    }

    pub fn price_id(&self) -> Option<&str> {
        self.first_item()
            .and_then(|i| i.price.as_ref())
            .map(|p| p.id.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
}

impl<T> Default for StripeList<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    #[serde(default)]
    pub price: Option<StripeObjectId>,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentMethod {
    #[serde(default)]
    pub card: Option<StripeCard>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCard {
    pub brand: String,
    pub last4: String,
}

#[derive(Debug, Clone, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Maps a non-success response to a `PaymentError`.
pub fn error_from_response(status: u16, body: &str) -> PaymentError {
    let code = match status {
        401 | 403 => PaymentErrorCode::AuthenticationError,
        404 => PaymentErrorCode::NotFound,
        429 => PaymentErrorCode::RateLimited,
        400 | 402 => PaymentErrorCode::InvalidRequest,
        _ => PaymentErrorCode::ProviderError,
    };
    match serde_json::from_str::<StripeErrorBody>(body) {
        Ok(parsed) => {
            let error = PaymentError::new(
                code,
                parsed
                    .error
                    .message
                    .unwrap_or_else(|| format!("Stripe returned {}", status)),
            );
            match parsed.error.code {
                Some(provider_code) => error.with_provider_code(provider_code),
                None => error,
            }
        }
        Err(_) => PaymentError::new(code, format!("Stripe returned {}: {}", status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscription_period_falls_back_to_item() {
        let sub: StripeSubscription = serde_json::from_value(json!({
            "id": "sub_1",
            "status": "active",
            "items": {"data": [{
                "price": {"id": "price_1"},
                "current_period_start": 100,
                "current_period_end": 200
            }]}
        }))
        .unwrap();

        assert_eq!(sub.period_start(), Some(100));
        assert_eq!(sub.period_end(), Some(200));
        assert_eq!(sub.price_id(), Some("price_1"));
    }

    #[test]
    fn expanded_card_is_read() {
        let sub: StripeSubscription = serde_json::from_value(json!({
            "id": "sub_1",
            "status": "active",
            "current_period_end": 200,
            "default_payment_method": {"card": {"brand": "visa", "last4": "4242"}}
        }))
        .unwrap();

        let card = sub.default_payment_method.and_then(|pm| pm.card).unwrap();
        assert_eq!(card.last4, "4242");
    }

    #[test]
    fn error_body_is_mapped() {
        let err = error_from_response(
            404,
            r#"{"error": {"code": "resource_missing", "message": "No such subscription"}}"#,
        );
        assert_eq!(err.code, PaymentErrorCode::NotFound);
        assert_eq!(err.message, "No such subscription");
        assert_eq!(err.provider_code.as_deref(), Some("resource_missing"));
    }

    #[test]
    fn unparseable_error_body_keeps_raw_text() {
        let err = error_from_response(503, "upstream unavailable");
        assert_eq!(err.code, PaymentErrorCode::ProviderError);
        assert!(err.retryable);
        assert!(err.message.contains("upstream unavailable"));
    }
}
