//! Stripe payment provider adapter.
//!
//! Implements `PaymentProvider` over Stripe's form-encoded REST API.
//! Webhook signatures are verified in the domain, not here.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key);
//! let adapter = StripePaymentAdapter::new(config)?;
//! ```

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::domain::membership::CardDetails;
use crate::ports::{
    CheckoutLineItem, CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest,
    CreatePriceRequest, Customer, PaymentError, PaymentProvider, ProviderPrice, Subscription,
};

use super::api_types::{
    error_from_response, StripeCheckoutSession, StripeCustomer, StripeObjectId,
    StripeSubscription,
};

const DEFAULT_BASE_URL: &str = "https://api.stripe.com";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,
    api_base_url: String,
    timeout: Duration,
}

impl StripeConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            api_base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Point at a different host (stripe-mock, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Stripe payment provider adapter.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

type Form = Vec<(String, String)>;

impl StripePaymentAdapter {
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::provider(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        operation: &'static str,
    ) -> Result<T, PaymentError> {
        let response = request
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = error_from_response(status.as_u16(), &body);
            tracing::error!(
                operation,
                status = status.as_u16(),
                error = %error,
                "Stripe request failed"
            );
            return Err(error);
        }

        response.json::<T>().await.map_err(|e| {
            PaymentError::provider(format!("Failed to parse Stripe {} response: {}", operation, e))
        })
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &Form,
        idempotency_key: Option<&str>,
        operation: &'static str,
    ) -> Result<T, PaymentError> {
        let mut request = self.http_client.post(self.url(path)).form(form);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        self.send(request, operation).await
    }
}

/// Form fields for a checkout session.
///
/// Metadata goes on the session and on `subscription_data` so renewal
/// invoices can recover it from the subscription.
fn checkout_form(request: &CreateCheckoutRequest) -> Form {
    let mut form: Form = vec![
        ("mode".into(), "subscription".into()),
        ("customer".into(), request.customer_id.clone()),
        ("line_items[0][quantity]".into(), "1".into()),
        ("success_url".into(), request.success_url.clone()),
        ("cancel_url".into(), request.cancel_url.clone()),
    ];

    match &request.line_item {
        CheckoutLineItem::Price { price_id } => {
            form.push(("line_items[0][price]".into(), price_id.clone()));
        }
        CheckoutLineItem::Inline {
            product_id,
            unit_amount_minor,
            currency,
            interval,
        } => {
            let prefix = "line_items[0][price_data]";
            form.push((format!("{prefix}[product]"), product_id.clone()));
            form.push((format!("{prefix}[unit_amount]"), unit_amount_minor.to_string()));
            form.push((format!("{prefix}[currency]"), currency.clone()));
            form.push((format!("{prefix}[recurring][interval]"), interval.as_str().to_string()));
        }
    }

    let mut keys: Vec<&String> = request.metadata.keys().collect();
    keys.sort();
    for key in keys {
        let value = &request.metadata[key];
        form.push((format!("metadata[{}]", key), value.clone()));
        form.push((format!("subscription_data[metadata][{}]", key), value.clone()));
    }

    form
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        let mut form: Form = vec![
            ("email".into(), request.email.clone()),
            ("metadata[userId]".into(), request.user_id.to_string()),
        ];
        if let Some(name) = &request.name {
            form.push(("name".into(), name.clone()));
        }

        let customer: StripeCustomer = self
            .post_form(
                "/v1/customers",
                &form,
                Some(&request.idempotency_key),
                "create_customer",
            )
            .await?;

        tracing::info!(customer_id = %customer.id, user_id = %request.user_id, "Stripe customer created");
        Ok(Customer {
            id: customer.id,
            email: customer.email.unwrap_or(request.email),
        })
    }

    async fn create_product_and_price(
        &self,
        request: CreatePriceRequest,
    ) -> Result<ProviderPrice, PaymentError> {
        let product: StripeObjectId = self
            .post_form(
                "/v1/products",
                &vec![
                    ("name".into(), request.product_name.clone()),
                    ("metadata[planId]".into(), request.plan_id.to_string()),
                ],
                Some(&format!("product-{}", request.plan_id)),
                "create_product",
            )
            .await?;

        let price: StripeObjectId = self
            .post_form(
                "/v1/prices",
                &vec![
                    ("product".into(), product.id.clone()),
                    ("unit_amount".into(), request.unit_amount_minor.to_string()),
                    ("currency".into(), request.currency.clone()),
                    ("recurring[interval]".into(), request.interval.as_str().to_string()),
                ],
                Some(&format!(
                    "price-{}-{}-{}",
                    request.plan_id,
                    request.unit_amount_minor,
                    request.interval.as_str()
                )),
                "create_price",
            )
            .await?;

        tracing::info!(
            plan_id = %request.plan_id,
            product_id = %product.id,
            price_id = %price.id,
            "Stripe price provisioned"
        );
        Ok(ProviderPrice {
            product_id: product.id,
            price_id: price.id,
        })
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let session: StripeCheckoutSession = self
            .post_form(
                "/v1/checkout/sessions",
                &checkout_form(&request),
                None,
                "create_checkout_session",
            )
            .await?;

        let url = session.url.ok_or_else(|| {
            PaymentError::provider(format!("Checkout session {} has no redirect URL", session.id))
        })?;
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    async fn get_subscription(&self, subscription_id: &str) -> Result<Subscription, PaymentError> {
        let request = self
            .http_client
            .get(self.url(&format!("/v1/subscriptions/{}", subscription_id)))
            .query(&[("expand[]", "default_payment_method")]);
        let sub: StripeSubscription = self.send(request, "get_subscription").await?;

        Ok(Subscription {
            current_period_start: sub.period_start(),
            current_period_end: sub.period_end(),
            price_id: sub.price_id().map(str::to_string),
            card: sub
                .default_payment_method
                .as_ref()
                .and_then(|pm| pm.card.as_ref())
                .map(|card| CardDetails {
                    brand: card.brand.clone(),
                    last4: card.last4.clone(),
                }),
            id: sub.id,
            customer_id: sub.customer,
            status: sub.status,
            cancel_at_period_end: sub.cancel_at_period_end,
            metadata: sub.metadata,
        })
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), PaymentError> {
        let request = self
            .http_client
            .delete(self.url(&format!("/v1/subscriptions/{}", subscription_id)));
        let _: StripeObjectId = self.send(request, "cancel_subscription").await?;
        tracing::info!(subscription_id, "Stripe subscription canceled");
        Ok(())
    }
}
