//! Payment provider port.
//!
//! The reconciler treats webhook payloads as pointers; anything it needs to
//! trust (billing period, cancel flag, card) is re-fetched through this port.
//!
//! # Implementations
//!
//! - `StripePaymentAdapter` - Stripe REST API over reqwest
//! - `MockPaymentProvider` - in-process fake for tests and local runs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::billing::BillingInterval;
use crate::domain::foundation::{PlanId, UserId};
use crate::domain::membership::{CardDetails, MembershipError};

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a customer record at the provider.
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError>;

    /// Create a product and its recurring price for a plan.
    async fn create_product_and_price(
        &self,
        request: CreatePriceRequest,
    ) -> Result<ProviderPrice, PaymentError>;

    /// Create a hosted checkout session in subscription mode.
    ///
    /// `metadata` is attached to both the session and the subscription it
    /// creates.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Fetch the current state of a subscription.
    async fn get_subscription(&self, subscription_id: &str) -> Result<Subscription, PaymentError>;

    /// Cancel a subscription immediately.
    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), PaymentError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCustomerRequest {
    pub user_id: UserId,
    pub email: String,
    pub name: Option<String>,
    /// Stripe de-duplicates repeated requests carrying the same key.
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePriceRequest {
    pub plan_id: PlanId,
    pub product_name: String,
    pub unit_amount_minor: i64,
    pub currency: String,
    pub interval: BillingInterval,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPrice {
    pub product_id: String,
    pub price_id: String,
}

/// What the checkout session charges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutLineItem {
    /// The plan's standing recurring price.
    Price { price_id: String },
    /// A one-off recurring price, used when a coupon changes the amount.
    Inline {
        product_id: String,
        unit_amount_minor: i64,
        currency: String,
        interval: BillingInterval,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCheckoutRequest {
    pub customer_id: String,
    pub line_item: CheckoutLineItem,
    pub metadata: HashMap<String, String>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Authoritative view of a provider subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub customer_id: Option<String>,
    pub status: String,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub cancel_at_period_end: bool,
    pub price_id: Option<String>,
    pub card: Option<CardDetails>,
    pub metadata: HashMap<String, String>,
}

/// Errors from payment provider operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentError {
    pub code: PaymentErrorCode,
    pub message: String,
    /// Provider's own error code, when it returned one.
    pub provider_code: Option<String>,
    pub retryable: bool,
}

impl PaymentError {
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(PaymentErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderError, message)
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for MembershipError {
    fn from(err: PaymentError) -> Self {
        MembershipError::Provider(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    NetworkError,
    AuthenticationError,
    RateLimited,
    InvalidRequest,
    NotFound,
    ProviderError,
}

impl PaymentErrorCode {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError
                | PaymentErrorCode::RateLimited
                | PaymentErrorCode::ProviderError
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::RateLimited => "rate_limited",
            PaymentErrorCode::InvalidRequest => "invalid_request",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::ProviderError => "provider_error",
        }
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
