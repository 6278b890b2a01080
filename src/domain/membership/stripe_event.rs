//! Stripe webhook event types.
//!
//! Only the fields reconciliation reads are captured; everything else in
//! Stripe's schema is ignored. Payload objects are treated as pointers: the
//! reconciler re-fetches the subscription for authoritative billing periods.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::WebhookError;
use crate::domain::foundation::Timestamp;

/// Stripe webhook event envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    /// `evt_...`
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix seconds.
    pub created: i64,

    pub data: StripeEventData,

    #[serde(default)]
    pub livemode: bool,

    #[serde(default)]
    pub api_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_attributes: Option<serde_json::Value>,
}

impl StripeEvent {
    /// Parses a verified request body.
    pub fn from_payload(payload: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(payload).map_err(|e| WebhookError::MalformedPayload(e.to_string()))
    }

    /// Event creation time; falls back to `now` for out-of-range values.
    pub fn created_at(&self, now: Timestamp) -> Timestamp {
        Timestamp::from_unix_secs(self.created).unwrap_or(now)
    }

    fn object<T: serde::de::DeserializeOwned>(&self) -> Result<T, WebhookError> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| WebhookError::MalformedPayload(format!("{}: {}", self.event_type, e)))
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Payload objects
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InvoiceObject {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    subscription: Option<String>,
    #[serde(default)]
    parent: Option<InvoiceParent>,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub amount_due: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub hosted_invoice_url: Option<String>,
    #[serde(default)]
    pub invoice_pdf: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub attempt_count: Option<u32>,
    #[serde(default)]
    pub last_finalization_error: Option<StripeErrorObject>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct InvoiceParent {
    #[serde(default)]
    subscription_details: Option<InvoiceSubscriptionDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct InvoiceSubscriptionDetails {
    #[serde(default)]
    subscription: Option<String>,
}

impl InvoiceObject {
    /// Subscription id, from the legacy top-level field or the newer
    /// `parent.subscription_details`.
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription.as_deref().or_else(|| {
            self.parent
                .as_ref()
                .and_then(|p| p.subscription_details.as_ref())
                .and_then(|d| d.subscription.as_deref())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StripeErrorObject {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscriptionObject {
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
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChargeObject {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub amount_refunded: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub invoice: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Closed event set
// ════════════════════════════════════════════════════════════════════════════════

/// Billing events the reconciler understands, one variant per handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
    CheckoutCompleted(CheckoutSessionObject),
    InvoicePaid(InvoiceObject),
    InvoicePaymentFailed(InvoiceObject),
    SubscriptionUpdated(SubscriptionObject),
    SubscriptionDeleted(SubscriptionObject),
    ChargeRefunded(ChargeObject),
    /// Anything else; logged and acknowledged.
    Unknown(String),
}

impl BillingEvent {
    pub fn from_stripe(event: &StripeEvent) -> Result<Self, WebhookError> {
        Ok(match event.event_type.as_str() {
            "checkout.session.completed" => BillingEvent::CheckoutCompleted(event.object()?),
            // Both arrive for one invoice; the aggregate confirms an invoice once.
            "invoice.paid" | "invoice.payment_succeeded" => BillingEvent::InvoicePaid(event.object()?),
            "invoice.payment_failed" => BillingEvent::InvoicePaymentFailed(event.object()?),
            "customer.subscription.updated" => BillingEvent::SubscriptionUpdated(event.object()?),
            "customer.subscription.deleted" => BillingEvent::SubscriptionDeleted(event.object()?),
            "charge.refunded" => BillingEvent::ChargeRefunded(event.object()?),
            other => BillingEvent::Unknown(other.to_string()),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BillingEvent::CheckoutCompleted(_) => "checkout_completed",
            BillingEvent::InvoicePaid(_) => "invoice_paid",
            BillingEvent::InvoicePaymentFailed(_) => "invoice_payment_failed",
            BillingEvent::SubscriptionUpdated(_) => "subscription_updated",
            BillingEvent::SubscriptionDeleted(_) => "subscription_deleted",
            BillingEvent::ChargeRefunded(_) => "charge_refunded",
            BillingEvent::Unknown(_) => "unknown",
        }
    }
}

/// Builder for Stripe event JSON in tests.
#[cfg(test)]
pub struct StripeEventBuilder {
    id: String,
    event_type: String,
    created: i64,
    object: serde_json::Value,
}

#[cfg(test)]
impl StripeEventBuilder {
    pub fn new(event_type: &str) -> Self {
        Self {
            id: format!("evt_{}", uuid::Uuid::new_v4().simple()),
            event_type: event_type.to_string(),
            created: 1_700_000_000,
            object: serde_json::json!({}),
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn created(mut self, created: i64) -> Self {
        self.created = created;
        self
    }

    pub fn object(mut self, object: serde_json::Value) -> Self {
        self.object = object;
        self
    }

    pub fn build(self) -> StripeEvent {
        StripeEvent {
            id: self.id,
            event_type: self.event_type,
            created: self.created,
            data: StripeEventData {
                object: self.object,
                previous_attributes: None,
            },
            livemode: false,
            api_version: None,
        }
    }
}
