//! Append-only audit trail.
//!
//! Every membership transition is recorded for support and dispute
//! resolution. Entries are never consulted for authorization.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{AuditEntryId, MembershipId, PlanId, Timestamp, UserId, ValidationError};
use crate::domain::membership::MembershipEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    MembershipCreated,
    Activation,
    Cancellation,
    Expiry,
    StatusChange,
    CouponApplied,
    PaymentSuccess,
    PaymentFailed,
    PaymentRefunded,
    AdminAction,
    /// A verified webhook that could not be applied.
    WebhookProcessingFailed,
}

impl AuditEventKind {
    const ALL: [AuditEventKind; 11] = [
        AuditEventKind::MembershipCreated,
        AuditEventKind::Activation,
        AuditEventKind::Cancellation,
        AuditEventKind::Expiry,
        AuditEventKind::StatusChange,
        AuditEventKind::CouponApplied,
        AuditEventKind::PaymentSuccess,
        AuditEventKind::PaymentFailed,
        AuditEventKind::PaymentRefunded,
        AuditEventKind::AdminAction,
        AuditEventKind::WebhookProcessingFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::MembershipCreated => "membership_created",
            AuditEventKind::Activation => "activation",
            AuditEventKind::Cancellation => "cancellation",
            AuditEventKind::Expiry => "expiry",
            AuditEventKind::StatusChange => "status_change",
            AuditEventKind::CouponApplied => "coupon_applied",
            AuditEventKind::PaymentSuccess => "payment_success",
            AuditEventKind::PaymentFailed => "payment_failed",
            AuditEventKind::PaymentRefunded => "payment_refunded",
            AuditEventKind::AdminAction => "admin_action",
            AuditEventKind::WebhookProcessingFailed => "webhook_processing_failed",
        }
    }
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditEventKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditEventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::invalid_format("event_kind", format!("unknown kind '{}'", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: AuditEntryId,
    pub user_id: Option<UserId>,
    pub plan_id: Option<PlanId>,
    pub membership_id: Option<MembershipId>,
    pub kind: AuditEventKind,
    pub message: String,
    pub payload: JsonValue,
    pub external_event_id: Option<String>,
    pub external_payment_id: Option<String>,
    pub external_invoice_id: Option<String>,
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
    pub created_at: Timestamp,
}

impl AuditLogEntry {
    pub fn new(kind: AuditEventKind, message: impl Into<String>, at: Timestamp) -> Self {
        Self {
            id: AuditEntryId::new(),
            user_id: None,
            plan_id: None,
            membership_id: None,
            kind,
            message: message.into(),
            payload: JsonValue::Null,
            external_event_id: None,
            external_payment_id: None,
            external_invoice_id: None,
            amount_minor: None,
            currency: None,
            created_at: at,
        }
    }

    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_external_event(mut self, event_id: Option<String>) -> Self {
        self.external_event_id = event_id;
        self
    }

    /// Records a verified webhook whose processing failed.
    pub fn webhook_failure(
        event_id: &str,
        event_type: &str,
        error: &str,
        at: Timestamp,
    ) -> Self {
        AuditLogEntry::new(
            AuditEventKind::WebhookProcessingFailed,
            format!("Failed to process {}", event_type),
            at,
        )
        .with_payload(json!({ "eventType": event_type, "error": error }))
        .with_external_event(Some(event_id.to_string()))
    }
}

/// Context shared by the entries written for one transition.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub plan_id: Option<PlanId>,
    pub external_event_id: Option<String>,
}

/// Audit entries for a membership event.
///
/// Administrator-driven events get an extra `admin_action` entry naming the
/// actor.
pub fn entries_for(event: &MembershipEvent, ctx: &AuditContext) -> Vec<AuditLogEntry> {
    let at = event.occurred_at();
    let base = |kind: AuditEventKind, message: String| {
        let mut entry = AuditLogEntry::new(kind, message, at)
            .for_user(event.user_id().clone())
            .with_external_event(ctx.external_event_id.clone());
        entry.membership_id = Some(event.membership_id());
        entry.plan_id = ctx.plan_id;
        entry.payload = serde_json::to_value(event).unwrap_or(JsonValue::Null);
        entry
    };
    let admin = |actor: &UserId, action: &str| {
        base(
            AuditEventKind::AdminAction,
            format!("Administrator {} performed {}", actor, action),
        )
    };

    match event {
        MembershipEvent::Created { .. } => {
            vec![base(AuditEventKind::MembershipCreated, "Membership created".into())]
        }
        MembershipEvent::Activated { previous_status, .. } => vec![base(
            AuditEventKind::Activation,
            format!("Membership activated from {}", previous_status),
        )],
        MembershipEvent::PaymentSucceeded {
            amount_minor,
            currency,
            invoice_id,
            ..
        } => {
            let mut entry = base(AuditEventKind::PaymentSuccess, "Payment succeeded".into());
            entry.amount_minor = Some(*amount_minor);
            entry.currency = Some(currency.clone());
            entry.external_invoice_id = invoice_id.clone();
            vec![entry]
        }
        MembershipEvent::CouponApplied { code, .. } => {
            vec![base(AuditEventKind::CouponApplied, format!("Coupon {} applied", code))]
        }
        MembershipEvent::PaymentFailed {
            failure_count,
            reason,
            ..
        } => vec![base(
            AuditEventKind::PaymentFailed,
            format!(
                "Payment failed ({} consecutive): {}",
                failure_count,
                reason.as_deref().unwrap_or("unknown reason")
            ),
        )],
        MembershipEvent::PaymentRefunded {
            charge_id,
            amount_minor,
            currency,
            ..
        } => {
            let mut entry = base(AuditEventKind::PaymentRefunded, "Payment refunded".into());
            entry.external_payment_id = Some(charge_id.clone());
            entry.amount_minor = Some(*amount_minor);
            entry.currency = Some(currency.clone());
            vec![entry]
        }
        MembershipEvent::StatusChanged {
            from,
            to,
            reason,
            actor,
            ..
        } => {
            let mut entries = vec![base(
                AuditEventKind::StatusChange,
                format!("Status changed from {} to {} ({})", from, to, reason),
            )];
            if let Some(actor) = actor {
                entries.push(admin(actor, reason.as_str()));
            }
            entries
        }
        MembershipEvent::Canceled { previous_status, .. } => vec![base(
            AuditEventKind::Cancellation,
            format!("Subscription canceled (was {})", previous_status),
        )],
        MembershipEvent::Expired { actor, .. } => vec![
            base(AuditEventKind::Expiry, "Membership expired".into()),
            admin(actor, "manual expiry"),
        ],
        MembershipEvent::Extended { days, actor, .. } => {
            vec![admin(actor, format!("extension by {} days", days).as_str())]
        }
        MembershipEvent::Archived { actor, .. } => vec![admin(actor, "archive")],
        MembershipEvent::Restored { actor, .. } => vec![admin(actor, "restore")],
    }
}
