//! Outbound notification port.
//!
//! Rendering and delivery belong to the implementation; billing only says
//! who to tell and about what.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    MembershipActivated,
    PaymentFailed,
    MembershipPastDue,
    MembershipCanceled,
    MembershipExpired,
    PaymentRefunded,
}

impl NotificationKind {
    pub fn template(&self) -> &'static str {
        match self {
            NotificationKind::MembershipActivated => "membership_activated",
            NotificationKind::PaymentFailed => "payment_failed",
            NotificationKind::MembershipPastDue => "membership_past_due",
            NotificationKind::MembershipCanceled => "membership_canceled",
            NotificationKind::MembershipExpired => "membership_expired",
            NotificationKind::PaymentRefunded => "payment_refunded",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub context: serde_json::Value,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), DomainError>;
}
