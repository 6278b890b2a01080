//! Membership domain events.
//!
//! Every named transition on the aggregate returns the events it caused.
//! The application layer turns them into audit entries, drives role sync
//! from them, and publishes them for the notifier.

use crate::domain::foundation::{CouponId, DomainEvent, MembershipId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

use super::MembershipStatus;

/// Events that occur during the membership lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MembershipEvent {
    /// A pending membership row was created for a user.
    Created {
        membership_id: MembershipId,
        user_id: UserId,
        occurred_at: Timestamp,
    },

    /// Payment confirmed and the membership became active.
    ///
    /// Emitted only when the status actually changes.
    Activated {
        membership_id: MembershipId,
        user_id: UserId,
        previous_status: MembershipStatus,
        expiry_date: Timestamp,
        occurred_at: Timestamp,
    },

    /// A payment was recorded against the membership.
    PaymentSucceeded {
        membership_id: MembershipId,
        user_id: UserId,
        amount_minor: i64,
        currency: String,
        invoice_id: Option<String>,
        occurred_at: Timestamp,
    },

    /// A coupon was attached for the first time.
    CouponApplied {
        membership_id: MembershipId,
        user_id: UserId,
        coupon_id: CouponId,
        code: String,
        occurred_at: Timestamp,
    },

    PaymentFailed {
        membership_id: MembershipId,
        user_id: UserId,
        failure_count: u32,
        reason: Option<String>,
        occurred_at: Timestamp,
    },

    PaymentRefunded {
        membership_id: MembershipId,
        user_id: UserId,
        charge_id: String,
        amount_minor: i64,
        currency: String,
        occurred_at: Timestamp,
    },

    /// Status moved for a reason not covered by a more specific event
    /// (past due, hold, release, failed).
    StatusChanged {
        membership_id: MembershipId,
        user_id: UserId,
        from: MembershipStatus,
        to: MembershipStatus,
        reason: String,
        actor: Option<UserId>,
        occurred_at: Timestamp,
    },

    Canceled {
        membership_id: MembershipId,
        user_id: UserId,
        previous_status: MembershipStatus,
        occurred_at: Timestamp,
    },

    Expired {
        membership_id: MembershipId,
        user_id: UserId,
        previous_status: MembershipStatus,
        actor: UserId,
        occurred_at: Timestamp,
    },

    /// Administrator pushed the expiry date forward.
    Extended {
        membership_id: MembershipId,
        user_id: UserId,
        days: u32,
        expiry_date: Timestamp,
        actor: UserId,
        occurred_at: Timestamp,
    },

    Archived {
        membership_id: MembershipId,
        user_id: UserId,
        actor: UserId,
        reason: Option<String>,
        occurred_at: Timestamp,
    },

    Restored {
        membership_id: MembershipId,
        user_id: UserId,
        actor: UserId,
        occurred_at: Timestamp,
    },
}

impl MembershipEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            MembershipEvent::Created { .. } => "membership.created.v1",
            MembershipEvent::Activated { .. } => "membership.activated.v1",
            MembershipEvent::PaymentSucceeded { .. } => "membership.payment_succeeded.v1",
            MembershipEvent::CouponApplied { .. } => "membership.coupon_applied.v1",
            MembershipEvent::PaymentFailed { .. } => "membership.payment_failed.v1",
            MembershipEvent::PaymentRefunded { .. } => "membership.payment_refunded.v1",
            MembershipEvent::StatusChanged { .. } => "membership.status_changed.v1",
            MembershipEvent::Canceled { .. } => "membership.canceled.v1",
            MembershipEvent::Expired { .. } => "membership.expired.v1",
            MembershipEvent::Extended { .. } => "membership.extended.v1",
            MembershipEvent::Archived { .. } => "membership.archived.v1",
            MembershipEvent::Restored { .. } => "membership.restored.v1",
        }
    }

    pub fn membership_id(&self) -> MembershipId {
        match self {
            MembershipEvent::Created { membership_id, .. }
            | MembershipEvent::Activated { membership_id, .. }
            | MembershipEvent::PaymentSucceeded { membership_id, .. }
            | MembershipEvent::CouponApplied { membership_id, .. }
            | MembershipEvent::PaymentFailed { membership_id, .. }
            | MembershipEvent::PaymentRefunded { membership_id, .. }
            | MembershipEvent::StatusChanged { membership_id, .. }
            | MembershipEvent::Canceled { membership_id, .. }
            | MembershipEvent::Expired { membership_id, .. }
            | MembershipEvent::Extended { membership_id, .. }
            | MembershipEvent::Archived { membership_id, .. }
            | MembershipEvent::Restored { membership_id, .. } => *membership_id,
        }
    }

    pub fn user_id(&self) -> &UserId {
        match self {
            MembershipEvent::Created { user_id, .. }
            | MembershipEvent::Activated { user_id, .. }
            | MembershipEvent::PaymentSucceeded { user_id, .. }
            | MembershipEvent::CouponApplied { user_id, .. }
            | MembershipEvent::PaymentFailed { user_id, .. }
            | MembershipEvent::PaymentRefunded { user_id, .. }
            | MembershipEvent::StatusChanged { user_id, .. }
            | MembershipEvent::Canceled { user_id, .. }
            | MembershipEvent::Expired { user_id, .. }
            | MembershipEvent::Extended { user_id, .. }
            | MembershipEvent::Archived { user_id, .. }
            | MembershipEvent::Restored { user_id, .. } => user_id,
        }
    }

    pub fn occurred_at(&self) -> Timestamp {
        match self {
            MembershipEvent::Created { occurred_at, .. }
            | MembershipEvent::Activated { occurred_at, .. }
            | MembershipEvent::PaymentSucceeded { occurred_at, .. }
            | MembershipEvent::CouponApplied { occurred_at, .. }
            | MembershipEvent::PaymentFailed { occurred_at, .. }
            | MembershipEvent::PaymentRefunded { occurred_at, .. }
            | MembershipEvent::StatusChanged { occurred_at, .. }
            | MembershipEvent::Canceled { occurred_at, .. }
            | MembershipEvent::Expired { occurred_at, .. }
            | MembershipEvent::Extended { occurred_at, .. }
            | MembershipEvent::Archived { occurred_at, .. }
            | MembershipEvent::Restored { occurred_at, .. } => *occurred_at,
        }
    }

    /// Status the membership ended up in, for events that move it.
    pub fn new_status(&self) -> Option<MembershipStatus> {
        match self {
            MembershipEvent::Activated { .. } => Some(MembershipStatus::Active),
            MembershipEvent::StatusChanged { to, .. } => Some(*to),
            MembershipEvent::Canceled { .. } => Some(MembershipStatus::Canceled),
            MembershipEvent::Expired { .. } => Some(MembershipStatus::Expired),
            _ => None,
        }
    }
}

impl DomainEvent for MembershipEvent {
    fn event_type(&self) -> &'static str {
        MembershipEvent::event_type(self)
    }

    fn aggregate_id(&self) -> String {
        self.membership_id().to_string()
    }

    fn aggregate_type(&self) -> &'static str {
        "Membership"
    }

    fn occurred_at(&self) -> Timestamp {
        MembershipEvent::occurred_at(self)
    }
}
