//! Membership status state machine.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Membership subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    /// Created at first checkout attempt; no payment confirmed yet.
    Pending,

    /// Paid up. The only status that grants access.
    Active,

    /// Payment failing, either by local escalation or provider report.
    PastDue,

    /// Subscription deleted upstream.
    Canceled,

    /// Ended by an administrator.
    Expired,

    /// Administrative lock. Never entered from a webhook.
    Hold,

    /// Initial payment never completed (provider `incomplete_expired`).
    Failed,
}

impl MembershipStatus {
    pub const ALL: [MembershipStatus; 7] = [
        MembershipStatus::Pending,
        MembershipStatus::Active,
        MembershipStatus::PastDue,
        MembershipStatus::Canceled,
        MembershipStatus::Expired,
        MembershipStatus::Hold,
        MembershipStatus::Failed,
    ];

    pub fn has_access(&self) -> bool {
        matches!(self, MembershipStatus::Active)
    }

    /// Statuses that take access away from a plain member.
    pub fn revokes_access(&self) -> bool {
        matches!(
            self,
            MembershipStatus::PastDue
                | MembershipStatus::Canceled
                | MembershipStatus::Expired
                | MembershipStatus::Hold
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Pending => "pending",
            MembershipStatus::Active => "active",
            MembershipStatus::PastDue => "past_due",
            MembershipStatus::Canceled => "canceled",
            MembershipStatus::Expired => "expired",
            MembershipStatus::Hold => "hold",
            MembershipStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MembershipStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                ValidationError::invalid_format("status", format!("unknown status '{}'", s))
            })
    }
}

impl StateMachine for MembershipStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use MembershipStatus::*;
        matches!(
            (self, target),
            // Payment confirmed
            (_, Active)
            // Failure escalation or provider report
                | (Active, PastDue)
            // Subscription deleted upstream
                | (Pending | Active | PastDue | Hold | Failed, Canceled)
            // Administrative expiry
                | (Active | PastDue | Hold, Expired)
            // Administrative hold
                | (Pending | Active | PastDue | Canceled | Expired | Failed, Hold)
            // Initial payment abandoned
                | (Pending, Failed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        MembershipStatus::ALL
            .into_iter()
            .filter(|target| self.can_transition_to(target))
            .collect()
    }
}
