//! Access entitlement.
//!
//! A user's role is derived from their membership after every
//! status-changing transition. Elevated roles are never touched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;
use crate::domain::membership::MembershipStatus;

/// Marketplace user role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Baseline account without a paid membership.
    User,
    /// Granted by an active membership.
    Member,
    ProMember,
    Manager,
    Admin,
}

impl UserRole {
    /// Roles assigned by staff that membership billing must never change.
    pub fn is_elevated(&self) -> bool {
        matches!(self, UserRole::ProMember | UserRole::Manager | UserRole::Admin)
    }

    /// Roles allowed to use the admin surface.
    pub fn can_administer(&self) -> bool {
        matches!(self, UserRole::Manager | UserRole::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Member => "member",
            UserRole::ProMember => "pro_member",
            UserRole::Manager => "manager",
            UserRole::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(UserRole::User),
            "member" => Ok(UserRole::Member),
            "pro_member" => Ok(UserRole::ProMember),
            "manager" => Ok(UserRole::Manager),
            "admin" => Ok(UserRole::Admin),
            other => Err(ValidationError::invalid_format(
                "role",
                format!("unknown role '{}'", other),
            )),
        }
    }
}

/// What a membership says about access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entitlement {
    Grant,
    Revoke,
    /// Pending and failed memberships neither grant nor revoke.
    Unchanged,
}

impl From<MembershipStatus> for Entitlement {
    fn from(status: MembershipStatus) -> Self {
        if status.has_access() {
            Entitlement::Grant
        } else if status.revokes_access() {
            Entitlement::Revoke
        } else {
            Entitlement::Unchanged
        }
    }
}

/// Role a user should hold given their membership entitlement.
///
/// Grant raises `User` to `Member`; Revoke lowers exactly `Member` back to
/// `User`.
pub fn derive_role(current: UserRole, entitlement: Entitlement) -> UserRole {
    if current.is_elevated() {
        return current;
    }

    match (entitlement, current) {
        (Entitlement::Grant, _) => UserRole::Member,
        (Entitlement::Revoke, UserRole::Member) => UserRole::User,
        _ => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role_for(current: UserRole, status: MembershipStatus) -> UserRole {
        derive_role(current, status.into())
    }

    #[test]
    fn activation_promotes_user_to_member() {
        assert_eq!(role_for(UserRole::User, MembershipStatus::Active), UserRole::Member);
        assert_eq!(role_for(UserRole::Member, MembershipStatus::Active), UserRole::Member);
    }

    #[test]
    fn elevated_roles_are_never_changed() {
        for role in [UserRole::ProMember, UserRole::Manager, UserRole::Admin] {
            for status in MembershipStatus::ALL {
                assert_eq!(role_for(role, status), role, "{role} under {status}");
            }
        }
    }

    #[test]
    fn revoking_statuses_demote_member_only() {
        for status in [
            MembershipStatus::PastDue,
            MembershipStatus::Canceled,
            MembershipStatus::Expired,
            MembershipStatus::Hold,
        ] {
            assert_eq!(role_for(UserRole::Member, status), UserRole::User);
            assert_eq!(role_for(UserRole::User, status), UserRole::User);
        }
    }

    #[test]
    fn pending_and_failed_leave_role_unchanged() {
        assert_eq!(role_for(UserRole::Member, MembershipStatus::Pending), UserRole::Member);
        assert_eq!(role_for(UserRole::Member, MembershipStatus::Failed), UserRole::Member);
        assert_eq!(role_for(UserRole::User, MembershipStatus::Failed), UserRole::User);
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [
            UserRole::User,
            UserRole::Member,
            UserRole::ProMember,
            UserRole::Manager,
            UserRole::Admin,
        ] {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), role);
        }
    }

    #[test]
    fn only_staff_can_administer() {
        assert!(UserRole::Admin.can_administer());
        assert!(UserRole::Manager.can_administer());
        assert!(!UserRole::ProMember.can_administer());
        assert!(!UserRole::Member.can_administer());
    }
}
