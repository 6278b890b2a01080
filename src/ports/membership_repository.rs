//! Membership repository port.
//!
//! Transitions are read-modify-write cycles against this port; the store is
//! the only coordination point between concurrent webhook deliveries.
//! Implementations must enforce one membership per user.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, MembershipId, UserId};
use crate::domain::membership::{Membership, MembershipStatus};

/// Filter for the admin listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipFilter {
    pub status: Option<MembershipStatus>,
    /// `Some(true)` archived only, `Some(false)` live only, `None` both.
    pub archived: Option<bool>,
}

impl MembershipFilter {
    pub fn matches(&self, membership: &Membership) -> bool {
        self.status.map_or(true, |s| membership.status() == s)
            && self.archived.map_or(true, |a| membership.is_archived() == a)
    }
}

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Save a new membership.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the user already has a membership
    /// - `DatabaseError` on persistence failure
    async fn save(&self, membership: &Membership) -> Result<(), DomainError>;

    /// Overwrite an existing membership with its current record.
    ///
    /// # Errors
    ///
    /// - `MembershipNotFound` if membership doesn't exist
    async fn update(&self, membership: &Membership) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &MembershipId) -> Result<Option<Membership>, DomainError>;

    /// Primary lookup; each user has at most one membership.
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Membership>, DomainError>;

    async fn find_by_stripe_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Membership>, DomainError>;

    async fn find_by_stripe_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Membership>, DomainError>;

    /// Newest first.
    async fn list(&self, filter: &MembershipFilter) -> Result<Vec<Membership>, DomainError>;

    /// Hard delete. Only the orphan sweep calls this.
    async fn delete(&self, id: &MembershipId) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;

    #[test]
    fn membership_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn MembershipRepository) {}
    }

    #[test]
    fn filter_matches_status_and_archive_flag() {
        let (membership, _) =
            Membership::create_pending(UserId::new("u").unwrap(), None, Timestamp::now());

        assert!(MembershipFilter::default().matches(&membership));
        assert!(MembershipFilter {
            status: Some(MembershipStatus::Pending),
            archived: Some(false),
        }
        .matches(&membership));
        assert!(!MembershipFilter {
            status: Some(MembershipStatus::Active),
            archived: None,
        }
        .matches(&membership));
        assert!(!MembershipFilter {
            status: None,
            archived: Some(true),
        }
        .matches(&membership));
    }
}
