//! GetMembershipHandler - Query handler for the caller's own membership.

use std::sync::Arc;

use crate::domain::foundation::UserId;
use crate::domain::membership::{Membership, MembershipError};
use crate::ports::MembershipRepository;

/// Query to get a user's membership.
#[derive(Debug, Clone)]
pub struct GetMembershipQuery {
    pub user_id: UserId,
}

/// Handler for retrieving membership details.
///
/// Archived memberships are still returned; the caller sees them without
/// access.
pub struct GetMembershipHandler {
    memberships: Arc<dyn MembershipRepository>,
}

impl GetMembershipHandler {
    pub fn new(memberships: Arc<dyn MembershipRepository>) -> Self {
        Self { memberships }
    }

    pub async fn handle(&self, query: GetMembershipQuery) -> Result<Membership, MembershipError> {
        self.memberships
            .find_by_user_id(&query.user_id)
            .await?
            .ok_or_else(|| MembershipError::not_found("Membership", &query.user_id))
    }
}
