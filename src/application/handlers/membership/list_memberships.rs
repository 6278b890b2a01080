//! ListMembershipsHandler - admin listing with status and archive filters.

use std::sync::Arc;

use crate::domain::membership::{Membership, MembershipError};
use crate::ports::{MembershipFilter, MembershipRepository};

#[derive(Debug, Clone, Default)]
pub struct ListMembershipsQuery {
    pub filter: MembershipFilter,
}

pub struct ListMembershipsHandler {
    memberships: Arc<dyn MembershipRepository>,
}

impl ListMembershipsHandler {
    pub fn new(memberships: Arc<dyn MembershipRepository>) -> Self {
        Self { memberships }
    }

    /// Newest first.
    pub async fn handle(&self, query: ListMembershipsQuery) -> Result<Vec<Membership>, MembershipError> {
        Ok(self.memberships.list(&query.filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::membership::test_support::Harness;
    use crate::domain::access::UserRole;
    use crate::domain::foundation::Timestamp;
    use crate::domain::membership::MembershipStatus;

    #[tokio::test]
    async fn filters_by_status() {
        let h = Harness::new().await;
        let active_user = h.add_user("user-1", UserRole::Member).await;
        let pending_user = h.add_user("user-2", UserRole::User).await;
        h.active_membership(&active_user).await;
        let (pending, _) = Membership::create_pending(pending_user, None, Timestamp::now());
        h.memberships.save(&pending).await.unwrap();

        let all = h.list_handler().handle(ListMembershipsQuery::default()).await.unwrap();
        let active = h
            .list_handler()
            .handle(ListMembershipsQuery {
                filter: MembershipFilter {
                    status: Some(MembershipStatus::Active),
                    archived: None,
                },
            })
            .await
            .unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].user_id(), &active_user);
    }
}
