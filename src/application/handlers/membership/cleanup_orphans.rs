//! CleanupOrphansHandler - hard-deletes memberships whose owner is gone.
//!
//! The only path that removes a membership row. Each removal is audited
//! before the delete so the trail survives the record.

use std::sync::Arc;

use serde_json::json;

use crate::domain::audit::{AuditEventKind, AuditLogEntry};
use crate::domain::foundation::{MembershipId, Timestamp, UserId};
use crate::domain::membership::MembershipError;
use crate::ports::{AuditLog, MembershipFilter, MembershipRepository, UserDirectory};

#[derive(Debug, Clone)]
pub struct CleanupOrphansCommand {
    pub actor: UserId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupOrphansResult {
    pub scanned: usize,
    pub removed: Vec<MembershipId>,
}

pub struct CleanupOrphansHandler {
    memberships: Arc<dyn MembershipRepository>,
    users: Arc<dyn UserDirectory>,
    audit_log: Arc<dyn AuditLog>,
}

impl CleanupOrphansHandler {
    pub fn new(
        memberships: Arc<dyn MembershipRepository>,
        users: Arc<dyn UserDirectory>,
        audit_log: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            memberships,
            users,
            audit_log,
        }
    }

    pub async fn handle(
        &self,
        cmd: CleanupOrphansCommand,
    ) -> Result<CleanupOrphansResult, MembershipError> {
        let all = self.memberships.list(&MembershipFilter::default()).await?;
        let mut result = CleanupOrphansResult {
            scanned: all.len(),
            removed: Vec::new(),
        };

        for membership in all {
            if self.users.exists(membership.user_id()).await? {
                continue;
            }

            let mut entry = AuditLogEntry::new(
                AuditEventKind::AdminAction,
                "Orphaned membership removed",
                Timestamp::now(),
            )
            .for_user(membership.user_id().clone())
            .with_payload(json!({
                "action": "cleanup_orphan",
                "actor": cmd.actor.as_str(),
                "status": membership.status().as_str(),
            }));
            entry.membership_id = Some(membership.id());
            if let Err(e) = self.audit_log.append(&entry).await {
                tracing::error!(membership_id = %membership.id(), error = %e, "Failed to audit orphan removal");
            }

            self.memberships.delete(&membership.id()).await?;
            tracing::info!(
                membership_id = %membership.id(),
                user_id = %membership.user_id(),
                "Orphaned membership deleted"
            );
            result.removed.push(membership.id());
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::membership::test_support::Harness;
    use crate::domain::access::UserRole;

    #[tokio::test]
    async fn removes_only_memberships_without_owner() {
        let h = Harness::new().await;
        let admin = h.add_user("admin-1", UserRole::Admin).await;
        let kept = h.add_user("user-1", UserRole::Member).await;
        let gone = h.add_user("user-2", UserRole::Member).await;
        h.active_membership(&kept).await;
        let orphan = h.active_membership(&gone).await;
        h.users.remove(&gone).await;

        let result = h
            .cleanup_handler()
            .handle(CleanupOrphansCommand { actor: admin })
            .await
            .unwrap();

        assert_eq!(result.scanned, 2);
        assert_eq!(result.removed, vec![orphan.id()]);
        assert_eq!(h.memberships.count().await, 1);
        assert_eq!(h.audit.count_of(AuditEventKind::AdminAction).await, 1);
    }

    #[tokio::test]
    async fn nothing_to_remove_is_a_noop() {
        let h = Harness::new().await;
        let admin = h.add_user("admin-1", UserRole::Admin).await;

        let result = h
            .cleanup_handler()
            .handle(CleanupOrphansCommand { actor: admin })
            .await
            .unwrap();

        assert_eq!(result, CleanupOrphansResult::default());
    }
}
