//! ManageMembershipHandler - administrative membership transitions.
//!
//! Every action goes through a named transition on the aggregate and is
//! committed like a webhook transition, so role sync and auditing apply.

use std::sync::Arc;

use crate::domain::audit::AuditContext;
use crate::domain::foundation::{MembershipId, Timestamp, UserId};
use crate::domain::membership::{Membership, MembershipError, MembershipStatus};
use crate::ports::{MembershipRepository, PaymentProvider};

use super::{TransitionCommitter, TransitionOutcome};

/// Administrative action on one membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipAction {
    Hold,
    Release,
    Expire,
    /// Push the expiry date forward by `days`.
    Extend { days: u32 },
    /// Soft delete. `force` is required for active memberships.
    Archive { reason: Option<String>, force: bool },
    Restore,
}

impl MembershipAction {
    pub fn name(&self) -> &'static str {
        match self {
            MembershipAction::Hold => "hold",
            MembershipAction::Release => "release",
            MembershipAction::Expire => "expire",
            MembershipAction::Extend { .. } => "extend",
            MembershipAction::Archive { .. } => "archive",
            MembershipAction::Restore => "restore",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManageMembershipCommand {
    pub membership_id: MembershipId,
    pub actor: UserId,
    pub action: MembershipAction,
}

pub struct ManageMembershipHandler {
    memberships: Arc<dyn MembershipRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
    committer: Arc<TransitionCommitter>,
}

impl ManageMembershipHandler {
    pub fn new(
        memberships: Arc<dyn MembershipRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
        committer: Arc<TransitionCommitter>,
    ) -> Self {
        Self {
            memberships,
            payment_provider,
            committer,
        }
    }

    pub async fn handle(&self, cmd: ManageMembershipCommand) -> Result<Membership, MembershipError> {
        let now = Timestamp::now();
        let mut membership = self
            .memberships
            .find_by_id(&cmd.membership_id)
            .await?
            .ok_or_else(|| MembershipError::not_found("Membership", cmd.membership_id))?;

        let action = cmd.action.name();
        let cancel_upstream = matches!(cmd.action, MembershipAction::Archive { .. });
        let events = match cmd.action {
            MembershipAction::Hold => membership.place_hold(cmd.actor.clone(), now)?,
            MembershipAction::Release => membership.release_hold(cmd.actor.clone(), now)?,
            MembershipAction::Expire => membership.expire(cmd.actor.clone(), now)?,
            MembershipAction::Extend { days } => membership.extend(days, cmd.actor.clone(), now)?,
            MembershipAction::Archive { reason, force } => {
                membership.archive(cmd.actor.clone(), reason, force, now)?
            }
            MembershipAction::Restore => membership.restore(cmd.actor.clone(), now)?,
        };

        let outcome = TransitionOutcome::new(events).with_audit(AuditContext {
            plan_id: membership.record().plan_id,
            external_event_id: None,
        });
        self.committer.commit(&membership, outcome).await?;

        tracing::info!(
            membership_id = %membership.id(),
            actor = %cmd.actor,
            action,
            status = %membership.status(),
            "Administrative membership action applied"
        );

        if cancel_upstream {
            self.cancel_subscription(&membership).await;
        }
        Ok(membership)
    }

    /// Best effort: the archive is already committed locally.
    async fn cancel_subscription(&self, membership: &Membership) {
        let Some(subscription_id) = membership.stripe_subscription_id() else {
            return;
        };
        if matches!(
            membership.status(),
            MembershipStatus::Canceled | MembershipStatus::Expired | MembershipStatus::Failed
        ) {
            return;
        }

        if let Err(e) = self.payment_provider.cancel_subscription(subscription_id).await {
            tracing::warn!(
                membership_id = %membership.id(),
                subscription_id,
                error = %e,
                "Upstream subscription not canceled after archive"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::membership::test_support::Harness;
    use crate::domain::access::UserRole;
    use crate::domain::audit::AuditEventKind;
    use crate::ports::{PaymentError, Subscription};
    use std::collections::HashMap;

    fn command(
        membership: &Membership,
        actor: &UserId,
        action: MembershipAction,
    ) -> ManageMembershipCommand {
        ManageMembershipCommand {
            membership_id: membership.id(),
            actor: actor.clone(),
            action,
        }
    }

    fn seed_subscription(h: &Harness) {
        h.provider.add_subscription(Subscription {
            id: "sub_test".into(),
            customer_id: Some("cus_test".into()),
            status: "active".into(),
            current_period_start: None,
            current_period_end: None,
            cancel_at_period_end: false,
            price_id: None,
            card: None,
            metadata: HashMap::new(),
        });
    }

    #[tokio::test]
    async fn archive_of_active_membership_requires_confirmation() {
        let h = Harness::new().await;
        let admin = h.add_user("admin-1", UserRole::Admin).await;
        let user = h.add_user("user-1", UserRole::Member).await;
        let membership = h.active_membership(&user).await;

        let err = h
            .manage_handler()
            .handle(command(
                &membership,
                &admin,
                MembershipAction::Archive { reason: None, force: false },
            ))
            .await
            .unwrap_err();

        assert!(err.needs_confirmation());
        let stored = h.memberships.find_by_id(&membership.id()).await.unwrap().unwrap();
        assert!(!stored.is_archived());
        assert!(!h.provider.was_called("cancel_subscription"));
    }

    #[tokio::test]
    async fn forced_archive_cancels_upstream_and_revokes_access() {
        let h = Harness::new().await;
        seed_subscription(&h);
        let admin = h.add_user("admin-1", UserRole::Admin).await;
        let user = h.add_user("user-1", UserRole::Member).await;
        let membership = h.active_membership(&user).await;

        let archived = h
            .manage_handler()
            .handle(command(
                &membership,
                &admin,
                MembershipAction::Archive {
                    reason: Some("chargeback".into()),
                    force: true,
                },
            ))
            .await
            .unwrap();

        let record = archived.record();
        assert!(record.archive.is_archived);
        assert!(!record.auto_renew);
        assert!(record.cancel_at_period_end);
        assert_eq!(h.provider.subscription("sub_test").unwrap().status, "canceled");
        assert_eq!(h.users.role_of(&user).await, Some(UserRole::User));
        assert!(h.audit.kinds().await.contains(&AuditEventKind::AdminAction));
    }

    #[tokio::test]
    async fn archive_survives_upstream_cancel_failure() {
        let h = Harness::new().await;
        let admin = h.add_user("admin-1", UserRole::Admin).await;
        let user = h.add_user("user-1", UserRole::Member).await;
        let membership = h.active_membership(&user).await;
        h.provider
            .set_method_error("cancel_subscription", PaymentError::network("timeout"));

        let archived = h
            .manage_handler()
            .handle(command(
                &membership,
                &admin,
                MembershipAction::Archive { reason: None, force: true },
            ))
            .await
            .unwrap();

        assert!(archived.is_archived());
        assert!(h.provider.was_called("cancel_subscription"));
    }

    #[tokio::test]
    async fn hold_revokes_and_release_restores_access() {
        let h = Harness::new().await;
        let admin = h.add_user("admin-1", UserRole::Admin).await;
        let user = h.add_user("user-1", UserRole::Member).await;
        let membership = h.active_membership(&user).await;
        let handler = h.manage_handler();

        handler
            .handle(command(&membership, &admin, MembershipAction::Hold))
            .await
            .unwrap();
        assert_eq!(h.users.role_of(&user).await, Some(UserRole::User));

        let released = handler
            .handle(command(&membership, &admin, MembershipAction::Release))
            .await
            .unwrap();
        assert_eq!(released.status(), MembershipStatus::Active);
        assert_eq!(h.users.role_of(&user).await, Some(UserRole::Member));
    }

    #[tokio::test]
    async fn extend_is_relative_to_current_expiry() {
        let h = Harness::new().await;
        let admin = h.add_user("admin-1", UserRole::Admin).await;
        let user = h.add_user("user-1", UserRole::Member).await;
        let membership = h.active_membership(&user).await;
        let before = membership.record().expiry_date.unwrap();
        let handler = h.manage_handler();

        handler
            .handle(command(&membership, &admin, MembershipAction::Extend { days: 10 }))
            .await
            .unwrap();
        let extended = handler
            .handle(command(&membership, &admin, MembershipAction::Extend { days: 10 }))
            .await
            .unwrap();

        assert_eq!(extended.record().expiry_date, Some(before.add_days(20)));
    }

    #[tokio::test]
    async fn extend_rejects_out_of_range_days() {
        let h = Harness::new().await;
        let admin = h.add_user("admin-1", UserRole::Admin).await;
        let user = h.add_user("user-1", UserRole::Member).await;
        let membership = h.active_membership(&user).await;

        let err = h
            .manage_handler()
            .handle(command(&membership, &admin, MembershipAction::Extend { days: 0 }))
            .await
            .unwrap_err();

        assert!(matches!(err, MembershipError::Validation { .. }));
    }

    #[tokio::test]
    async fn expire_revokes_access() {
        let h = Harness::new().await;
        let admin = h.add_user("admin-1", UserRole::Admin).await;
        let user = h.add_user("user-1", UserRole::Member).await;
        let membership = h.active_membership(&user).await;

        let expired = h
            .manage_handler()
            .handle(command(&membership, &admin, MembershipAction::Expire))
            .await
            .unwrap();

        assert_eq!(expired.status(), MembershipStatus::Expired);
        assert_eq!(h.users.role_of(&user).await, Some(UserRole::User));
        assert!(h.audit.kinds().await.contains(&AuditEventKind::Expiry));
    }

    #[tokio::test]
    async fn restore_lifts_archive_flag() {
        let h = Harness::new().await;
        let admin = h.add_user("admin-1", UserRole::Admin).await;
        let user = h.add_user("user-1", UserRole::Member).await;
        let membership = h.active_membership(&user).await;
        let handler = h.manage_handler();
        handler
            .handle(command(
                &membership,
                &admin,
                MembershipAction::Archive { reason: None, force: true },
            ))
            .await
            .unwrap();

        let restored = handler
            .handle(command(&membership, &admin, MembershipAction::Restore))
            .await
            .unwrap();

        assert!(!restored.is_archived());
        assert!(!restored.record().auto_renew);
    }

    #[tokio::test]
    async fn unknown_membership_is_not_found() {
        let h = Harness::new().await;
        let admin = h.add_user("admin-1", UserRole::Admin).await;

        let err = h
            .manage_handler()
            .handle(ManageMembershipCommand {
                membership_id: MembershipId::new(),
                actor: admin,
                action: MembershipAction::Hold,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, MembershipError::NotFound { .. }));
    }
}
