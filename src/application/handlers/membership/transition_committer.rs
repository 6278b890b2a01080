//! TransitionCommitter - persists a membership transition and fans out its
//! side effects.
//!
//! Every handler that mutates a membership ends here, in this order:
//!
//! 1. persist the record (insert or overwrite)
//! 2. count an outstanding coupon redemption, then persist it as counted
//! 3. sync the owner's role from the membership's entitlement
//! 4. append audit entries
//! 5. publish domain events
//!
//! Steps 1-3 propagate errors. A redemption stays marked uncounted until its
//! increment succeeds, so replaying the event finishes a commit that failed
//! part way. Audit and publishing failures are logged and swallowed: the
//! transition is already committed and a replay would emit nothing to retry
//! with.

use std::sync::Arc;

use crate::domain::access::{derive_role, Entitlement};
use crate::domain::audit::{entries_for, AuditContext};
use crate::domain::foundation::{CouponId, EventEnvelope};
use crate::domain::membership::{Membership, MembershipError, MembershipEvent};
use crate::ports::{AuditLog, CouponRepository, EventPublisher, MembershipRepository, UserDirectory};

/// What a transition produced.
#[derive(Debug, Clone, Default)]
pub struct TransitionOutcome {
    pub events: Vec<MembershipEvent>,
    pub redeemed_coupon: Option<CouponId>,
    pub audit: AuditContext,
    /// Insert rather than overwrite.
    pub is_new: bool,
}

impl TransitionOutcome {
    pub fn new(events: Vec<MembershipEvent>) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }

    pub fn inserted(mut self) -> Self {
        self.is_new = true;
        self
    }

    pub fn with_redeemed_coupon(mut self, coupon_id: Option<CouponId>) -> Self {
        self.redeemed_coupon = coupon_id;
        self
    }

    pub fn with_audit(mut self, audit: AuditContext) -> Self {
        self.audit = audit;
        self
    }
}

pub struct TransitionCommitter {
    memberships: Arc<dyn MembershipRepository>,
    coupons: Arc<dyn CouponRepository>,
    users: Arc<dyn UserDirectory>,
    audit_log: Arc<dyn AuditLog>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl TransitionCommitter {
    pub fn new(
        memberships: Arc<dyn MembershipRepository>,
        coupons: Arc<dyn CouponRepository>,
        users: Arc<dyn UserDirectory>,
        audit_log: Arc<dyn AuditLog>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            memberships,
            coupons,
            users,
            audit_log,
            event_publisher,
        }
    }

    pub async fn commit(
        &self,
        membership: &Membership,
        outcome: TransitionOutcome,
    ) -> Result<(), MembershipError> {
        if outcome.is_new {
            self.memberships.save(membership).await?;
        } else {
            self.memberships.update(membership).await?;
        }

        if let Some(coupon_id) = outcome.redeemed_coupon {
            self.count_redemption(membership, coupon_id).await?;
        }

        self.sync_access(membership).await?;

        for event in &outcome.events {
            for entry in entries_for(event, &outcome.audit) {
                if let Err(e) = self.audit_log.append(&entry).await {
                    tracing::error!(
                        membership_id = %membership.id(),
                        kind = %entry.kind,
                        error = %e,
                        "Failed to append audit entry"
                    );
                }
            }
        }

        self.publish(membership, &outcome).await;
        Ok(())
    }

    async fn count_redemption(
        &self,
        membership: &Membership,
        coupon_id: CouponId,
    ) -> Result<(), MembershipError> {
        let mut settled = membership.clone();
        if !settled.settle_coupon_redemption(coupon_id) {
            return Ok(());
        }

        self.coupons.increment_used_count(&coupon_id).await?;
        self.memberships.update(&settled).await?;
        tracing::info!(
            membership_id = %membership.id(),
            coupon_id = %coupon_id,
            "Coupon redemption counted"
        );
        Ok(())
    }

    /// Applies the membership's entitlement to the owner's role.
    ///
    /// Runs on every commit, so a replayed event that changed nothing still
    /// repairs a role left stale by an earlier partial failure.
    async fn sync_access(&self, membership: &Membership) -> Result<(), MembershipError> {
        let entitlement = membership.entitlement();
        if entitlement == Entitlement::Unchanged {
            return Ok(());
        }

        let Some(user) = self.users.find(membership.user_id()).await? else {
            tracing::warn!(
                user_id = %membership.user_id(),
                membership_id = %membership.id(),
                "Membership owner not found; role not synced"
            );
            return Ok(());
        };

        let role = derive_role(user.role, entitlement);
        if role != user.role {
            self.users.set_role(&user.id, role).await?;
            tracing::info!(
                user_id = %user.id,
                from = %user.role,
                to = %role,
                "User role synced from membership"
            );
        }
        Ok(())
    }

    async fn publish(&self, membership: &Membership, outcome: &TransitionOutcome) {
        let mut envelopes = Vec::with_capacity(outcome.events.len());
        for event in &outcome.events {
            match EventEnvelope::from_event(event) {
                Ok(envelope) => {
                    let envelope = envelope.with_user_id(event.user_id().as_str());
                    envelopes.push(match &outcome.audit.external_event_id {
                        Some(id) => envelope.with_correlation_id(id.as_str()),
                        None => envelope,
                    });
                }
                Err(e) => tracing::error!(
                    membership_id = %membership.id(),
                    event_type = event.event_type(),
                    error = %e,
                    "Failed to serialize membership event"
                ),
            }
        }

        if envelopes.is_empty() {
            return;
        }
        if let Err(e) = self.event_publisher.publish_all(envelopes).await {
            tracing::warn!(
                membership_id = %membership.id(),
                error = %e,
                "Membership events not fully delivered"
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
    use crate::domain::billing::Coupon;
    use crate::domain::foundation::{Timestamp, UserId};
    use crate::domain::membership::AppliedCoupon;

    #[tokio::test]
    async fn new_membership_is_saved_and_audited() {
        let h = Harness::new().await;
        let user = h.add_user("user-1", UserRole::User).await;
        let (membership, created) = Membership::create_pending(user.clone(), None, Timestamp::now());

        h.committer()
            .commit(&membership, TransitionOutcome::new(vec![created]).inserted())
            .await
            .unwrap();

        assert!(h.memberships.find_by_user_id(&user).await.unwrap().is_some());
        assert_eq!(h.audit.kinds().await, vec![AuditEventKind::MembershipCreated]);
        assert!(h.bus.has_event("membership.created.v1"));
        assert_eq!(h.users.role_of(&user).await, Some(UserRole::User));
    }

    #[tokio::test]
    async fn activation_raises_plain_user_to_member() {
        let h = Harness::new().await;
        let user = h.add_user("user-1", UserRole::User).await;
        let membership = h.active_membership(&user).await;

        h.committer()
            .commit(&membership, TransitionOutcome::default())
            .await
            .unwrap();

        assert_eq!(h.users.role_of(&user).await, Some(UserRole::Member));
    }

    #[tokio::test]
    async fn activation_leaves_admin_untouched() {
        let h = Harness::new().await;
        let user = h.add_user("admin-1", UserRole::Admin).await;
        let membership = h.active_membership(&user).await;

        h.committer()
            .commit(&membership, TransitionOutcome::default())
            .await
            .unwrap();

        assert_eq!(h.users.role_of(&user).await, Some(UserRole::Admin));
    }

    fn with_uncounted_coupon(membership: Membership, coupon: &Coupon) -> Membership {
        let mut record = membership.into_record();
        record.coupon = Some(AppliedCoupon {
            coupon_id: coupon.id,
            code: coupon.code.clone(),
            discount_type: coupon.discount_type,
            amount: coupon.amount,
            applied_at: Timestamp::now(),
            redemption_counted: false,
        });
        Membership::from_record(record)
    }

    #[tokio::test]
    async fn redeemed_coupon_is_counted_once() {
        let h = Harness::new().await;
        let user = h.add_user("user-1", UserRole::User).await;
        let coupon = h.add_percent_coupon("PERCENT20", 20).await;
        let membership = with_uncounted_coupon(h.active_membership(&user).await, &coupon);
        let outcome = || TransitionOutcome::default().with_redeemed_coupon(Some(coupon.id));

        h.committer().commit(&membership, outcome()).await.unwrap();
        let stored = h.memberships.find_by_user_id(&user).await.unwrap().unwrap();
        assert!(stored.record().coupon.as_ref().unwrap().redemption_counted);

        h.committer().commit(&stored, outcome()).await.unwrap();

        let coupon = h.coupons.find_by_id(&coupon.id).await.unwrap().unwrap();
        assert_eq!(coupon.used_count, 1);
    }

    #[tokio::test]
    async fn redemption_is_counted_before_role_sync_fails() {
        let h = Harness::new().await;
        let user = h.add_user("user-1", UserRole::User).await;
        let coupon = h.add_percent_coupon("PERCENT20", 20).await;
        let membership = with_uncounted_coupon(h.active_membership(&user).await, &coupon);
        h.users.fail_writes(true);

        let result = h
            .committer()
            .commit(
                &membership,
                TransitionOutcome::default().with_redeemed_coupon(Some(coupon.id)),
            )
            .await;

        assert!(matches!(result, Err(MembershipError::Infrastructure(_))));
        let stored = h.coupons.find_by_id(&coupon.id).await.unwrap().unwrap();
        assert_eq!(stored.used_count, 1);
        assert_eq!(h.users.role_of(&user).await, Some(UserRole::User));
    }

    #[tokio::test]
    async fn persistence_failure_stops_side_effects() {
        let h = Harness::new().await;
        let user = h.add_user("user-1", UserRole::User).await;
        let membership = h.active_membership(&user).await;
        h.memberships.fail_writes(true);

        let result = h
            .committer()
            .commit(&membership, TransitionOutcome::default())
            .await;

        assert!(matches!(result, Err(MembershipError::Infrastructure(_))));
        assert_eq!(h.users.role_of(&user).await, Some(UserRole::User));
    }

    #[tokio::test]
    async fn missing_owner_is_tolerated() {
        let h = Harness::new().await;
        let ghost = UserId::new("ghost").unwrap();
        let (membership, created) = Membership::create_pending(ghost, None, Timestamp::now());

        h.committer()
            .commit(&membership, TransitionOutcome::new(vec![created]).inserted())
            .await
            .unwrap();
    }
}
