//! In-memory membership store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, MembershipId, UserId};
use crate::domain::membership::Membership;
use crate::ports::{MembershipFilter, MembershipRepository};

/// Keyed by membership id; user uniqueness is checked on save.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMembershipRepository {
    memberships: Arc<RwLock<HashMap<MembershipId, Membership>>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryMembershipRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save/update fail, to exercise error paths.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn count(&self) -> usize {
        self.memberships.read().await.len()
    }

    fn check_writable(&self) -> Result<(), DomainError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::database("simulated write failure"));
        }
        Ok(())
    }

    async fn find_where<F>(&self, predicate: F) -> Result<Option<Membership>, DomainError>
    where
        F: Fn(&Membership) -> bool + Send,
    {
        Ok(self
            .memberships
            .read()
            .await
            .values()
            .find(|m| predicate(m))
            .cloned())
    }
}

#[async_trait]
impl MembershipRepository for InMemoryMembershipRepository {
    async fn save(&self, membership: &Membership) -> Result<(), DomainError> {
        self.check_writable()?;
        let mut memberships = self.memberships.write().await;
        if memberships
            .values()
            .any(|m| m.user_id() == membership.user_id())
        {
            return Err(DomainError::new(
                ErrorCode::Conflict,
                format!("User {} already has a membership", membership.user_id()),
            ));
        }
        memberships.insert(membership.id(), membership.clone());
        Ok(())
    }

    async fn update(&self, membership: &Membership) -> Result<(), DomainError> {
        self.check_writable()?;
        let mut memberships = self.memberships.write().await;
        match memberships.get_mut(&membership.id()) {
            Some(existing) => {
                *existing = membership.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::MembershipNotFound,
                membership.id().to_string(),
            )),
        }
    }

    async fn find_by_id(&self, id: &MembershipId) -> Result<Option<Membership>, DomainError> {
        Ok(self.memberships.read().await.get(id).cloned())
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Membership>, DomainError> {
        self.find_where(|m| m.user_id() == user_id).await
    }

    async fn find_by_stripe_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Membership>, DomainError> {
        self.find_where(|m| m.stripe_subscription_id() == Some(subscription_id))
            .await
    }

    async fn find_by_stripe_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Membership>, DomainError> {
        self.find_where(|m| m.stripe_customer_id() == Some(customer_id))
            .await
    }

    async fn list(&self, filter: &MembershipFilter) -> Result<Vec<Membership>, DomainError> {
        let mut memberships: Vec<Membership> = self
            .memberships
            .read()
            .await
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        memberships.sort_by(|a, b| b.record().created_at.cmp(&a.record().created_at));
        Ok(memberships)
    }

    async fn delete(&self, id: &MembershipId) -> Result<(), DomainError> {
        self.memberships
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| DomainError::new(ErrorCode::MembershipNotFound, id.to_string()))
    }
}
