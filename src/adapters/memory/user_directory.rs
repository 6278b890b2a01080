//! In-memory user directory.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::access::UserRole;
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::{UserAccount, UserDirectory};

#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<UserId, UserAccount>>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set_role` fail, to exercise error paths.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn insert(&self, id: UserId, email: &str, role: UserRole) {
        self.users.write().await.insert(
            id.clone(),
            UserAccount {
                id,
                email: email.to_string(),
                name: None,
                role,
            },
        );
    }

    pub async fn remove(&self, user_id: &UserId) {
        self.users.write().await.remove(user_id);
    }

    pub async fn role_of(&self, user_id: &UserId) -> Option<UserRole> {
        self.users.read().await.get(user_id).map(|u| u.role)
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find(&self, user_id: &UserId) -> Result<Option<UserAccount>, DomainError> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn set_role(&self, user_id: &UserId, role: UserRole) -> Result<(), DomainError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::database("simulated write failure"));
        }
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| DomainError::new(ErrorCode::UserNotFound, user_id.to_string()))?;
        user.role = role;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_role_updates_existing_user() {
        let dir = InMemoryUserDirectory::new();
        let id = UserId::new("user-1").unwrap();
        dir.insert(id.clone(), "a@example.com", UserRole::User).await;

        dir.set_role(&id, UserRole::Member).await.unwrap();

        assert_eq!(dir.role_of(&id).await, Some(UserRole::Member));
        assert!(dir.exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn set_role_on_missing_user_fails() {
        let dir = InMemoryUserDirectory::new();
        let err = dir
            .set_role(&UserId::new("ghost").unwrap(), UserRole::Member)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UserNotFound);
    }
}
