//! User directory port.
//!
//! Billing reads the buyer's email for customer provisioning and writes the
//! role derived from membership status.

use async_trait::async_trait;

use crate::domain::access::UserRole;
use crate::domain::foundation::{DomainError, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub role: UserRole,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find(&self, user_id: &UserId) -> Result<Option<UserAccount>, DomainError>;

    /// # Errors
    ///
    /// - `UserNotFound` if the user doesn't exist
    async fn set_role(&self, user_id: &UserId, role: UserRole) -> Result<(), DomainError>;

    async fn exists(&self, user_id: &UserId) -> Result<bool, DomainError> {
        Ok(self.find(user_id).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_directory_is_object_safe() {
        fn _accepts_dyn(_dir: &dyn UserDirectory) {}
    }
}
