//! Audit log port. Append-only.

use async_trait::async_trait;

use crate::domain::audit::AuditLogEntry;
use crate::domain::foundation::{DomainError, MembershipId};

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), DomainError>;

    /// Oldest first.
    async fn list_for_membership(
        &self,
        membership_id: &MembershipId,
    ) -> Result<Vec<AuditLogEntry>, DomainError>;
}
