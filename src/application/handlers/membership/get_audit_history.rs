//! GetAuditHistoryHandler - a membership's audit trail, oldest first.

use std::sync::Arc;

use crate::domain::audit::AuditLogEntry;
use crate::domain::foundation::MembershipId;
use crate::domain::membership::MembershipError;
use crate::ports::{AuditLog, MembershipRepository};

#[derive(Debug, Clone)]
pub struct GetAuditHistoryQuery {
    pub membership_id: MembershipId,
}

pub struct GetAuditHistoryHandler {
    memberships: Arc<dyn MembershipRepository>,
    audit_log: Arc<dyn AuditLog>,
}

impl GetAuditHistoryHandler {
    pub fn new(memberships: Arc<dyn MembershipRepository>, audit_log: Arc<dyn AuditLog>) -> Self {
        Self {
            memberships,
            audit_log,
        }
    }

    pub async fn handle(
        &self,
        query: GetAuditHistoryQuery,
    ) -> Result<Vec<AuditLogEntry>, MembershipError> {
        if self.memberships.find_by_id(&query.membership_id).await?.is_none() {
            return Err(MembershipError::not_found("Membership", query.membership_id));
        }
        Ok(self.audit_log.list_for_membership(&query.membership_id).await?)
    }
}
