//! In-memory audit log.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::audit::{AuditEventKind, AuditLogEntry};
use crate::domain::foundation::{DomainError, MembershipId};
use crate::ports::AuditLog;

#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditLog {
    entries: Arc<RwLock<Vec<AuditLogEntry>>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.read().await.clone()
    }

    pub async fn kinds(&self) -> Vec<AuditEventKind> {
        self.entries.read().await.iter().map(|e| e.kind).collect()
    }

    pub async fn count_of(&self, kind: AuditEventKind) -> usize {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), DomainError> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn list_for_membership(
        &self,
        membership_id: &MembershipId,
    ) -> Result<Vec<AuditLogEntry>, DomainError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| e.membership_id.as_ref() == Some(membership_id))
            .cloned()
            .collect())
    }
}
