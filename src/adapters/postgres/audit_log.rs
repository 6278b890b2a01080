//! PostgreSQL implementation of AuditLog. Append-only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use super::membership_repository::stored_user_id;
use crate::domain::audit::{AuditEventKind, AuditLogEntry};
use crate::domain::foundation::{
    AuditEntryId, DomainError, ErrorCode, MembershipId, PlanId, Timestamp,
};
use crate::ports::AuditLog;

pub struct PostgresAuditLog {
    pool: PgPool,
}

impl PostgresAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    user_id: Option<String>,
    plan_id: Option<Uuid>,
    membership_id: Option<Uuid>,
    kind: String,
    message: String,
    payload: JsonValue,
    external_event_id: Option<String>,
    external_payment_id: Option<String>,
    external_invoice_id: Option<String>,
    amount_minor: Option<i64>,
    currency: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditLogEntry {
    type Error = DomainError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let kind: AuditEventKind = row.kind.parse().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid audit kind: {}", e))
        })?;

        Ok(AuditLogEntry {
            id: AuditEntryId::from_uuid(row.id),
            user_id: row.user_id.map(stored_user_id).transpose()?,
            plan_id: row.plan_id.map(PlanId::from_uuid),
            membership_id: row.membership_id.map(MembershipId::from_uuid),
            kind,
            message: row.message,
            payload: row.payload,
            external_event_id: row.external_event_id,
            external_payment_id: row.external_payment_id,
            external_invoice_id: row.external_invoice_id,
            amount_minor: row.amount_minor,
            currency: row.currency,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[async_trait]
impl AuditLog for PostgresAuditLog {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (
                id, user_id, plan_id, membership_id, kind, message, payload,
                external_event_id, external_payment_id, external_invoice_id,
                amount_minor, currency, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.user_id.as_ref().map(|u| u.as_str()))
        .bind(entry.plan_id.map(|p| *p.as_uuid()))
        .bind(entry.membership_id.map(|m| *m.as_uuid()))
        .bind(entry.kind.as_str())
        .bind(&entry.message)
        .bind(&entry.payload)
        .bind(&entry.external_event_id)
        .bind(&entry.external_payment_id)
        .bind(&entry.external_invoice_id)
        .bind(entry.amount_minor)
        .bind(&entry.currency)
        .bind(entry.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to append audit entry: {}", e))
        })?;

        Ok(())
    }

    async fn list_for_membership(
        &self,
        membership_id: &MembershipId,
    ) -> Result<Vec<AuditLogEntry>, DomainError> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, plan_id, membership_id, kind, message, payload,
                   external_event_id, external_payment_id, external_invoice_id,
                   amount_minor, currency, created_at
            FROM audit_log
            WHERE membership_id = $1
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(membership_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to list audit entries: {}", e))
        })?;

        rows.into_iter().map(AuditLogEntry::try_from).collect()
    }
}
