//! PostgreSQL implementation of MembershipRepository.
//!
//! Lookup and filter fields are plain columns; the payment, failure, coupon
//! and invoice snapshots are stored as JSONB and always written whole.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, MembershipId, PlanId, Timestamp, UserId};
use crate::domain::membership::{
    AppliedCoupon, ArchiveState, FailureSnapshot, InvoiceSnapshot, Membership, MembershipRecord,
    MembershipStatus, PaymentSnapshot,
};
use crate::ports::{MembershipFilter, MembershipRepository};

const COLUMNS: &str = r#"
    id, user_id, plan_id, status, start_date, expiry_date, next_billing_date,
    auto_renew, cancel_at_period_end, stripe_customer_id, stripe_subscription_id,
    stripe_price_id, coupon, payment, invoice, failure, is_archived, archived_at,
    archived_by, archived_reason, created_at, updated_at
"#;

/// PostgreSQL implementation of the MembershipRepository port.
pub struct PostgresMembershipRepository {
    pool: PgPool,
}

impl PostgresMembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Single-row lookup on a text column.
    async fn find_by_text(
        &self,
        column: &'static str,
        value: &str,
    ) -> Result<Option<Membership>, DomainError> {
        let sql = format!("SELECT {COLUMNS} FROM memberships WHERE {column} = $1");
        let row: Option<MembershipRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Failed to find membership: {}", e))
            })?;

        row.map(Membership::try_from).transpose()
    }
}

/// Database row representation of a membership.
#[derive(Debug, sqlx::FromRow)]
struct MembershipRow {
    id: Uuid,
    user_id: String,
    plan_id: Option<Uuid>,
    status: String,
    start_date: Option<DateTime<Utc>>,
    expiry_date: Option<DateTime<Utc>>,
    next_billing_date: Option<DateTime<Utc>>,
    auto_renew: bool,
    cancel_at_period_end: bool,
    stripe_customer_id: Option<String>,
    stripe_subscription_id: Option<String>,
    stripe_price_id: Option<String>,
    coupon: Option<Json<AppliedCoupon>>,
    payment: Json<PaymentSnapshot>,
    invoice: Option<Json<InvoiceSnapshot>>,
    failure: Json<FailureSnapshot>,
    is_archived: bool,
    archived_at: Option<DateTime<Utc>>,
    archived_by: Option<String>,
    archived_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MembershipRow> for Membership {
    type Error = DomainError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        let status: MembershipStatus = row.status.parse().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid status value: {}", e))
        })?;

        Ok(Membership::from_record(MembershipRecord {
            id: MembershipId::from_uuid(row.id),
            user_id: stored_user_id(row.user_id)?,
            plan_id: row.plan_id.map(PlanId::from_uuid),
            status,
            start_date: row.start_date.map(Timestamp::from_datetime),
            expiry_date: row.expiry_date.map(Timestamp::from_datetime),
            next_billing_date: row.next_billing_date.map(Timestamp::from_datetime),
            auto_renew: row.auto_renew,
            cancel_at_period_end: row.cancel_at_period_end,
            stripe_customer_id: row.stripe_customer_id,
            stripe_subscription_id: row.stripe_subscription_id,
            stripe_price_id: row.stripe_price_id,
            coupon: row.coupon.map(|c| c.0),
            payment: row.payment.0,
            invoice: row.invoice.map(|i| i.0),
            failure: row.failure.0,
            archive: ArchiveState {
                is_archived: row.is_archived,
                archived_at: row.archived_at.map(Timestamp::from_datetime),
                archived_by: row.archived_by.map(stored_user_id).transpose()?,
                archived_reason: row.archived_reason,
            },
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        }))
    }
}

pub(super) fn stored_user_id(raw: String) -> Result<UserId, DomainError> {
    UserId::new(raw).map_err(|e| {
        DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e))
    })
}

fn datetime(ts: Option<Timestamp>) -> Option<DateTime<Utc>> {
    ts.map(|t| *t.as_datetime())
}

#[async_trait]
impl MembershipRepository for PostgresMembershipRepository {
    async fn save(&self, membership: &Membership) -> Result<(), DomainError> {
        let r = membership.record();
        sqlx::query(
            r#"
            INSERT INTO memberships (
                id, user_id, plan_id, status, start_date, expiry_date, next_billing_date,
                auto_renew, cancel_at_period_end, stripe_customer_id, stripe_subscription_id,
                stripe_price_id, coupon, payment, invoice, failure, is_archived, archived_at,
                archived_by, archived_reason, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                      $17, $18, $19, $20, $21, $22)
            "#,
        )
        .bind(r.id.as_uuid())
        .bind(r.user_id.as_str())
        .bind(r.plan_id.map(|p| *p.as_uuid()))
        .bind(r.status.as_str())
        .bind(datetime(r.start_date))
        .bind(datetime(r.expiry_date))
        .bind(datetime(r.next_billing_date))
        .bind(r.auto_renew)
        .bind(r.cancel_at_period_end)
        .bind(&r.stripe_customer_id)
        .bind(&r.stripe_subscription_id)
        .bind(&r.stripe_price_id)
        .bind(r.coupon.as_ref().map(Json))
        .bind(Json(&r.payment))
        .bind(r.invoice.as_ref().map(Json))
        .bind(Json(&r.failure))
        .bind(r.archive.is_archived)
        .bind(datetime(r.archive.archived_at))
        .bind(r.archive.archived_by.as_ref().map(UserId::as_str))
        .bind(&r.archive.archived_reason)
        .bind(r.created_at.as_datetime())
        .bind(r.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("memberships_user_id_key") {
                    return DomainError::new(ErrorCode::Conflict, "User already has a membership");
                }
            }
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to save membership: {}", e))
        })?;

        Ok(())
    }

    async fn update(&self, membership: &Membership) -> Result<(), DomainError> {
        let r = membership.record();
        let result = sqlx::query(
            r#"
            UPDATE memberships SET
                plan_id = $2,
                status = $3,
                start_date = $4,
                expiry_date = $5,
                next_billing_date = $6,
                auto_renew = $7,
                cancel_at_period_end = $8,
                stripe_customer_id = $9,
                stripe_subscription_id = $10,
                stripe_price_id = $11,
                coupon = $12,
                payment = $13,
                invoice = $14,
                failure = $15,
                is_archived = $16,
                archived_at = $17,
                archived_by = $18,
                archived_reason = $19,
                updated_at = $20
            WHERE id = $1
            "#,
        )
        .bind(r.id.as_uuid())
        .bind(r.plan_id.map(|p| *p.as_uuid()))
        .bind(r.status.as_str())
        .bind(datetime(r.start_date))
        .bind(datetime(r.expiry_date))
        .bind(datetime(r.next_billing_date))
        .bind(r.auto_renew)
        .bind(r.cancel_at_period_end)
        .bind(&r.stripe_customer_id)
        .bind(&r.stripe_subscription_id)
        .bind(&r.stripe_price_id)
        .bind(r.coupon.as_ref().map(Json))
        .bind(Json(&r.payment))
        .bind(r.invoice.as_ref().map(Json))
        .bind(Json(&r.failure))
        .bind(r.archive.is_archived)
        .bind(datetime(r.archive.archived_at))
        .bind(r.archive.archived_by.as_ref().map(UserId::as_str))
        .bind(&r.archive.archived_reason)
        .bind(r.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to update membership: {}", e))
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::MembershipNotFound,
                "Membership not found",
            ));
        }

        Ok(())
    }

    async fn find_by_id(&self, id: &MembershipId) -> Result<Option<Membership>, DomainError> {
        let sql = format!("SELECT {COLUMNS} FROM memberships WHERE id = $1");
        let row: Option<MembershipRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Failed to find membership: {}", e))
            })?;

        row.map(Membership::try_from).transpose()
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Membership>, DomainError> {
        self.find_by_text("user_id", user_id.as_str()).await
    }

    async fn find_by_stripe_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Membership>, DomainError> {
        self.find_by_text("stripe_subscription_id", subscription_id)
            .await
    }

    async fn find_by_stripe_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Membership>, DomainError> {
        self.find_by_text("stripe_customer_id", customer_id).await
    }

    async fn list(&self, filter: &MembershipFilter) -> Result<Vec<Membership>, DomainError> {
        let sql = format!(
            r#"
            SELECT {COLUMNS} FROM memberships
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::boolean IS NULL OR is_archived = $2)
            ORDER BY created_at DESC
            "#
        );
        let rows: Vec<MembershipRow> = sqlx::query_as(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.archived)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Failed to list memberships: {}", e))
            })?;

        rows.into_iter().map(Membership::try_from).collect()
    }

    async fn delete(&self, id: &MembershipId) -> Result<(), DomainError> {
        let result = sqlx::query("DELETE FROM memberships WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Failed to delete membership: {}", e))
            })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::MembershipNotFound,
                "Membership not found",
            ));
        }

        Ok(())
    }
}
