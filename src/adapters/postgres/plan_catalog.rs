//! PostgreSQL implementation of PlanCatalog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{BillingInterval, Plan};
use crate::domain::foundation::{DomainError, ErrorCode, PlanId, Timestamp};
use crate::ports::PlanCatalog;

pub struct PostgresPlanCatalog {
    pool: PgPool,
}

impl PostgresPlanCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlanRow {
    id: Uuid,
    name: String,
    price: Decimal,
    interval: String,
    active: bool,
    stripe_product_id: Option<String>,
    stripe_price_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PlanRow> for Plan {
    type Error = DomainError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        let interval: BillingInterval = row.interval.parse().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid interval value: {}", e))
        })?;

        Ok(Plan {
            id: PlanId::from_uuid(row.id),
            name: row.name,
            price: row.price,
            interval,
            active: row.active,
            stripe_product_id: row.stripe_product_id,
            stripe_price_id: row.stripe_price_id,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[async_trait]
impl PlanCatalog for PostgresPlanCatalog {
    async fn find_by_id(&self, id: &PlanId) -> Result<Option<Plan>, DomainError> {
        let row: Option<PlanRow> = sqlx::query_as(
            r#"
            SELECT id, name, price, interval, active, stripe_product_id,
                   stripe_price_id, created_at, updated_at
            FROM plans
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::new(ErrorCode::DatabaseError, format!("Failed to find plan: {}", e)))?;

        row.map(Plan::try_from).transpose()
    }

    async fn update(&self, plan: &Plan) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE plans SET
                name = $2,
                price = $3,
                interval = $4,
                active = $5,
                stripe_product_id = $6,
                stripe_price_id = $7,
                updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(plan.id.as_uuid())
        .bind(&plan.name)
        .bind(plan.price)
        .bind(plan.interval.as_str())
        .bind(plan.active)
        .bind(&plan.stripe_product_id)
        .bind(&plan.stripe_price_id)
        .bind(plan.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::new(ErrorCode::DatabaseError, format!("Failed to update plan: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(ErrorCode::PlanNotFound, "Plan not found"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_converts_to_plan() {
        let now = Utc::now();
        let plan = Plan::try_from(PlanRow {
            id: Uuid::new_v4(),
            name: "Annual Membership".into(),
            price: Decimal::new(5000, 2),
            interval: "year".into(),
            active: true,
            stripe_product_id: None,
            stripe_price_id: Some("price_1".into()),
            created_at: now,
            updated_at: now,
        })
        .unwrap();

        assert_eq!(plan.interval, BillingInterval::Year);
        assert_eq!(plan.price, Decimal::from(50));
        assert_eq!(plan.stripe_price_id.as_deref(), Some("price_1"));
    }
}
