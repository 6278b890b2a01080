//! PostgreSQL implementation of CouponRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{Coupon, DiscountType};
use crate::domain::foundation::{CouponId, DomainError, ErrorCode, Timestamp};
use crate::ports::CouponRepository;

const COLUMNS: &str = r#"
    id, code, discount_type, amount, max_redemptions, used_count,
    starts_at, ends_at, is_active, created_at
"#;

pub struct PostgresCouponRepository {
    pool: PgPool,
}

impl PostgresCouponRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: Uuid,
    code: String,
    discount_type: String,
    amount: Decimal,
    max_redemptions: Option<i32>,
    used_count: i32,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = DomainError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        let discount_type: DiscountType = row.discount_type.parse().map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid discount_type value: {}", e),
            )
        })?;

        Ok(Coupon {
            id: CouponId::from_uuid(row.id),
            code: row.code,
            discount_type,
            amount: row.amount,
            max_redemptions: row.max_redemptions.map(non_negative).transpose()?,
            used_count: non_negative(row.used_count)?,
            starts_at: row.starts_at.map(Timestamp::from_datetime),
            ends_at: row.ends_at.map(Timestamp::from_datetime),
            is_active: row.is_active,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

fn non_negative(value: i32) -> Result<u32, DomainError> {
    u32::try_from(value).map_err(|_| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Negative coupon counter: {}", value),
        )
    })
}

#[async_trait]
impl CouponRepository for PostgresCouponRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, DomainError> {
        let sql = format!("SELECT {COLUMNS} FROM coupons WHERE code = $1");
        let row: Option<CouponRow> = sqlx::query_as(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Failed to find coupon: {}", e))
            })?;

        row.map(Coupon::try_from).transpose()
    }

    async fn find_by_id(&self, id: &CouponId) -> Result<Option<Coupon>, DomainError> {
        let sql = format!("SELECT {COLUMNS} FROM coupons WHERE id = $1");
        let row: Option<CouponRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Failed to find coupon: {}", e))
            })?;

        row.map(Coupon::try_from).transpose()
    }

    async fn save(&self, coupon: &Coupon) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO coupons (
                id, code, discount_type, amount, max_redemptions, used_count,
                starts_at, ends_at, is_active, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(coupon.id.as_uuid())
        .bind(&coupon.code)
        .bind(coupon.discount_type.as_str())
        .bind(coupon.amount)
        .bind(coupon.max_redemptions.map(|m| m as i32))
        .bind(coupon.used_count as i32)
        .bind(coupon.starts_at.map(|t| *t.as_datetime()))
        .bind(coupon.ends_at.map(|t| *t.as_datetime()))
        .bind(coupon.is_active)
        .bind(coupon.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("coupons_code_key") {
                    return DomainError::new(
                        ErrorCode::Conflict,
                        format!("Coupon code {} already exists", coupon.code),
                    );
                }
            }
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to save coupon: {}", e))
        })?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<Coupon>, DomainError> {
        let sql = format!("SELECT {COLUMNS} FROM coupons ORDER BY created_at DESC");
        let rows: Vec<CouponRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Failed to list coupons: {}", e))
            })?;

        rows.into_iter().map(Coupon::try_from).collect()
    }

    async fn increment_used_count(&self, id: &CouponId) -> Result<(), DomainError> {
        // Single statement so concurrent redemptions never lose an increment.
        let result = sqlx::query("UPDATE coupons SET used_count = used_count + 1 WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to increment coupon usage: {}", e),
                )
            })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(ErrorCode::CouponNotFound, "Coupon not found"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(discount_type: &str, used_count: i32) -> CouponRow {
        CouponRow {
            id: Uuid::new_v4(),
            code: "SPRING25".into(),
            discount_type: discount_type.into(),
            amount: Decimal::from(25),
            max_redemptions: Some(10),
            used_count,
            starts_at: None,
            ends_at: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn row_converts_to_coupon() {
        let coupon = Coupon::try_from(row("percent", 3)).unwrap();
        assert_eq!(coupon.discount_type, DiscountType::Percent);
        assert_eq!(coupon.used_count, 3);
        assert_eq!(coupon.max_redemptions, Some(10));
    }

    #[test]
    fn unknown_discount_type_is_a_database_error() {
        let err = Coupon::try_from(row("bogus", 0)).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn negative_counter_is_rejected() {
        assert!(Coupon::try_from(row("amount", -1)).is_err());
    }
}
