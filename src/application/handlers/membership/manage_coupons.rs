//! Coupon administration: list and create.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::domain::billing::{Coupon, DiscountType};
use crate::domain::foundation::Timestamp;
use crate::domain::membership::MembershipError;
use crate::ports::CouponRepository;

#[derive(Debug, Clone)]
pub struct CreateCouponCommand {
    pub code: String,
    pub discount_type: DiscountType,
    pub amount: Decimal,
    pub max_redemptions: Option<u32>,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
}

pub struct CreateCouponHandler {
    coupons: Arc<dyn CouponRepository>,
}

impl CreateCouponHandler {
    pub fn new(coupons: Arc<dyn CouponRepository>) -> Self {
        Self { coupons }
    }

    /// # Errors
    ///
    /// - `Validation` for an empty code or an out-of-range discount
    /// - `Conflict` when the normalized code already exists
    pub async fn handle(&self, cmd: CreateCouponCommand) -> Result<Coupon, MembershipError> {
        let coupon = Coupon::create(
            &cmd.code,
            cmd.discount_type,
            cmd.amount,
            cmd.max_redemptions,
            cmd.starts_at,
            cmd.ends_at,
        )?;
        self.coupons.save(&coupon).await?;

        tracing::info!(
            coupon_id = %coupon.id,
            code = %coupon.code,
            discount_type = %coupon.discount_type,
            "Coupon created"
        );
        Ok(coupon)
    }
}

pub struct ListCouponsHandler {
    coupons: Arc<dyn CouponRepository>,
}

impl ListCouponsHandler {
    pub fn new(coupons: Arc<dyn CouponRepository>) -> Self {
        Self { coupons }
    }

    pub async fn handle(&self) -> Result<Vec<Coupon>, MembershipError> {
        Ok(self.coupons.list().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::membership::test_support::Harness;

    fn command(code: &str, discount_type: DiscountType, amount: i64) -> CreateCouponCommand {
        CreateCouponCommand {
            code: code.to_string(),
            discount_type,
            amount: Decimal::from(amount),
            max_redemptions: Some(100),
            starts_at: None,
            ends_at: None,
        }
    }

    #[tokio::test]
    async fn creates_with_normalized_code() {
        let h = Harness::new().await;

        let coupon = h
            .create_coupon_handler()
            .handle(command("  spring25 ", DiscountType::Percent, 25))
            .await
            .unwrap();

        assert_eq!(coupon.code, "SPRING25");
        assert_eq!(h.list_coupons_handler().handle().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_code_conflicts() {
        let h = Harness::new().await;
        let handler = h.create_coupon_handler();
        handler
            .handle(command("SPRING25", DiscountType::Percent, 25))
            .await
            .unwrap();

        let err = handler
            .handle(command("spring25", DiscountType::Amount, 5))
            .await
            .unwrap_err();

        assert!(matches!(err, MembershipError::Conflict { .. }));
    }

    #[tokio::test]
    async fn percent_over_hundred_is_rejected() {
        let h = Harness::new().await;

        let err = h
            .create_coupon_handler()
            .handle(command("TOOMUCH", DiscountType::Percent, 150))
            .await
            .unwrap_err();

        assert!(matches!(err, MembershipError::Validation { .. }));
    }
}
