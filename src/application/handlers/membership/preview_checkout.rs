//! PreviewCheckoutHandler - quotes a checkout without side effects.
//!
//! Preview and checkout both price through `CheckoutPricing`, so the amount
//! quoted is the amount charged.

use serde::Serialize;
use std::sync::Arc;

use crate::domain::billing::{CouponQuote, Plan};
use crate::domain::foundation::{PlanId, Timestamp};
use crate::domain::membership::MembershipError;
use crate::ports::PlanCatalog;

use super::CouponValidator;

/// A plan priced for checkout, with the coupon applied when one was given.
#[derive(Debug, Clone)]
pub struct PricedCheckout {
    pub plan: Plan,
    pub original_minor: i64,
    pub quote: Option<CouponQuote>,
}

impl PricedCheckout {
    pub fn amount_due_minor(&self) -> i64 {
        self.quote
            .as_ref()
            .map_or(self.original_minor, |q| q.discounted_minor)
    }
}

/// Shared pricing for preview and checkout.
pub struct CheckoutPricing {
    plans: Arc<dyn PlanCatalog>,
    coupons: CouponValidator,
}

impl CheckoutPricing {
    pub fn new(plans: Arc<dyn PlanCatalog>, coupons: CouponValidator) -> Self {
        Self { plans, coupons }
    }

    /// Loads a purchasable plan and its price in minor units.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the plan is missing or inactive
    /// - `Configuration` if the plan price is not positive
    pub async fn load_plan(&self, plan_id: &PlanId) -> Result<(Plan, i64), MembershipError> {
        let plan = self
            .plans
            .find_by_id(plan_id)
            .await?
            .filter(|p| p.active)
            .ok_or_else(|| MembershipError::not_found("Plan", plan_id))?;

        match plan.price_minor() {
            Some(price) if price > 0 => Ok((plan, price)),
            _ => Err(MembershipError::configuration(format!(
                "Plan {} has no positive price",
                plan.id
            ))),
        }
    }

    /// Blank coupon codes are treated as absent.
    pub async fn price(
        &self,
        plan_id: &PlanId,
        coupon_code: Option<&str>,
        now: Timestamp,
    ) -> Result<PricedCheckout, MembershipError> {
        let (plan, original_minor) = self.load_plan(plan_id).await?;

        let quote = match coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => Some(self.coupons.validate(code, original_minor, now).await?),
            None => None,
        };

        Ok(PricedCheckout {
            plan,
            original_minor,
            quote,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PreviewCheckoutQuery {
    pub plan_id: PlanId,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPreview {
    pub original_minor: i64,
    pub discounted_minor: i64,
    pub is_free: bool,
    pub coupon: Option<CouponQuote>,
}

pub struct PreviewCheckoutHandler {
    pricing: Arc<CheckoutPricing>,
}

impl PreviewCheckoutHandler {
    pub fn new(pricing: Arc<CheckoutPricing>) -> Self {
        Self { pricing }
    }

    pub async fn handle(
        &self,
        query: PreviewCheckoutQuery,
    ) -> Result<CheckoutPreview, MembershipError> {
        let priced = self
            .pricing
            .price(&query.plan_id, query.coupon_code.as_deref(), Timestamp::now())
            .await?;

        let discounted_minor = priced.amount_due_minor();
        Ok(CheckoutPreview {
            original_minor: priced.original_minor,
            discounted_minor,
            is_free: discounted_minor == 0,
            coupon: priced.quote,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::membership::test_support::Harness;
    use rust_decimal::Decimal;

    fn query(plan_id: PlanId, code: Option<&str>) -> PreviewCheckoutQuery {
        PreviewCheckoutQuery {
            plan_id,
            coupon_code: code.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn preview_without_coupon_is_full_price() {
        let h = Harness::new().await;
        let plan = h.add_plan(Decimal::new(5000, 2)).await;

        let preview = h.preview_handler().handle(query(plan.id, None)).await.unwrap();

        assert_eq!(preview.original_minor, 5000);
        assert_eq!(preview.discounted_minor, 5000);
        assert!(!preview.is_free);
        assert!(preview.coupon.is_none());
    }

    #[tokio::test]
    async fn preview_applies_percent_coupon() {
        let h = Harness::new().await;
        let plan = h.add_plan(Decimal::new(5000, 2)).await;
        h.add_percent_coupon("PERCENT20", 20).await;

        let preview = h
            .preview_handler()
            .handle(query(plan.id, Some("percent20")))
            .await
            .unwrap();

        assert_eq!(preview.discounted_minor, 4000);
        assert_eq!(preview.coupon.unwrap().discount_minor, 1000);
    }

    #[tokio::test]
    async fn scenario_c_below_minimum_is_rejected() {
        let h = Harness::new().await;
        let plan = h.add_plan(Decimal::new(40, 2)).await;
        h.add_percent_coupon("PERCENT20", 20).await;

        let err = h
            .preview_handler()
            .handle(query(plan.id, Some("PERCENT20")))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Discounted amount must be at least $0.50");
    }

    #[tokio::test]
    async fn blank_coupon_code_is_ignored() {
        let h = Harness::new().await;
        let plan = h.add_plan(Decimal::new(5000, 2)).await;

        let preview = h
            .preview_handler()
            .handle(query(plan.id, Some("   ")))
            .await
            .unwrap();

        assert_eq!(preview.discounted_minor, 5000);
    }

    #[tokio::test]
    async fn inactive_plan_is_not_found() {
        let h = Harness::new().await;
        let mut plan = h.add_plan(Decimal::new(5000, 2)).await;
        plan.active = false;
        h.plans.insert(plan.clone()).await;

        let err = h.preview_handler().handle(query(plan.id, None)).await.unwrap_err();

        assert!(matches!(err, MembershipError::NotFound { resource: "Plan", .. }));
    }

    #[tokio::test]
    async fn zero_priced_plan_is_a_configuration_error() {
        let h = Harness::new().await;
        let plan = h.add_plan(Decimal::ZERO).await;

        let err = h.preview_handler().handle(query(plan.id, None)).await.unwrap_err();

        assert!(matches!(err, MembershipError::Configuration(_)));
    }
}
