//! CouponValidator - resolves a coupon code into a priced quote.
//!
//! Read-only: a quote never consumes a redemption slot. Redemptions are
//! counted when a payment carrying the coupon is confirmed.

use std::sync::Arc;

use crate::domain::billing::{normalize_code, quote, CouponQuote, CouponRejection};
use crate::domain::foundation::Timestamp;
use crate::domain::membership::MembershipError;
use crate::ports::CouponRepository;

pub struct CouponValidator {
    coupons: Arc<dyn CouponRepository>,
}

impl CouponValidator {
    pub fn new(coupons: Arc<dyn CouponRepository>) -> Self {
        Self { coupons }
    }

    /// Validates `code` against a plan price in minor units.
    ///
    /// # Errors
    ///
    /// - `CouponRejected` for unknown, inactive, out-of-window or exhausted
    ///   coupons, and for discounts landing under the minimum charge
    pub async fn validate(
        &self,
        code: &str,
        price_minor: i64,
        now: Timestamp,
    ) -> Result<CouponQuote, MembershipError> {
        let code = normalize_code(code);
        let coupon = self
            .coupons
            .find_by_code(&code)
            .await?
            .ok_or(CouponRejection::NotFound)?;

        let quote = quote(&coupon, price_minor, now).map_err(|rejection| {
            tracing::debug!(code = %code, reason = %rejection, "Coupon rejected");
            rejection
        })?;
        Ok(quote)
    }
}
