//! Coupon pricing.
//!
//! `quote` is the single discount computation used by both checkout preview
//! and checkout session creation, so a quoted price and a charged price can
//! never drift apart. It is side-effect free: redemption counting happens
//! only when an activation is confirmed.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use thiserror::Error;

use super::{from_minor_units, Coupon, DiscountType};
use crate::domain::foundation::{CouponId, Timestamp};

/// Smallest charge the payment processor accepts, in minor units ($0.50).
pub const MINIMUM_CHARGE_MINOR: i64 = 50;

/// Why a coupon cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("Invalid coupon code")]
    NotFound,

    #[error("Coupon is not active")]
    Inactive,

    #[error("Coupon is not yet valid")]
    NotYetValid,

    #[error("Coupon has expired")]
    Expired,

    #[error("Coupon usage limit reached")]
    Exhausted,

    #[error("Discounted amount must be at least $0.50")]
    BelowMinimumCharge,
}

/// Result of applying a coupon to a plan price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponQuote {
    pub coupon_id: CouponId,
    pub code: String,
    pub discount_type: DiscountType,
    pub amount: Decimal,
    pub original_minor: i64,
    pub discount_minor: i64,
    pub discounted_minor: i64,
}

impl CouponQuote {
    /// True when nothing is left to charge.
    pub fn is_free(&self) -> bool {
        self.discounted_minor == 0
    }
}

/// Discount in minor units for a coupon against `price_minor`.
///
/// Percent coupons floor toward zero; fixed coupons convert their major-unit
/// amount to minor units rounding half away from zero. A discount too large
/// to represent saturates at `i64::MAX`.
pub fn discount_minor(discount_type: DiscountType, amount: Decimal, price_minor: i64) -> i64 {
    let raw = match discount_type {
        DiscountType::Percent => Decimal::from(price_minor)
            .checked_mul(amount)
            .map(|scaled| (scaled / Decimal::ONE_HUNDRED).floor()),
        DiscountType::Amount => amount
            .checked_mul(Decimal::ONE_HUNDRED)
            .map(|minor| minor.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)),
    };
    raw.and_then(|d| d.to_i64()).unwrap_or(i64::MAX).max(0)
}

/// Validates `coupon` at `now` and prices it against `price_minor`.
pub fn quote(
    coupon: &Coupon,
    price_minor: i64,
    now: Timestamp,
) -> Result<CouponQuote, CouponRejection> {
    if !coupon.is_active {
        return Err(CouponRejection::Inactive);
    }
    if !coupon.has_started(now) {
        return Err(CouponRejection::NotYetValid);
    }
    if coupon.has_ended(now) {
        return Err(CouponRejection::Expired);
    }
    if coupon.is_exhausted() {
        return Err(CouponRejection::Exhausted);
    }

    let discount = discount_minor(coupon.discount_type, coupon.amount, price_minor);
    let discounted = price_minor.saturating_sub(discount).max(0);

    if discounted < MINIMUM_CHARGE_MINOR {
        return Err(CouponRejection::BelowMinimumCharge);
    }

    Ok(CouponQuote {
        coupon_id: coupon.id,
        code: coupon.code.clone(),
        discount_type: coupon.discount_type,
        amount: coupon.amount,
        original_minor: price_minor,
        discount_minor: discount,
        discounted_minor: discounted,
    })
}

/// Major-unit rendering used in responses and provider metadata.
pub fn format_major(minor: i64) -> String {
    from_minor_units(minor).to_string()
}
