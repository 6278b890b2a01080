//! Pricing context carried through the payment provider.
//!
//! Checkout attaches this metadata to both the checkout session and the
//! subscription it creates. The webhook reconciler reads it back: it is the
//! only trusted record of which plan and coupon a completed session was
//! priced with.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

use super::{CouponQuote, DiscountType};
use crate::domain::foundation::{CouponId, PlanId, UserId, ValidationError};

const USER_ID: &str = "userId";
const PLAN_ID: &str = "planId";
const COUPON_ID: &str = "couponId";
const CODE: &str = "code";
const DISCOUNT_TYPE: &str = "discountType";
const AMOUNT: &str = "amount";
const ORIGINAL_AMOUNT: &str = "originalAmount";
const DISCOUNTED_AMOUNT: &str = "discountedAmount";

/// Coupon part of checkout metadata. Amounts are minor units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponMetadata {
    pub coupon_id: CouponId,
    pub code: String,
    pub discount_type: DiscountType,
    pub amount: Decimal,
    pub original_minor: i64,
    pub discounted_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutMetadata {
    pub user_id: UserId,
    pub plan_id: Option<PlanId>,
    pub coupon: Option<CouponMetadata>,
}

impl CheckoutMetadata {
    pub fn new(user_id: UserId, plan_id: PlanId, quote: Option<&CouponQuote>) -> Self {
        Self {
            user_id,
            plan_id: Some(plan_id),
            coupon: quote.map(|q| CouponMetadata {
                coupon_id: q.coupon_id,
                code: q.code.clone(),
                discount_type: q.discount_type,
                amount: q.amount,
                original_minor: q.original_minor,
                discounted_minor: q.discounted_minor,
            }),
        }
    }

    /// Flattens into the string map the provider stores.
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(USER_ID.to_string(), self.user_id.to_string());
        if let Some(plan_id) = self.plan_id {
            map.insert(PLAN_ID.to_string(), plan_id.to_string());
        }
        if let Some(coupon) = &self.coupon {
            map.insert(COUPON_ID.to_string(), coupon.coupon_id.to_string());
            map.insert(CODE.to_string(), coupon.code.clone());
            map.insert(DISCOUNT_TYPE.to_string(), coupon.discount_type.to_string());
            map.insert(AMOUNT.to_string(), coupon.amount.to_string());
            map.insert(ORIGINAL_AMOUNT.to_string(), coupon.original_minor.to_string());
            map.insert(DISCOUNTED_AMOUNT.to_string(), coupon.discounted_minor.to_string());
        }
        map
    }

    /// Reads metadata back. `userId` is required; the coupon block is taken
    /// only when complete.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ValidationError> {
        let user_id = map
            .get(USER_ID)
            .ok_or_else(|| ValidationError::empty_field(USER_ID))
            .and_then(|raw| UserId::new(raw.as_str()))?;

        let plan_id = map
            .get(PLAN_ID)
            .map(|raw| parse(PLAN_ID, raw))
            .transpose()?;

        let coupon = match map.get(COUPON_ID) {
            Some(raw_id) if !raw_id.is_empty() => Some(CouponMetadata {
                coupon_id: parse(COUPON_ID, raw_id)?,
                code: required(map, CODE)?.to_string(),
                discount_type: parse(DISCOUNT_TYPE, required(map, DISCOUNT_TYPE)?)?,
                amount: parse(AMOUNT, required(map, AMOUNT)?)?,
                original_minor: parse(ORIGINAL_AMOUNT, required(map, ORIGINAL_AMOUNT)?)?,
                discounted_minor: parse(DISCOUNTED_AMOUNT, required(map, DISCOUNTED_AMOUNT)?)?,
            }),
            _ => None,
        };

        Ok(Self {
            user_id,
            plan_id,
            coupon,
        })
    }
}

fn required<'a>(map: &'a HashMap<String, String>, key: &'static str) -> Result<&'a str, ValidationError> {
    map.get(key)
        .map(String::as_str)
        .ok_or_else(|| ValidationError::empty_field(key))
}

fn parse<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ValidationError> {
    raw.parse()
        .map_err(|_| ValidationError::invalid_format(key, format!("cannot parse '{}'", raw)))
}
