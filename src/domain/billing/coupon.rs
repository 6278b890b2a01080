//! Promotional coupon.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{CouponId, Timestamp, ValidationError};

/// How a coupon's `amount` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// `amount` is a percentage in (0, 100].
    Percent,
    /// `amount` is a fixed reduction in major currency units.
    Amount,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percent => "percent",
            DiscountType::Amount => "amount",
        }
    }
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percent" => Ok(DiscountType::Percent),
            "amount" => Ok(DiscountType::Amount),
            other => Err(ValidationError::invalid_format(
                "discount_type",
                format!("unknown discount type '{}'", other),
            )),
        }
    }
}

/// Largest fixed discount, in major units, a coupon may carry.
pub const MAX_FIXED_DISCOUNT: i64 = 1_000_000;

/// Canonical form of a coupon code: trimmed and uppercased.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// A promotional code with an optional redemption cap and validity window.
///
/// # Invariants
///
/// - `code` is stored normalized and is unique
/// - `used_count <= max_redemptions` when a cap is set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub discount_type: DiscountType,
    pub amount: Decimal,
    pub max_redemptions: Option<u32>,
    pub used_count: u32,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
    pub is_active: bool,
    pub created_at: Timestamp,
}

impl Coupon {
    /// Creates a new active coupon after validating the discount.
    pub fn create(
        code: &str,
        discount_type: DiscountType,
        amount: Decimal,
        max_redemptions: Option<u32>,
        starts_at: Option<Timestamp>,
        ends_at: Option<Timestamp>,
    ) -> Result<Self, ValidationError> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(ValidationError::empty_field("code"));
        }

        match discount_type {
            DiscountType::Percent if amount <= Decimal::ZERO || amount > Decimal::ONE_HUNDRED => {
                return Err(ValidationError::invalid_format(
                    "amount",
                    "percent discount must be greater than 0 and at most 100",
                ));
            }
            DiscountType::Amount if amount <= Decimal::ZERO => {
                return Err(ValidationError::invalid_format(
                    "amount",
                    "fixed discount must be greater than 0",
                ));
            }
            DiscountType::Amount if amount > Decimal::from(MAX_FIXED_DISCOUNT) => {
                return Err(ValidationError::invalid_format(
                    "amount",
                    "fixed discount is too large",
                ));
            }
            _ => {}
        }

        if let (Some(start), Some(end)) = (starts_at, ends_at) {
            if end.is_before(&start) {
                return Err(ValidationError::invalid_format(
                    "ends_at",
                    "end date must not precede start date",
                ));
            }
        }

        if max_redemptions == Some(0) {
            return Err(ValidationError::out_of_range(
                "max_redemptions",
                1,
                i64::from(u32::MAX),
                0,
            ));
        }

        Ok(Self {
            id: CouponId::new(),
            code,
            discount_type,
            amount,
            max_redemptions,
            used_count: 0,
            starts_at,
            ends_at,
            is_active: true,
            created_at: Timestamp::now(),
        })
    }

    pub fn has_started(&self, now: Timestamp) -> bool {
        self.starts_at.map_or(true, |start| !now.is_before(&start))
    }

    pub fn has_ended(&self, now: Timestamp) -> bool {
        self.ends_at.map_or(false, |end| now.is_after(&end))
    }

    /// True once every capped redemption slot has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.max_redemptions
            .map_or(false, |max| self.used_count >= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn percent(amount: i64) -> Result<Coupon, ValidationError> {
        Coupon::create("save", DiscountType::Percent, Decimal::from(amount), None, None, None)
    }

    #[test]
    fn normalize_code_trims_and_uppercases() {
        assert_eq!(normalize_code("  percent20 \n"), "PERCENT20");
    }

    #[test]
    fn create_stores_normalized_code() {
        let coupon = percent(20).unwrap();
        assert_eq!(coupon.code, "SAVE");
        assert_eq!(coupon.used_count, 0);
        assert!(coupon.is_active);
    }

    #[test]
    fn percent_must_be_in_range() {
        assert!(percent(0).is_err());
        assert!(percent(101).is_err());
        assert!(percent(100).is_ok());
    }

    #[test]
    fn amount_must_be_positive() {
        let result = Coupon::create("x", DiscountType::Amount, Decimal::ZERO, None, None, None);
        assert!(result.is_err());
    }

    #[test]
    fn amount_above_cap_is_rejected() {
        let cap = Decimal::from(MAX_FIXED_DISCOUNT);
        assert!(Coupon::create("x", DiscountType::Amount, cap, None, None, None).is_ok());
        let result =
            Coupon::create("x", DiscountType::Amount, cap + Decimal::ONE, None, None, None);
        assert!(result.is_err());
        assert!(Coupon::create("x", DiscountType::Amount, Decimal::MAX, None, None, None).is_err());
    }

    #[test]
    fn blank_code_is_rejected() {
        let result = Coupon::create("  ", DiscountType::Amount, Decimal::ONE, None, None, None);
        assert!(matches!(result, Err(ValidationError::EmptyField { .. })));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let start = Timestamp::from_unix_secs(1_000).unwrap();
        let end = Timestamp::from_unix_secs(2_000).unwrap();
        let coupon = Coupon::create(
            "w",
            DiscountType::Amount,
            Decimal::ONE,
            None,
            Some(start),
            Some(end),
        )
        .unwrap();

        assert!(!coupon.has_started(start.plus_secs(-1)));
        assert!(coupon.has_started(start));
        assert!(!coupon.has_ended(end));
        assert!(coupon.has_ended(end.plus_secs(1)));
    }

    #[test]
    fn exhausted_only_when_capped_and_used_up() {
        let mut coupon = percent(10).unwrap();
        coupon.used_count = 1_000;
        assert!(!coupon.is_exhausted());

        coupon.max_redemptions = Some(2);
        coupon.used_count = 1;
        assert!(!coupon.is_exhausted());
        coupon.used_count = 2;
        assert!(coupon.is_exhausted());
    }
}
