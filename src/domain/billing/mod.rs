//! Billing domain module.
//!
//! Plans, coupons and the pure pricing rules shared by checkout preview and
//! checkout session creation.

mod checkout_metadata;
mod coupon;
mod plan;
mod pricing;

pub use checkout_metadata::{CheckoutMetadata, CouponMetadata};
pub use coupon::{normalize_code, Coupon, DiscountType};
pub use plan::{from_minor_units, to_minor_units, BillingInterval, Plan};
pub use pricing::{
    discount_minor, format_major, quote, CouponQuote, CouponRejection, MINIMUM_CHARGE_MINOR,
};
