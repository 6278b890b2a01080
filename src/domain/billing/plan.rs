//! Plan catalog entry.
//!
//! Prices are held in major currency units as exact decimals and converted to
//! minor units (cents) whenever they cross into pricing or the provider.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{PlanId, Timestamp, ValidationError};

/// Billing cadence of a recurring plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Month,
    Year,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Month => "month",
            BillingInterval::Year => "year",
        }
    }
}

impl fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingInterval {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "month" => Ok(BillingInterval::Month),
            "year" => Ok(BillingInterval::Year),
            other => Err(ValidationError::invalid_format(
                "interval",
                format!("unknown billing interval '{}'", other),
            )),
        }
    }
}

/// A purchasable membership tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    /// Price in major units (e.g. dollars).
    pub price: Decimal,
    pub interval: BillingInterval,
    pub active: bool,
    /// Provider product reference, created lazily with the price.
    pub stripe_product_id: Option<String>,
    /// Provider recurring price reference, created lazily on first checkout.
    pub stripe_price_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Plan {
    pub fn new(name: impl Into<String>, price: Decimal, interval: BillingInterval) -> Self {
        let now = Timestamp::now();
        Self {
            id: PlanId::new(),
            name: name.into(),
            price,
            interval,
            active: true,
            stripe_product_id: None,
            stripe_price_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Price converted to minor units, rounded half away from zero.
    ///
    /// Returns `None` when the price does not fit an `i64` number of cents.
    pub fn price_minor(&self) -> Option<i64> {
        to_minor_units(self.price)
    }

    /// Records the provider references after lazy provisioning.
    pub fn attach_provider_price(&mut self, product_id: String, price_id: String) {
        self.stripe_product_id = Some(product_id);
        self.stripe_price_id = Some(price_id);
        self.updated_at = Timestamp::now();
    }
}

/// Converts a major-unit amount to minor units (x100), rounding half away
/// from zero.
pub fn to_minor_units(major: Decimal) -> Option<i64> {
    (major * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Converts minor units back to an exact two-place major amount.
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}
