//! Coupon repository port.

use async_trait::async_trait;

use crate::domain::billing::Coupon;
use crate::domain::foundation::{CouponId, DomainError};

#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// Look up by normalised code.
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, DomainError>;

    async fn find_by_id(&self, id: &CouponId) -> Result<Option<Coupon>, DomainError>;

    /// Insert a new coupon.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the code is already taken
    async fn save(&self, coupon: &Coupon) -> Result<(), DomainError>;

    /// Newest first.
    async fn list(&self) -> Result<Vec<Coupon>, DomainError>;

    /// Counts one redemption. A single increment, not a compare-and-set:
    /// the cap is checked at quote time only.
    async fn increment_used_count(&self, id: &CouponId) -> Result<(), DomainError>;
}
