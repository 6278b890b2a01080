//! In-memory coupon store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::{normalize_code, Coupon};
use crate::domain::foundation::{CouponId, DomainError, ErrorCode};
use crate::ports::CouponRepository;

#[derive(Debug, Clone, Default)]
pub struct InMemoryCouponRepository {
    coupons: Arc<RwLock<HashMap<CouponId, Coupon>>>,
}

impl InMemoryCouponRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed coupons without going through `save`'s conflict check.
    pub async fn with_coupons(coupons: impl IntoIterator<Item = Coupon>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.coupons.write().await;
            for coupon in coupons {
                map.insert(coupon.id, coupon);
            }
        }
        repo
    }
}

#[async_trait]
impl CouponRepository for InMemoryCouponRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, DomainError> {
        let code = normalize_code(code);
        Ok(self
            .coupons
            .read()
            .await
            .values()
            .find(|c| c.code == code)
            .cloned())
    }

    async fn find_by_id(&self, id: &CouponId) -> Result<Option<Coupon>, DomainError> {
        Ok(self.coupons.read().await.get(id).cloned())
    }

    async fn save(&self, coupon: &Coupon) -> Result<(), DomainError> {
        let mut coupons = self.coupons.write().await;
        if coupons.values().any(|c| c.code == coupon.code) {
            return Err(DomainError::new(
                ErrorCode::Conflict,
                format!("Coupon code {} already exists", coupon.code),
            ));
        }
        coupons.insert(coupon.id, coupon.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Coupon>, DomainError> {
        let mut coupons: Vec<Coupon> = self.coupons.read().await.values().cloned().collect();
        coupons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(coupons)
    }

    async fn increment_used_count(&self, id: &CouponId) -> Result<(), DomainError> {
        let mut coupons = self.coupons.write().await;
        let coupon = coupons
            .get_mut(id)
            .ok_or_else(|| DomainError::new(ErrorCode::CouponNotFound, id.to_string()))?;
        coupon.used_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::DiscountType;
    use rust_decimal::Decimal;

    fn coupon(code: &str) -> Coupon {
        Coupon::create(code, DiscountType::Percent, Decimal::from(20), None, None, None).unwrap()
    }

    #[tokio::test]
    async fn lookup_normalises_code() {
        let repo = InMemoryCouponRepository::new();
        repo.save(&coupon("percent20")).await.unwrap();

        assert!(repo.find_by_code("  Percent20 ").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_code_conflicts() {
        let repo = InMemoryCouponRepository::new();
        repo.save(&coupon("SAVE")).await.unwrap();
        let err = repo.save(&coupon("save")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn increment_counts_one_redemption() {
        let c = coupon("SAVE");
        let repo = InMemoryCouponRepository::with_coupons([c.clone()]).await;

        repo.increment_used_count(&c.id).await.unwrap();

        assert_eq!(repo.find_by_id(&c.id).await.unwrap().unwrap().used_count, 1);
    }
}
