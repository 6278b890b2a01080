//! Plan catalog port.
//!
//! Plan CRUD lives elsewhere; billing only reads plans and records the
//! provider price it provisioned for one.

use async_trait::async_trait;

use crate::domain::billing::Plan;
use crate::domain::foundation::{DomainError, PlanId};

#[async_trait]
pub trait PlanCatalog: Send + Sync {
    async fn find_by_id(&self, id: &PlanId) -> Result<Option<Plan>, DomainError>;

    /// Persist provider product/price references for a plan.
    async fn update(&self, plan: &Plan) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_catalog_is_object_safe() {
        fn _accepts_dyn(_catalog: &dyn PlanCatalog) {}
    }
}
