//! Shared fixture for membership handler tests: in-memory adapters, a
//! recording event bus and the mock payment provider, wired the way the
//! composition root wires the real ones.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::adapters::events::InMemoryEventBus;
use crate::adapters::memory::{
    InMemoryAuditLog, InMemoryCouponRepository, InMemoryMembershipRepository, InMemoryPlanCatalog,
    InMemoryUserDirectory,
};
use crate::adapters::stripe::MockPaymentProvider;
use crate::domain::access::UserRole;
use crate::domain::billing::{BillingInterval, Coupon, DiscountType, Plan};
use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::membership::{
    compute_test_signature, Membership, PaymentConfirmation, PriceBreakdown, StripeEvent,
    StripeWebhookVerifier,
};
use crate::ports::{CouponRepository, MembershipRepository};

use super::{
    CheckoutPricing, CheckoutSettings, CleanupOrphansHandler, CouponValidator,
    CreateCheckoutHandler, CreateCouponHandler, GetAuditHistoryHandler, GetMembershipHandler,
    ListCouponsHandler, ListMembershipsHandler, ManageMembershipHandler, PreviewCheckoutHandler,
    ReconcileWebhookCommand, ReconcileWebhookHandler, TransitionCommitter,
};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

pub struct Harness {
    pub memberships: Arc<InMemoryMembershipRepository>,
    pub coupons: Arc<InMemoryCouponRepository>,
    pub plans: Arc<InMemoryPlanCatalog>,
    pub users: Arc<InMemoryUserDirectory>,
    pub audit: Arc<InMemoryAuditLog>,
    pub bus: Arc<InMemoryEventBus>,
    pub provider: MockPaymentProvider,
}

impl Harness {
    pub async fn new() -> Self {
        Self {
            memberships: Arc::new(InMemoryMembershipRepository::new()),
            coupons: Arc::new(InMemoryCouponRepository::new()),
            plans: Arc::new(InMemoryPlanCatalog::new()),
            users: Arc::new(InMemoryUserDirectory::new()),
            audit: Arc::new(InMemoryAuditLog::new()),
            bus: Arc::new(InMemoryEventBus::recording()),
            provider: MockPaymentProvider::new(),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Handlers
    // ════════════════════════════════════════════════════════════════════════════

    pub fn committer(&self) -> Arc<TransitionCommitter> {
        Arc::new(TransitionCommitter::new(
            self.memberships.clone(),
            self.coupons.clone(),
            self.users.clone(),
            self.audit.clone(),
            self.bus.clone(),
        ))
    }

    pub fn coupon_validator(&self) -> CouponValidator {
        CouponValidator::new(self.coupons.clone())
    }

    fn pricing(&self) -> Arc<CheckoutPricing> {
        Arc::new(CheckoutPricing::new(self.plans.clone(), self.coupon_validator()))
    }

    pub fn preview_handler(&self) -> PreviewCheckoutHandler {
        PreviewCheckoutHandler::new(self.pricing())
    }

    pub fn checkout_handler(&self) -> CreateCheckoutHandler {
        CreateCheckoutHandler::new(
            self.pricing(),
            self.plans.clone(),
            self.memberships.clone(),
            self.users.clone(),
            Arc::new(self.provider.clone()),
            self.committer(),
            CheckoutSettings {
                currency: "usd".into(),
                success_url: "https://app.test/membership/success".into(),
                cancel_url: "https://app.test/membership/cancel".into(),
            },
        )
    }

    pub fn reconciler(&self) -> ReconcileWebhookHandler {
        ReconcileWebhookHandler::new(
            StripeWebhookVerifier::new(WEBHOOK_SECRET),
            self.memberships.clone(),
            Arc::new(self.provider.clone()),
            self.audit.clone(),
            self.committer(),
            "usd",
        )
    }

    pub fn manage_handler(&self) -> ManageMembershipHandler {
        ManageMembershipHandler::new(
            self.memberships.clone(),
            Arc::new(self.provider.clone()),
            self.committer(),
        )
    }

    pub fn list_handler(&self) -> ListMembershipsHandler {
        ListMembershipsHandler::new(self.memberships.clone())
    }

    pub fn membership_handler(&self) -> GetMembershipHandler {
        GetMembershipHandler::new(self.memberships.clone())
    }

    pub fn audit_history_handler(&self) -> GetAuditHistoryHandler {
        GetAuditHistoryHandler::new(self.memberships.clone(), self.audit.clone())
    }

    pub fn cleanup_handler(&self) -> CleanupOrphansHandler {
        CleanupOrphansHandler::new(self.memberships.clone(), self.users.clone(), self.audit.clone())
    }

    pub fn create_coupon_handler(&self) -> CreateCouponHandler {
        CreateCouponHandler::new(self.coupons.clone())
    }

    pub fn list_coupons_handler(&self) -> ListCouponsHandler {
        ListCouponsHandler::new(self.coupons.clone())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Fixtures
    // ════════════════════════════════════════════════════════════════════════════

    pub async fn add_user(&self, id: &str, role: UserRole) -> UserId {
        let user_id = UserId::new(id).unwrap();
        self.users
            .insert(user_id.clone(), &format!("{id}@example.com"), role)
            .await;
        user_id
    }

    pub async fn add_plan(&self, price: Decimal) -> Plan {
        let plan = Plan::new("Annual Membership", price, BillingInterval::Year);
        self.plans.insert(plan.clone()).await;
        plan
    }

    pub async fn add_percent_coupon(&self, code: &str, percent: i64) -> Coupon {
        self.add_coupon(code, DiscountType::Percent, percent).await
    }

    pub async fn add_amount_coupon(&self, code: &str, dollars: i64) -> Coupon {
        self.add_coupon(code, DiscountType::Amount, dollars).await
    }

    async fn add_coupon(&self, code: &str, discount_type: DiscountType, amount: i64) -> Coupon {
        let coupon =
            Coupon::create(code, discount_type, Decimal::from(amount), None, None, None).unwrap();
        self.coupons.save(&coupon).await.unwrap();
        coupon
    }

    /// A stored membership already activated by a payment on `sub_test`.
    pub async fn active_membership(&self, user_id: &UserId) -> Membership {
        let now = Timestamp::now();
        let (mut membership, _) = Membership::create_pending(user_id.clone(), None, now);
        membership
            .confirm_payment(PaymentConfirmation {
                plan_id: None,
                period_start: now,
                period_end: now.add_days(365),
                cancel_at_period_end: false,
                customer_id: Some("cus_test".into()),
                subscription_id: Some("sub_test".into()),
                price_id: Some("price_test".into()),
                amount_paid_minor: 5000,
                currency: "usd".into(),
                price: PriceBreakdown::full(5000),
                card: None,
                invoice: None,
                coupon: None,
                confirmed_at: now,
            })
            .unwrap();
        self.memberships.save(&membership).await.unwrap();
        membership
    }

    /// Signs `event` the way the provider would, timestamped now.
    pub fn signed(&self, event: &StripeEvent) -> ReconcileWebhookCommand {
        let payload = serde_json::to_string(event).unwrap();
        let signature =
            compute_test_signature(WEBHOOK_SECRET, Timestamp::now().as_unix_secs(), &payload);
        ReconcileWebhookCommand {
            payload: payload.into_bytes(),
            signature: Some(signature),
        }
    }
}
