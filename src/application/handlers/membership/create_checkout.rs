//! CreateCheckoutHandler - starts a hosted checkout for a plan.
//!
//! The pending membership is created (or pointed at the plan) before the
//! provider session exists. Pricing and coupon context travel only in the
//! session metadata; the reconciler reads it back from there.

use std::sync::Arc;

use crate::domain::billing::{CheckoutMetadata, Plan};
use crate::domain::foundation::{PlanId, Timestamp, UserId};
use crate::domain::membership::{Membership, MembershipError};
use crate::ports::{
    CheckoutLineItem, CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest,
    CreatePriceRequest, MembershipRepository, PaymentProvider, PlanCatalog, UserDirectory,
};

use super::{CheckoutPricing, TransitionCommitter, TransitionOutcome};

/// Provider-facing checkout settings.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// ISO currency code, lowercase.
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone)]
pub struct CreateCheckoutCommand {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateCheckoutResult {
    pub session: CheckoutSession,
    pub amount_due_minor: i64,
}

pub struct CreateCheckoutHandler {
    pricing: Arc<CheckoutPricing>,
    plans: Arc<dyn PlanCatalog>,
    memberships: Arc<dyn MembershipRepository>,
    users: Arc<dyn UserDirectory>,
    payment_provider: Arc<dyn PaymentProvider>,
    committer: Arc<TransitionCommitter>,
    settings: CheckoutSettings,
}

impl CreateCheckoutHandler {
    pub fn new(
        pricing: Arc<CheckoutPricing>,
        plans: Arc<dyn PlanCatalog>,
        memberships: Arc<dyn MembershipRepository>,
        users: Arc<dyn UserDirectory>,
        payment_provider: Arc<dyn PaymentProvider>,
        committer: Arc<TransitionCommitter>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            pricing,
            plans,
            memberships,
            users,
            payment_provider,
            committer,
            settings,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateCheckoutCommand,
    ) -> Result<CreateCheckoutResult, MembershipError> {
        let now = Timestamp::now();

        // 1. Price first so a bad coupon changes nothing
        let priced = self
            .pricing
            .price(&cmd.plan_id, cmd.coupon_code.as_deref(), now)
            .await?;
        let amount_due_minor = priced.amount_due_minor();
        let plan = self.ensure_provider_price(priced.plan.clone(), priced.original_minor).await?;

        // 2. Membership row pointing at this plan, with a provider customer
        let (mut membership, mut outcome) =
            match self.memberships.find_by_user_id(&cmd.user_id).await? {
                Some(mut existing) => {
                    existing.select_plan(plan.id, now)?;
                    (existing, TransitionOutcome::default())
                }
                None => {
                    let (created, event) =
                        Membership::create_pending(cmd.user_id.clone(), Some(plan.id), now);
                    (created, TransitionOutcome::new(vec![event]).inserted())
                }
            };

        let customer_id = match membership.stripe_customer_id() {
            Some(id) => id.to_string(),
            None => self.create_customer(&cmd.user_id).await?,
        };
        membership.attach_customer(customer_id.clone(), now);
        outcome.audit.plan_id = Some(plan.id);
        self.committer.commit(&membership, outcome).await?;

        // 3. Session, discounted line item when a coupon applies
        let line_item = match (&priced.quote, &plan.stripe_product_id, &plan.stripe_price_id) {
            (Some(quote), Some(product_id), _) => CheckoutLineItem::Inline {
                product_id: product_id.clone(),
                unit_amount_minor: quote.discounted_minor,
                currency: self.settings.currency.clone(),
                interval: plan.interval,
            },
            (None, _, Some(price_id)) => CheckoutLineItem::Price {
                price_id: price_id.clone(),
            },
            _ => {
                return Err(MembershipError::configuration(format!(
                    "Plan {} has no provider price",
                    plan.id
                )))
            }
        };

        let metadata = CheckoutMetadata::new(cmd.user_id.clone(), plan.id, priced.quote.as_ref());
        let session = self
            .payment_provider
            .create_checkout_session(CreateCheckoutRequest {
                customer_id,
                line_item,
                metadata: metadata.to_map(),
                success_url: self.settings.success_url.clone(),
                cancel_url: self.settings.cancel_url.clone(),
            })
            .await?;

        tracing::info!(
            user_id = %cmd.user_id,
            plan_id = %plan.id,
            session_id = %session.id,
            amount_due_minor,
            coupon = priced.quote.as_ref().map(|q| q.code.as_str()),
            "Checkout session created"
        );

        Ok(CreateCheckoutResult {
            session,
            amount_due_minor,
        })
    }

    /// Provisions a product and recurring price for plans that have none.
    async fn ensure_provider_price(
        &self,
        mut plan: Plan,
        price_minor: i64,
    ) -> Result<Plan, MembershipError> {
        if plan.stripe_price_id.is_some() && plan.stripe_product_id.is_some() {
            return Ok(plan);
        }

        let price = self
            .payment_provider
            .create_product_and_price(CreatePriceRequest {
                plan_id: plan.id,
                product_name: plan.name.clone(),
                unit_amount_minor: price_minor,
                currency: self.settings.currency.clone(),
                interval: plan.interval,
            })
            .await?;
        plan.attach_provider_price(price.product_id, price.price_id);
        self.plans.update(&plan).await?;
        Ok(plan)
    }

    async fn create_customer(&self, user_id: &UserId) -> Result<String, MembershipError> {
        let user = self
            .users
            .find(user_id)
            .await?
            .ok_or_else(|| MembershipError::not_found("User", user_id))?;

        let customer = self
            .payment_provider
            .create_customer(CreateCustomerRequest {
                user_id: user.id.clone(),
                email: user.email,
                name: user.name,
                idempotency_key: format!("customer-{}", user.id),
            })
            .await?;
        Ok(customer.id)
    }
}
