//! Membership aggregate entity.
//!
//! A user's single subscription record. Fields are private: every change goes
//! through a named transition that keeps paired fields consistent and returns
//! the events it caused.
//!
//! # Design Decisions
//!
//! - **One per user**: unique constraint on `user_id` enforced at storage level
//! - **Money in cents**: snapshot amounts are `i64` minor units
//! - **Absolute writes**: webhook-driven transitions set fields to values taken
//!   from the provider event, so a redelivered event converges to the same state
//! - **Event time**: `updated_at` is the time of the event being applied, not
//!   wall-clock time

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::access::Entitlement;
use crate::domain::billing::DiscountType;
use crate::domain::foundation::{
    CouponId, MembershipId, PlanId, StateMachine, Timestamp, UserId, ValidationError,
};

use super::{MembershipError, MembershipEvent, MembershipStatus};

/// Number of consecutive failed payments that escalates an active
/// membership to past due.
pub const FAILURE_ESCALATION_THRESHOLD: u32 = 3;

/// Longest manual extension an administrator may grant at once.
pub const MAX_EXTENSION_DAYS: u32 = 365;

// ════════════════════════════════════════════════════════════════════════════════
// Snapshots
// ════════════════════════════════════════════════════════════════════════════════

/// Coupon attached to a membership at activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedCoupon {
    pub coupon_id: CouponId,
    pub code: String,
    pub discount_type: DiscountType,
    pub amount: Decimal,
    pub applied_at: Timestamp,
    /// Set once the coupon's redemption counter has been incremented. Until
    /// then every replayed confirmation reports the redemption again.
    #[serde(default = "counted_by_default")]
    pub redemption_counted: bool,
}

/// Rows written before the flag existed were counted when they were applied.
fn counted_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(ValidationError::invalid_format(
                "payment_status",
                format!("unknown payment status '{}'", other),
            )),
        }
    }
}

/// Charged price split into its parts.
///
/// Invariant: `final_minor = original_minor - discount_minor` with
/// `0 <= discount_minor <= original_minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    original_minor: i64,
    discount_minor: i64,
    final_minor: i64,
}

impl PriceBreakdown {
    /// Clamps the discount into `[0, original]` so the invariant always holds.
    pub fn new(original_minor: i64, discount_minor: i64) -> Self {
        let original_minor = original_minor.max(0);
        let discount_minor = discount_minor.clamp(0, original_minor);
        Self {
            original_minor,
            discount_minor,
            final_minor: original_minor - discount_minor,
        }
    }

    /// Undiscounted price.
    pub fn full(original_minor: i64) -> Self {
        Self::new(original_minor, 0)
    }

    pub fn original_minor(&self) -> i64 {
        self.original_minor
    }

    pub fn discount_minor(&self) -> i64 {
        self.discount_minor
    }

    pub fn final_minor(&self) -> i64 {
        self.final_minor
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    pub brand: String,
    pub last4: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSnapshot {
    pub status: PaymentStatus,
    pub last_payment_date: Option<Timestamp>,
    pub last_payment_amount_minor: Option<i64>,
    pub price: Option<PriceBreakdown>,
    pub card: Option<CardDetails>,
    pub currency: Option<String>,
    pub refunded_charge_id: Option<String>,
    pub refunded_amount_minor: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSnapshot {
    pub id: String,
    pub url: Option<String>,
    pub pdf: Option<String>,
    pub number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureSnapshot {
    pub failure_count: u32,
    pub reason: Option<String>,
    pub code: Option<String>,
    pub last_failed_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveState {
    pub is_archived: bool,
    pub archived_at: Option<Timestamp>,
    pub archived_by: Option<UserId>,
    pub archived_reason: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Transition inputs
// ════════════════════════════════════════════════════════════════════════════════

/// Everything a confirmed payment tells us, as reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentConfirmation {
    pub plan_id: Option<PlanId>,
    pub period_start: Timestamp,
    pub period_end: Timestamp,
    pub cancel_at_period_end: bool,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub price_id: Option<String>,
    pub amount_paid_minor: i64,
    pub currency: String,
    pub price: PriceBreakdown,
    pub card: Option<CardDetails>,
    pub invoice: Option<InvoiceSnapshot>,
    pub coupon: Option<AppliedCoupon>,
    pub confirmed_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentFailure {
    pub reason: Option<String>,
    pub code: Option<String>,
    pub invoice: Option<InvoiceSnapshot>,
    pub failed_at: Timestamp,
}

/// Provider-side subscription status, reduced to what changes local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSubscriptionStatus {
    PastDue,
    Canceled,
    IncompleteExpired,
    /// Any other status (active, trialing, incomplete, ...): sync dates only.
    Other,
}

impl ProviderSubscriptionStatus {
    /// Reduces the provider's status string. `unpaid` is treated as past due.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "past_due" | "unpaid" => ProviderSubscriptionStatus::PastDue,
            "canceled" => ProviderSubscriptionStatus::Canceled,
            "incomplete_expired" => ProviderSubscriptionStatus::IncompleteExpired,
            _ => ProviderSubscriptionStatus::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSubscriptionUpdate {
    pub status: ProviderSubscriptionStatus,
    pub period_start: Option<Timestamp>,
    pub period_end: Option<Timestamp>,
    pub cancel_at_period_end: bool,
    pub observed_at: Timestamp,
}

/// Result of applying a payment confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activation {
    pub events: Vec<MembershipEvent>,
    /// Coupon whose redemption is not yet counted: attached by this
    /// confirmation, or attached earlier by a commit that did not finish.
    pub redeemed_coupon: Option<CouponId>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Aggregate
// ════════════════════════════════════════════════════════════════════════════════

/// Plain persisted form of a membership, used by repositories to rebuild the
/// aggregate and by query handlers to render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub id: MembershipId,
    pub user_id: UserId,
    pub plan_id: Option<PlanId>,
    pub status: MembershipStatus,
    pub start_date: Option<Timestamp>,
    pub expiry_date: Option<Timestamp>,
    pub next_billing_date: Option<Timestamp>,
    pub auto_renew: bool,
    pub cancel_at_period_end: bool,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub coupon: Option<AppliedCoupon>,
    pub payment: PaymentSnapshot,
    pub invoice: Option<InvoiceSnapshot>,
    pub failure: FailureSnapshot,
    pub archive: ArchiveState,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Membership aggregate.
///
/// # Invariants
///
/// - `user_id` is unique (one membership per user)
/// - status changes follow `MembershipStatus`'s state machine
/// - `archive.is_archived` implies `!auto_renew && cancel_at_period_end`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    record: MembershipRecord,
}

impl Membership {
    /// Creates a pending membership on first checkout or admin action.
    pub fn create_pending(
        user_id: UserId,
        plan_id: Option<PlanId>,
        at: Timestamp,
    ) -> (Self, MembershipEvent) {
        let id = MembershipId::new();
        let membership = Self {
            record: MembershipRecord {
                id,
                user_id: user_id.clone(),
                plan_id,
                status: MembershipStatus::Pending,
                start_date: None,
                expiry_date: None,
                next_billing_date: None,
                auto_renew: true,
                cancel_at_period_end: false,
                stripe_customer_id: None,
                stripe_subscription_id: None,
                stripe_price_id: None,
                coupon: None,
                payment: PaymentSnapshot::default(),
                invoice: None,
                failure: FailureSnapshot::default(),
                archive: ArchiveState::default(),
                created_at: at,
                updated_at: at,
            },
        };
        let event = MembershipEvent::Created {
            membership_id: id,
            user_id,
            occurred_at: at,
        };
        (membership, event)
    }

    /// Rebuilds an aggregate from storage.
    pub fn from_record(record: MembershipRecord) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &MembershipRecord {
        &self.record
    }

    pub fn into_record(self) -> MembershipRecord {
        self.record
    }

    pub fn id(&self) -> MembershipId {
        self.record.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.record.user_id
    }

    pub fn status(&self) -> MembershipStatus {
        self.record.status
    }

    pub fn is_archived(&self) -> bool {
        self.record.archive.is_archived
    }

    pub fn failure_count(&self) -> u32 {
        self.record.failure.failure_count
    }

    pub fn stripe_customer_id(&self) -> Option<&str> {
        self.record.stripe_customer_id.as_deref()
    }

    pub fn stripe_subscription_id(&self) -> Option<&str> {
        self.record.stripe_subscription_id.as_deref()
    }

    /// What this membership means for the owner's role. Archiving revokes
    /// access without changing status.
    pub fn entitlement(&self) -> Entitlement {
        if self.is_archived() {
            Entitlement::Revoke
        } else {
            self.record.status.into()
        }
    }

    pub fn has_access(&self) -> bool {
        self.entitlement() == Entitlement::Grant
    }

    // ────────────────────────────────────────────────────────────────────────
    // Checkout
    // ────────────────────────────────────────────────────────────────────────

    /// Points the membership at the plan being purchased.
    ///
    /// A paying membership keeps its current plan until the new payment is
    /// confirmed; the plan then arrives through checkout metadata.
    pub fn select_plan(&mut self, plan_id: PlanId, at: Timestamp) -> Result<(), MembershipError> {
        self.ensure_not_archived("check out")?;
        if matches!(
            self.record.status,
            MembershipStatus::Active | MembershipStatus::PastDue
        ) || self.record.plan_id == Some(plan_id)
        {
            return Ok(());
        }
        self.record.plan_id = Some(plan_id);
        self.record.updated_at = at;
        Ok(())
    }

    pub fn attach_customer(&mut self, customer_id: String, at: Timestamp) {
        if self.record.stripe_customer_id.as_deref() == Some(customer_id.as_str()) {
            return;
        }
        self.record.stripe_customer_id = Some(customer_id);
        self.record.updated_at = at;
    }

    // ────────────────────────────────────────────────────────────────────────
    // Webhook-driven transitions
    // ────────────────────────────────────────────────────────────────────────

    /// Applies a confirmed payment (checkout completed or invoice paid).
    ///
    /// Every write is absolute. Replaying the same confirmation leaves the
    /// membership untouched and emits nothing. An invoice already recorded as
    /// paid is not confirmed again, whichever event type reports it.
    pub fn confirm_payment(
        &mut self,
        confirmation: PaymentConfirmation,
    ) -> Result<Activation, MembershipError> {
        self.ensure_not_archived("activate")?;

        if self.already_paid(confirmation.invoice.as_ref()) {
            return Ok(Activation {
                events: Vec::new(),
                redeemed_coupon: self
                    .record
                    .coupon
                    .as_ref()
                    .filter(|c| !c.redemption_counted)
                    .map(|c| c.coupon_id),
            });
        }

        let before = self.record.clone();
        let previous_status = self.record.status;
        let new_status = previous_status
            .transition_to(MembershipStatus::Active)
            .map_err(|_| MembershipError::invalid_state(previous_status, "activate"))?;
        let at = confirmation.confirmed_at;

        let r = &mut self.record;
        r.status = new_status;
        if confirmation.plan_id.is_some() {
            r.plan_id = confirmation.plan_id;
        }
        r.start_date = Some(confirmation.period_start);
        r.expiry_date = Some(confirmation.period_end);
        r.cancel_at_period_end = confirmation.cancel_at_period_end;
        r.auto_renew = !confirmation.cancel_at_period_end;
        r.next_billing_date = r.auto_renew.then_some(confirmation.period_end);
        if confirmation.customer_id.is_some() {
            r.stripe_customer_id = confirmation.customer_id;
        }
        if confirmation.subscription_id.is_some() {
            r.stripe_subscription_id = confirmation.subscription_id;
        }
        if confirmation.price_id.is_some() {
            r.stripe_price_id = confirmation.price_id;
        }

        r.payment.status = PaymentStatus::Paid;
        r.payment.last_payment_date = Some(at);
        r.payment.last_payment_amount_minor = Some(confirmation.amount_paid_minor);
        r.payment.price = Some(confirmation.price);
        r.payment.currency = Some(confirmation.currency.clone());
        if confirmation.card.is_some() {
            r.payment.card = confirmation.card;
        }
        if confirmation.invoice.is_some() {
            r.invoice = confirmation.invoice;
        }
        r.failure = FailureSnapshot::default();

        let mut redeemed_coupon = None;
        let mut newly_applied = false;
        if let Some(coupon) = confirmation.coupon {
            match r.coupon.as_ref() {
                Some(existing) if existing.coupon_id == coupon.coupon_id => {
                    if !existing.redemption_counted {
                        redeemed_coupon = Some(existing.coupon_id);
                    }
                }
                _ => {
                    redeemed_coupon = Some(coupon.coupon_id);
                    newly_applied = true;
                    r.coupon = Some(AppliedCoupon {
                        redemption_counted: false,
                        ..coupon
                    });
                }
            }
        }

        if self.record == before {
            return Ok(Activation {
                events: Vec::new(),
                redeemed_coupon,
            });
        }
        self.record.updated_at = at;

        let mut events = Vec::new();
        if previous_status != MembershipStatus::Active {
            events.push(MembershipEvent::Activated {
                membership_id: self.id(),
                user_id: self.user_id().clone(),
                previous_status,
                expiry_date: confirmation.period_end,
                occurred_at: at,
            });
        }
        events.push(MembershipEvent::PaymentSucceeded {
            membership_id: self.id(),
            user_id: self.user_id().clone(),
            amount_minor: confirmation.amount_paid_minor,
            currency: confirmation.currency,
            invoice_id: self.record.invoice.as_ref().map(|i| i.id.clone()),
            occurred_at: at,
        });
        if let (true, Some(coupon)) = (newly_applied, self.record.coupon.as_ref()) {
            events.push(MembershipEvent::CouponApplied {
                membership_id: self.id(),
                user_id: self.user_id().clone(),
                coupon_id: coupon.coupon_id,
                code: coupon.code.clone(),
                occurred_at: at,
            });
        }

        Ok(Activation {
            events,
            redeemed_coupon,
        })
    }

    fn already_paid(&self, invoice: Option<&InvoiceSnapshot>) -> bool {
        let r = &self.record;
        match (invoice, r.invoice.as_ref()) {
            (Some(incoming), Some(current)) => {
                incoming.id == current.id
                    && r.status == MembershipStatus::Active
                    && r.payment.status == PaymentStatus::Paid
            }
            _ => false,
        }
    }

    /// Marks the attached coupon's redemption as counted.
    ///
    /// Returns false when `coupon_id` is not the attached coupon or was
    /// already counted.
    pub fn settle_coupon_redemption(&mut self, coupon_id: CouponId) -> bool {
        match self.record.coupon.as_mut() {
            Some(coupon) if coupon.coupon_id == coupon_id && !coupon.redemption_counted => {
                coupon.redemption_counted = true;
                true
            }
            _ => false,
        }
    }

    /// Records a failed payment and escalates to past due at the threshold.
    ///
    /// A failure at or before the last recorded one is a redelivery and is
    /// ignored.
    pub fn record_payment_failure(&mut self, failure: PaymentFailure) -> Vec<MembershipEvent> {
        if let Some(last) = self.record.failure.last_failed_at {
            if !failure.failed_at.is_after(&last) {
                return Vec::new();
            }
        }

        let at = failure.failed_at;
        let r = &mut self.record;
        r.failure.failure_count += 1;
        r.failure.reason = failure.reason.clone();
        r.failure.code = failure.code;
        r.failure.last_failed_at = Some(at);
        r.payment.status = PaymentStatus::Failed;
        if failure.invoice.is_some() {
            r.invoice = failure.invoice;
        }
        r.updated_at = at;

        let mut events = vec![MembershipEvent::PaymentFailed {
            membership_id: self.id(),
            user_id: self.user_id().clone(),
            failure_count: self.failure_count(),
            reason: failure.reason,
            occurred_at: at,
        }];

        if self.failure_count() >= FAILURE_ESCALATION_THRESHOLD
            && self.record.status == MembershipStatus::Active
        {
            events.push(self.change_status(MembershipStatus::PastDue, "payment_failures", None, at));
        }

        events
    }

    /// Folds a provider subscription update into local state.
    pub fn sync_provider_status(
        &mut self,
        update: ProviderSubscriptionUpdate,
    ) -> Result<Vec<MembershipEvent>, MembershipError> {
        let before = self.record.clone();
        let at = update.observed_at;

        if let Some(start) = update.period_start {
            self.record.start_date = Some(start);
        }
        if let Some(end) = update.period_end {
            self.record.expiry_date = Some(end);
        }
        if !self.is_archived() {
            self.record.cancel_at_period_end = update.cancel_at_period_end;
            self.record.auto_renew = !update.cancel_at_period_end;
        }
        self.record.next_billing_date = if self.record.auto_renew {
            self.record.expiry_date
        } else {
            None
        };

        let status = self.record.status;
        let events = match update.status {
            ProviderSubscriptionStatus::PastDue if status == MembershipStatus::Active => {
                vec![self.change_status(MembershipStatus::PastDue, "provider_past_due", None, at)]
            }
            ProviderSubscriptionStatus::IncompleteExpired if status == MembershipStatus::Pending => {
                vec![self.change_status(MembershipStatus::Failed, "provider_incomplete_expired", None, at)]
            }
            ProviderSubscriptionStatus::Canceled => self.cancel(at),
            _ => Vec::new(),
        };

        if self.record != before {
            self.record.updated_at = at;
        }
        Ok(events)
    }

    /// Subscription deleted upstream. Already canceled or expired is a no-op.
    pub fn cancel(&mut self, at: Timestamp) -> Vec<MembershipEvent> {
        let previous_status = self.record.status;
        if !previous_status.can_transition_to(&MembershipStatus::Canceled) {
            return Vec::new();
        }
        self.record.status = MembershipStatus::Canceled;
        self.record.auto_renew = false;
        self.record.next_billing_date = None;
        self.record.updated_at = at;
        vec![MembershipEvent::Canceled {
            membership_id: self.id(),
            user_id: self.user_id().clone(),
            previous_status,
            occurred_at: at,
        }]
    }

    /// Marks the last payment refunded. Status and access are unchanged.
    pub fn record_refund(
        &mut self,
        charge_id: String,
        amount_minor: i64,
        currency: String,
        at: Timestamp,
    ) -> Vec<MembershipEvent> {
        let p = &self.record.payment;
        if p.status == PaymentStatus::Refunded
            && p.refunded_charge_id.as_deref() == Some(charge_id.as_str())
            && p.refunded_amount_minor == Some(amount_minor)
        {
            return Vec::new();
        }

        let p = &mut self.record.payment;
        p.status = PaymentStatus::Refunded;
        p.refunded_charge_id = Some(charge_id.clone());
        p.refunded_amount_minor = Some(amount_minor);
        self.record.updated_at = at;

        vec![MembershipEvent::PaymentRefunded {
            membership_id: self.id(),
            user_id: self.user_id().clone(),
            charge_id,
            amount_minor,
            currency,
            occurred_at: at,
        }]
    }

    // ────────────────────────────────────────────────────────────────────────
    // Administrative transitions
    // ────────────────────────────────────────────────────────────────────────

    pub fn place_hold(
        &mut self,
        actor: UserId,
        at: Timestamp,
    ) -> Result<Vec<MembershipEvent>, MembershipError> {
        self.ensure_transition(MembershipStatus::Hold, "hold")?;
        Ok(vec![self.change_status(MembershipStatus::Hold, "admin_hold", Some(actor), at)])
    }

    pub fn release_hold(
        &mut self,
        actor: UserId,
        at: Timestamp,
    ) -> Result<Vec<MembershipEvent>, MembershipError> {
        if self.record.status != MembershipStatus::Hold {
            return Err(MembershipError::invalid_state(self.record.status, "release"));
        }
        Ok(vec![self.change_status(MembershipStatus::Active, "admin_release", Some(actor), at)])
    }

    /// Manual expiry by an administrator.
    pub fn expire(
        &mut self,
        actor: UserId,
        at: Timestamp,
    ) -> Result<Vec<MembershipEvent>, MembershipError> {
        self.ensure_transition(MembershipStatus::Expired, "expire")?;
        let previous_status = self.record.status;
        self.record.status = MembershipStatus::Expired;
        self.record.expiry_date = Some(at);
        self.record.auto_renew = false;
        self.record.next_billing_date = None;
        self.record.updated_at = at;
        Ok(vec![MembershipEvent::Expired {
            membership_id: self.id(),
            user_id: self.user_id().clone(),
            previous_status,
            actor,
            occurred_at: at,
        }])
    }

    /// Pushes the expiry date forward by `days`.
    ///
    /// The one relative write on the aggregate; it is human-gated and never
    /// driven by a webhook.
    pub fn extend(
        &mut self,
        days: u32,
        actor: UserId,
        at: Timestamp,
    ) -> Result<Vec<MembershipEvent>, MembershipError> {
        if !(1..=MAX_EXTENSION_DAYS).contains(&days) {
            return Err(MembershipError::validation(
                "days",
                format!("must be between 1 and {}", MAX_EXTENSION_DAYS),
            ));
        }
        self.ensure_not_archived("extend")?;

        let base = self.record.expiry_date.unwrap_or(at);
        let expiry_date = base.add_days(i64::from(days));
        self.record.expiry_date = Some(expiry_date);
        if self.record.auto_renew {
            self.record.next_billing_date = Some(expiry_date);
        }
        self.record.updated_at = at;

        Ok(vec![MembershipEvent::Extended {
            membership_id: self.id(),
            user_id: self.user_id().clone(),
            days,
            expiry_date,
            actor,
            occurred_at: at,
        }])
    }

    /// Soft-deletes the membership.
    ///
    /// Active memberships need `force`; without it the caller gets a
    /// confirmation-required conflict. The upstream subscription must be
    /// canceled by the caller.
    pub fn archive(
        &mut self,
        actor: UserId,
        reason: Option<String>,
        force: bool,
        at: Timestamp,
    ) -> Result<Vec<MembershipEvent>, MembershipError> {
        if self.is_archived() {
            return Err(MembershipError::conflict("Membership is already archived"));
        }
        if self.record.status == MembershipStatus::Active && !force {
            return Err(MembershipError::requires_confirmation(
                "Membership is active; archiving cancels the subscription. Retry with forceArchive to confirm",
            ));
        }

        self.record.archive = ArchiveState {
            is_archived: true,
            archived_at: Some(at),
            archived_by: Some(actor.clone()),
            archived_reason: reason.clone(),
        };
        self.record.auto_renew = false;
        self.record.cancel_at_period_end = true;
        self.record.next_billing_date = None;
        self.record.updated_at = at;

        Ok(vec![MembershipEvent::Archived {
            membership_id: self.id(),
            user_id: self.user_id().clone(),
            actor,
            reason,
            occurred_at: at,
        }])
    }

    /// Lifts the archive flag. Renewal stays off: the upstream subscription
    /// was canceled when archiving.
    pub fn restore(
        &mut self,
        actor: UserId,
        at: Timestamp,
    ) -> Result<Vec<MembershipEvent>, MembershipError> {
        if !self.is_archived() {
            return Err(MembershipError::conflict("Membership is not archived"));
        }
        self.record.archive = ArchiveState::default();
        self.record.updated_at = at;
        Ok(vec![MembershipEvent::Restored {
            membership_id: self.id(),
            user_id: self.user_id().clone(),
            actor,
            occurred_at: at,
        }])
    }

    // ────────────────────────────────────────────────────────────────────────
    // Helpers
    // ────────────────────────────────────────────────────────────────────────

    fn ensure_not_archived(&self, attempted: &'static str) -> Result<(), MembershipError> {
        if self.is_archived() {
            return Err(MembershipError::validation(
                "membership",
                format!("Cannot {} an archived membership", attempted),
            ));
        }
        Ok(())
    }

    fn ensure_transition(
        &self,
        target: MembershipStatus,
        attempted: &'static str,
    ) -> Result<(), MembershipError> {
        self.ensure_not_archived(attempted)?;
        self.record
            .status
            .transition_to(target)
            .map(|_| ())
            .map_err(|_| MembershipError::invalid_state(self.record.status, attempted))
    }

    fn change_status(
        &mut self,
        to: MembershipStatus,
        reason: &str,
        actor: Option<UserId>,
        at: Timestamp,
    ) -> MembershipEvent {
        let from = self.record.status;
        self.record.status = to;
        self.record.updated_at = at;
        MembershipEvent::StatusChanged {
            membership_id: self.id(),
            user_id: self.user_id().clone(),
            from,
            to,
            reason: reason.to_string(),
            actor,
            occurred_at: at,
        }
    }
}
