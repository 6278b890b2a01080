//! ReconcileWebhookHandler - folds verified provider events into memberships.
//!
//! Only a verification failure is returned as an error. Once the signature
//! checks out, every outcome (applied, ignored or failed) is acknowledged so
//! the provider stops redelivering; failures go to the log and the audit
//! trail instead.

use std::sync::Arc;

use crate::domain::audit::{AuditContext, AuditLogEntry};
use crate::domain::billing::CheckoutMetadata;
use crate::domain::foundation::{MembershipId, Timestamp, UserId};
use crate::domain::membership::{
    AppliedCoupon, BillingEvent, ChargeObject, CheckoutSessionObject, InvoiceObject,
    InvoiceSnapshot, Membership, MembershipError, MembershipEvent, PaymentConfirmation,
    PaymentFailure, PriceBreakdown, ProviderSubscriptionStatus, ProviderSubscriptionUpdate,
    StripeEvent, StripeWebhookVerifier, SubscriptionObject, WebhookError,
};
use crate::ports::{AuditLog, MembershipRepository, PaymentProvider, Subscription};

use super::{TransitionCommitter, TransitionOutcome};

/// Raw webhook delivery.
#[derive(Debug, Clone)]
pub struct ReconcileWebhookCommand {
    /// Unparsed request body; the signature covers these exact bytes.
    pub payload: Vec<u8>,
    /// `Stripe-Signature` header value.
    pub signature: Option<String>,
}

/// What happened to a verified event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied {
        event_id: String,
        kind: &'static str,
        membership_id: MembershipId,
    },
    Ignored {
        event_id: String,
        kind: &'static str,
        reason: &'static str,
    },
    Failed {
        event_id: String,
        kind: &'static str,
        error: String,
    },
}

enum Dispatch {
    Applied(MembershipId),
    Ignored(&'static str),
}

pub struct ReconcileWebhookHandler {
    verifier: StripeWebhookVerifier,
    memberships: Arc<dyn MembershipRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
    audit_log: Arc<dyn AuditLog>,
    committer: Arc<TransitionCommitter>,
    default_currency: String,
}

impl ReconcileWebhookHandler {
    pub fn new(
        verifier: StripeWebhookVerifier,
        memberships: Arc<dyn MembershipRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
        audit_log: Arc<dyn AuditLog>,
        committer: Arc<TransitionCommitter>,
        default_currency: impl Into<String>,
    ) -> Self {
        Self {
            verifier,
            memberships,
            payment_provider,
            audit_log,
            committer,
            default_currency: default_currency.into(),
        }
    }

    pub async fn handle(
        &self,
        cmd: ReconcileWebhookCommand,
    ) -> Result<ReconcileOutcome, MembershipError> {
        let now = Timestamp::now();

        // 1. Verify; nothing is touched on failure
        let payload = cmd
            .signature
            .as_deref()
            .ok_or(WebhookError::MissingSignature)
            .and_then(|header| self.verifier.verify(&cmd.payload, header, now))
            .map_err(|e| {
                tracing::warn!(error = %e, "Rejected webhook delivery");
                MembershipError::InvalidWebhookSignature(e.to_string())
            })?;

        // 2. Parse; from here on the delivery is always acknowledged
        let event = match StripeEvent::from_payload(payload) {
            Ok(event) => event,
            Err(e) => return Ok(self.malformed(payload, e, now).await),
        };

        // 3. Dispatch
        let kind = BillingEvent::from_stripe(&event)
            .map(|billing| billing.kind())
            .unwrap_or("unparseable");
        tracing::info!(event_id = %event.id, event_type = %event.event_type, kind, "Webhook received");

        let outcome = match self.dispatch(&event, now).await {
            Ok(Dispatch::Applied(membership_id)) => {
                tracing::info!(
                    event_id = %event.id,
                    membership_id = %membership_id,
                    kind,
                    "Webhook applied"
                );
                ReconcileOutcome::Applied {
                    event_id: event.id.clone(),
                    kind,
                    membership_id,
                }
            }
            Ok(Dispatch::Ignored(reason)) => {
                tracing::info!(event_id = %event.id, event_type = %event.event_type, reason, "Webhook ignored");
                ReconcileOutcome::Ignored {
                    event_id: event.id.clone(),
                    kind,
                    reason,
                }
            }
            Err(e) => {
                self.record_failure(&event.id, &event.event_type, &e, now).await;
                ReconcileOutcome::Failed {
                    event_id: event.id.clone(),
                    kind,
                    error: e.to_string(),
                }
            }
        };
        Ok(outcome)
    }

    async fn dispatch(&self, event: &StripeEvent, now: Timestamp) -> Result<Dispatch, WebhookError> {
        let at = event.created_at(now);
        let audit = AuditContext {
            plan_id: None,
            external_event_id: Some(event.id.clone()),
        };

        match BillingEvent::from_stripe(event)? {
            BillingEvent::CheckoutCompleted(session) => {
                self.checkout_completed(session, audit, at).await
            }
            BillingEvent::InvoicePaid(invoice) => self.invoice_paid(invoice, audit, at).await,
            BillingEvent::InvoicePaymentFailed(invoice) => {
                self.invoice_payment_failed(invoice, audit, at).await
            }
            BillingEvent::SubscriptionUpdated(subscription) => {
                self.subscription_updated(subscription, audit, at).await
            }
            BillingEvent::SubscriptionDeleted(subscription) => {
                self.subscription_deleted(subscription, audit, at).await
            }
            BillingEvent::ChargeRefunded(charge) => self.charge_refunded(charge, audit, at).await,
            BillingEvent::Unknown(_) => Ok(Dispatch::Ignored("unhandled event type")),
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Branches
    // ────────────────────────────────────────────────────────────────────────

    async fn checkout_completed(
        &self,
        session: CheckoutSessionObject,
        audit: AuditContext,
        at: Timestamp,
    ) -> Result<Dispatch, WebhookError> {
        let metadata = CheckoutMetadata::from_map(&session.metadata)
            .map_err(|e| WebhookError::MissingMetadata(e.to_string()))?;
        let subscription_id = session
            .subscription
            .as_deref()
            .ok_or(WebhookError::MissingField("subscription"))?;
        let subscription = self
            .payment_provider
            .get_subscription(subscription_id)
            .await
            .map_err(MembershipError::from)?;

        let (mut membership, created) = self.find_or_create(&metadata.user_id, at).await?;

        let price = price_from(&metadata, session.amount_total.unwrap_or_default());
        let confirmation = PaymentConfirmation {
            plan_id: metadata.plan_id,
            customer_id: session.customer.clone().or_else(|| subscription.customer_id.clone()),
            amount_paid_minor: session.amount_total.unwrap_or_else(|| price.final_minor()),
            currency: self.currency(session.currency.as_deref()),
            invoice: None,
            ..self.confirmation_base(&subscription, &metadata, price, at)?
        };

        self.activate(&mut membership, created, confirmation, audit).await
    }

    async fn invoice_paid(
        &self,
        invoice: InvoiceObject,
        audit: AuditContext,
        at: Timestamp,
    ) -> Result<Dispatch, WebhookError> {
        let Some(subscription_id) = invoice.subscription_id() else {
            return Ok(Dispatch::Ignored("invoice has no subscription"));
        };
        let subscription = self
            .payment_provider
            .get_subscription(subscription_id)
            .await
            .map_err(MembershipError::from)?;

        let metadata = CheckoutMetadata::from_map(&subscription.metadata).ok();
        let (mut membership, created) = match self
            .memberships
            .find_by_stripe_subscription_id(subscription_id)
            .await
            .map_err(MembershipError::from)?
        {
            Some(existing) => (existing, None),
            None => {
                let metadata = metadata
                    .as_ref()
                    .ok_or_else(|| WebhookError::MembershipNotFound(subscription_id.to_string()))?;
                self.find_or_create(&metadata.user_id, at).await?
            }
        };

        let price = match &metadata {
            Some(metadata) => price_from(metadata, invoice.amount_paid),
            None => PriceBreakdown::full(invoice.amount_paid),
        };
        let metadata = metadata.unwrap_or_else(|| CheckoutMetadata {
            user_id: membership.user_id().clone(),
            plan_id: None,
            coupon: None,
        });
        let confirmation = PaymentConfirmation {
            customer_id: invoice.customer.clone().or_else(|| subscription.customer_id.clone()),
            amount_paid_minor: invoice.amount_paid,
            currency: self.currency(invoice.currency.as_deref()),
            invoice: Some(invoice_snapshot(&invoice)),
            ..self.confirmation_base(&subscription, &metadata, price, at)?
        };

        self.activate(&mut membership, created, confirmation, audit).await
    }

    async fn invoice_payment_failed(
        &self,
        invoice: InvoiceObject,
        audit: AuditContext,
        at: Timestamp,
    ) -> Result<Dispatch, WebhookError> {
        let mut membership = match invoice.subscription_id() {
            Some(subscription_id) => self
                .memberships
                .find_by_stripe_subscription_id(subscription_id)
                .await
                .map_err(MembershipError::from)?,
            None => None,
        };
        if membership.is_none() {
            if let Some(customer_id) = invoice.customer.as_deref() {
                membership = self
                    .memberships
                    .find_by_stripe_customer_id(customer_id)
                    .await
                    .map_err(MembershipError::from)?;
            }
        }
        let mut membership = membership.ok_or_else(|| {
            WebhookError::MembershipNotFound(
                invoice
                    .subscription_id()
                    .or(invoice.customer.as_deref())
                    .unwrap_or(invoice.id.as_str())
                    .to_string(),
            )
        })?;

        let error = invoice.last_finalization_error.as_ref();
        let events = membership.record_payment_failure(PaymentFailure {
            reason: error.and_then(|e| e.message.clone()),
            code: error.and_then(|e| e.code.clone()),
            invoice: Some(invoice_snapshot(&invoice)),
            failed_at: at,
        });

        tracing::info!(
            membership_id = %membership.id(),
            failure_count = membership.failure_count(),
            status = %membership.status(),
            "Payment failure recorded"
        );
        self.commit(&membership, events, audit).await
    }

    async fn subscription_updated(
        &self,
        object: SubscriptionObject,
        audit: AuditContext,
        at: Timestamp,
    ) -> Result<Dispatch, WebhookError> {
        let Some(mut membership) = self.find_for_subscription(&object).await? else {
            return Ok(Dispatch::Ignored("no membership for subscription"));
        };
        let subscription = self
            .payment_provider
            .get_subscription(&object.id)
            .await
            .map_err(MembershipError::from)?;

        let events = membership.sync_provider_status(ProviderSubscriptionUpdate {
            status: ProviderSubscriptionStatus::from_provider(&subscription.status),
            period_start: subscription.current_period_start.and_then(Timestamp::from_unix_secs),
            period_end: subscription.current_period_end.and_then(Timestamp::from_unix_secs),
            cancel_at_period_end: subscription.cancel_at_period_end,
            observed_at: at,
        })?;

        self.commit(&membership, events, audit).await
    }

    async fn subscription_deleted(
        &self,
        object: SubscriptionObject,
        audit: AuditContext,
        at: Timestamp,
    ) -> Result<Dispatch, WebhookError> {
        let Some(mut membership) = self.find_for_subscription(&object).await? else {
            return Ok(Dispatch::Ignored("no membership for subscription"));
        };
        let events = membership.cancel(at);
        self.commit(&membership, events, audit).await
    }

    async fn charge_refunded(
        &self,
        charge: ChargeObject,
        audit: AuditContext,
        at: Timestamp,
    ) -> Result<Dispatch, WebhookError> {
        let Some(customer_id) = charge.customer.as_deref() else {
            return Ok(Dispatch::Ignored("charge has no customer"));
        };
        let Some(mut membership) = self
            .memberships
            .find_by_stripe_customer_id(customer_id)
            .await
            .map_err(MembershipError::from)?
        else {
            return Ok(Dispatch::Ignored("no membership for customer"));
        };

        let events = membership.record_refund(
            charge.id.clone(),
            charge.amount_refunded,
            self.currency(charge.currency.as_deref()),
            at,
        );
        self.commit(&membership, events, audit).await
    }

    // ────────────────────────────────────────────────────────────────────────
    // Helpers
    // ────────────────────────────────────────────────────────────────────────

    /// The user's membership, or a new pending one with its creation event.
    async fn find_or_create(
        &self,
        user_id: &UserId,
        at: Timestamp,
    ) -> Result<(Membership, Option<MembershipEvent>), WebhookError> {
        match self
            .memberships
            .find_by_user_id(user_id)
            .await
            .map_err(MembershipError::from)?
        {
            Some(existing) => Ok((existing, None)),
            None => {
                tracing::warn!(user_id = %user_id, "Payment confirmed without a membership; creating one");
                let (membership, created) = Membership::create_pending(user_id.clone(), None, at);
                Ok((membership, Some(created)))
            }
        }
    }

    /// Looks up by subscription id, then by the `userId` the subscription
    /// carries in its metadata.
    async fn find_for_subscription(
        &self,
        object: &SubscriptionObject,
    ) -> Result<Option<Membership>, WebhookError> {
        if let Some(found) = self
            .memberships
            .find_by_stripe_subscription_id(&object.id)
            .await
            .map_err(MembershipError::from)?
        {
            return Ok(Some(found));
        }
        match CheckoutMetadata::from_map(&object.metadata) {
            Ok(metadata) => Ok(self
                .memberships
                .find_by_user_id(&metadata.user_id)
                .await
                .map_err(MembershipError::from)?),
            Err(_) => Ok(None),
        }
    }

    fn confirmation_base(
        &self,
        subscription: &Subscription,
        metadata: &CheckoutMetadata,
        price: PriceBreakdown,
        at: Timestamp,
    ) -> Result<PaymentConfirmation, WebhookError> {
        let period_start = subscription
            .current_period_start
            .and_then(Timestamp::from_unix_secs)
            .ok_or(WebhookError::MissingField("current_period_start"))?;
        let period_end = subscription
            .current_period_end
            .and_then(Timestamp::from_unix_secs)
            .ok_or(WebhookError::MissingField("current_period_end"))?;

        Ok(PaymentConfirmation {
            plan_id: metadata.plan_id,
            period_start,
            period_end,
            cancel_at_period_end: subscription.cancel_at_period_end,
            customer_id: subscription.customer_id.clone(),
            subscription_id: Some(subscription.id.clone()),
            price_id: subscription.price_id.clone(),
            amount_paid_minor: price.final_minor(),
            currency: self.default_currency.clone(),
            price,
            card: subscription.card.clone(),
            invoice: None,
            coupon: metadata.coupon.as_ref().map(|c| AppliedCoupon {
                coupon_id: c.coupon_id,
                code: c.code.clone(),
                discount_type: c.discount_type,
                amount: c.amount,
                applied_at: at,
                redemption_counted: false,
            }),
            confirmed_at: at,
        })
    }

    async fn activate(
        &self,
        membership: &mut Membership,
        created: Option<MembershipEvent>,
        confirmation: PaymentConfirmation,
        audit: AuditContext,
    ) -> Result<Dispatch, WebhookError> {
        let activation = membership.confirm_payment(confirmation)?;

        let is_new = created.is_some();
        let mut events: Vec<MembershipEvent> = created.into_iter().collect();
        events.extend(activation.events);

        let mut outcome = TransitionOutcome::new(events)
            .with_redeemed_coupon(activation.redeemed_coupon)
            .with_audit(AuditContext {
                plan_id: membership.record().plan_id,
                ..audit
            });
        outcome.is_new = is_new;

        self.committer.commit(membership, outcome).await?;
        Ok(Dispatch::Applied(membership.id()))
    }

    async fn commit(
        &self,
        membership: &Membership,
        events: Vec<MembershipEvent>,
        audit: AuditContext,
    ) -> Result<Dispatch, WebhookError> {
        let outcome = TransitionOutcome::new(events).with_audit(AuditContext {
            plan_id: membership.record().plan_id,
            ..audit
        });
        self.committer.commit(membership, outcome).await?;
        Ok(Dispatch::Applied(membership.id()))
    }

    fn currency(&self, reported: Option<&str>) -> String {
        reported
            .map(str::to_lowercase)
            .unwrap_or_else(|| self.default_currency.clone())
    }

    /// A signed body that is not an event. Whatever id and type can be read
    /// from it go into the audit entry.
    async fn malformed(
        &self,
        payload: &[u8],
        error: WebhookError,
        now: Timestamp,
    ) -> ReconcileOutcome {
        let envelope: serde_json::Value = serde_json::from_slice(payload).unwrap_or_default();
        let event_id = envelope["id"].as_str().unwrap_or("unknown").to_string();
        let event_type = envelope["type"].as_str().unwrap_or("unknown");

        self.record_failure(&event_id, event_type, &error, now).await;
        ReconcileOutcome::Failed {
            event_id,
            kind: "unparseable",
            error: error.to_string(),
        }
    }

    async fn record_failure(
        &self,
        event_id: &str,
        event_type: &str,
        error: &WebhookError,
        now: Timestamp,
    ) {
        tracing::error!(event_id, event_type, error = %error, "Webhook processing failed");
        let entry = AuditLogEntry::webhook_failure(event_id, event_type, &error.to_string(), now);
        if let Err(e) = self.audit_log.append(&entry).await {
            tracing::error!(event_id, error = %e, "Failed to audit webhook failure");
        }
    }
}

/// Price snapshot from checkout metadata, or the paid amount at full price.
fn price_from(metadata: &CheckoutMetadata, paid_minor: i64) -> PriceBreakdown {
    match &metadata.coupon {
        Some(coupon) => PriceBreakdown::new(
            coupon.original_minor,
            coupon.original_minor - coupon.discounted_minor,
        ),
        None => PriceBreakdown::full(paid_minor),
    }
}

fn invoice_snapshot(invoice: &InvoiceObject) -> InvoiceSnapshot {
    InvoiceSnapshot {
        id: invoice.id.clone(),
        url: invoice.hosted_invoice_url.clone(),
        pdf: invoice.invoice_pdf.clone(),
        number: invoice.number.clone(),
    }
}
