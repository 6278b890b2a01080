//! Membership domain module.
//!
//! Subscription lifecycle, payment failure escalation and provider webhook
//! parsing.
//!
//! # Module Structure
//!
//! - `aggregate` - Membership aggregate and its named transitions
//! - `status` - MembershipStatus state machine
//! - `events` - events returned by transitions
//! - `stripe_event` - provider event envelope and the closed `BillingEvent` set
//! - `webhook_verifier` - signature verification over the raw body

mod aggregate;
mod errors;
mod events;
mod status;
mod stripe_event;
mod webhook_errors;
mod webhook_verifier;

pub use aggregate::{
    Activation, AppliedCoupon, ArchiveState, CardDetails, FailureSnapshot, InvoiceSnapshot,
    Membership, MembershipRecord, PaymentConfirmation, PaymentFailure, PaymentSnapshot,
    PaymentStatus, PriceBreakdown, ProviderSubscriptionStatus, ProviderSubscriptionUpdate,
    FAILURE_ESCALATION_THRESHOLD, MAX_EXTENSION_DAYS,
};
pub use errors::MembershipError;
pub use events::MembershipEvent;
pub use status::MembershipStatus;
pub use stripe_event::{
    BillingEvent, ChargeObject, CheckoutSessionObject, InvoiceObject, StripeErrorObject,
    StripeEvent, StripeEventData, SubscriptionObject,
};
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{SignatureHeader, StripeWebhookVerifier, DEFAULT_TOLERANCE_SECS};

#[cfg(test)]
pub use stripe_event::StripeEventBuilder;
#[cfg(test)]
pub use webhook_verifier::compute_test_signature;
