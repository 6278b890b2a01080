//! Membership handlers.
//!
//! Command and query handlers for the membership billing lifecycle. Every
//! handler that changes a membership finishes through `TransitionCommitter`.
//!
//! ## Commands
//! - Creating checkout sessions (with optional coupon)
//! - Reconciling provider webhooks
//! - Administrative transitions (hold, release, expire, extend, archive, restore)
//! - Orphan cleanup
//! - Coupon creation
//!
//! ## Queries
//! - Coupon validation and checkout preview
//! - Get membership details
//! - Admin listing and audit history

mod cleanup_orphans;
mod create_checkout;
mod get_audit_history;
mod get_membership;
mod list_memberships;
mod manage_coupons;
mod manage_membership;
mod preview_checkout;
mod reconcile_webhook;
mod transition_committer;
mod validate_coupon;

#[cfg(test)]
mod test_support;

// Shared
pub use transition_committer::{TransitionCommitter, TransitionOutcome};
pub use validate_coupon::CouponValidator;

// Commands
pub use cleanup_orphans::{CleanupOrphansCommand, CleanupOrphansHandler, CleanupOrphansResult};
pub use create_checkout::{
    CheckoutSettings, CreateCheckoutCommand, CreateCheckoutHandler, CreateCheckoutResult,
};
pub use manage_coupons::{CreateCouponCommand, CreateCouponHandler, ListCouponsHandler};
pub use manage_membership::{ManageMembershipCommand, ManageMembershipHandler, MembershipAction};
pub use reconcile_webhook::{ReconcileOutcome, ReconcileWebhookCommand, ReconcileWebhookHandler};

// Queries
pub use get_audit_history::{GetAuditHistoryHandler, GetAuditHistoryQuery};
pub use get_membership::{GetMembershipHandler, GetMembershipQuery};
pub use list_memberships::{ListMembershipsHandler, ListMembershipsQuery};
pub use preview_checkout::{
    CheckoutPreview, CheckoutPricing, PreviewCheckoutHandler, PreviewCheckoutQuery, PricedCheckout,
};
