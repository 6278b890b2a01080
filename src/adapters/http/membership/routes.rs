//! Axum router configuration for membership endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    archive_membership, cleanup_orphans, create_checkout, create_coupon, expire_membership,
    extend_membership, get_audit_history, get_membership, handle_stripe_webhook, hold_membership,
    list_coupons, list_memberships, preview_checkout, release_membership, restore_membership,
    MembershipAppState,
};

/// Member endpoints (require authentication).
///
/// - `GET /` - the caller's membership
/// - `POST /checkout` - start a checkout session
/// - `POST /checkout/preview` - price a checkout
pub fn membership_routes() -> Router<MembershipAppState> {
    Router::new()
        .route("/", get(get_membership))
        .route("/checkout", post(create_checkout))
        .route("/checkout/preview", post(preview_checkout))
}

/// Admin endpoints (require a manager or admin role).
pub fn admin_routes() -> Router<MembershipAppState> {
    Router::new()
        .route("/memberships", get(list_memberships))
        .route("/memberships/cleanup-orphans", post(cleanup_orphans))
        .route("/memberships/:id/hold", post(hold_membership))
        .route("/memberships/:id/release", post(release_membership))
        .route("/memberships/:id/expire", post(expire_membership))
        .route("/memberships/:id/extend", post(extend_membership))
        .route("/memberships/:id/archive", post(archive_membership))
        .route("/memberships/:id/restore", post(restore_membership))
        .route("/memberships/:id/audit", get(get_audit_history))
        .route("/coupons", get(list_coupons).post(create_coupon))
}

/// Provider webhooks. No user auth; the signature is the credential.
pub fn webhook_routes() -> Router<MembershipAppState> {
    Router::new().route("/stripe", post(handle_stripe_webhook))
}

/// Every membership route, for mounting under `/api`.
pub fn membership_router() -> Router<MembershipAppState> {
    Router::new()
        .nest("/membership", membership_routes())
        .nest("/admin", admin_routes())
        .nest("/webhooks", webhook_routes())
}
