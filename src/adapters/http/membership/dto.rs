//! HTTP DTOs for membership endpoints.
//!
//! JSON field names are camelCase and money is in minor units. Domain types
//! that already serialize in that shape (`AuditLogEntry`) are returned as
//! they are.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::handlers::membership::{
    CheckoutPreview, CleanupOrphansResult, CreateCheckoutResult,
};
use crate::domain::billing::{Coupon, CouponQuote, DiscountType};
use crate::domain::foundation::{CouponId, MembershipId, PlanId, Timestamp, UserId};
use crate::domain::membership::{
    AppliedCoupon, InvoiceSnapshot, Membership, MembershipStatus, PaymentSnapshot,
};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Body of both checkout and checkout preview.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub plan_id: PlanId,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

/// Query string of the admin membership listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMembershipsParams {
    pub status: Option<MembershipStatus>,
    pub archived: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtendMembershipRequest {
    pub days: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveMembershipRequest {
    #[serde(default)]
    pub reason: Option<String>,
    /// Archive an entitled membership anyway.
    #[serde(default)]
    pub force_archive: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCouponRequest {
    pub code: String,
    pub discount_type: DiscountType,
    pub amount: Decimal,
    #[serde(default)]
    pub max_redemptions: Option<u32>,
    #[serde(default)]
    pub starts_at: Option<Timestamp>,
    #[serde(default)]
    pub ends_at: Option<Timestamp>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Membership as shown to its owner and to admins.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipView {
    pub id: MembershipId,
    pub user_id: UserId,
    pub plan_id: Option<PlanId>,
    pub status: MembershipStatus,
    pub has_access: bool,
    pub start_date: Option<Timestamp>,
    pub expiry_date: Option<Timestamp>,
    pub next_billing_date: Option<Timestamp>,
    pub auto_renew: bool,
    pub cancel_at_period_end: bool,
    pub coupon: Option<AppliedCoupon>,
    pub payment: PaymentSnapshot,
    pub invoice: Option<InvoiceSnapshot>,
    pub failure_count: u32,
    pub is_archived: bool,
    pub archived_at: Option<Timestamp>,
    pub archived_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&Membership> for MembershipView {
    fn from(membership: &Membership) -> Self {
        let r = membership.record();
        Self {
            id: r.id,
            user_id: r.user_id.clone(),
            plan_id: r.plan_id,
            status: r.status,
            has_access: membership.has_access(),
            start_date: r.start_date,
            expiry_date: r.expiry_date,
            next_billing_date: r.next_billing_date,
            auto_renew: r.auto_renew,
            cancel_at_period_end: r.cancel_at_period_end,
            coupon: r.coupon.clone(),
            payment: r.payment.clone(),
            invoice: r.invoice.clone(),
            failure_count: r.failure.failure_count,
            is_archived: r.archive.is_archived,
            archived_at: r.archive.archived_at,
            archived_reason: r.archive.archived_reason.clone(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub redirect_url: String,
    pub amount_due_minor: i64,
}

impl From<CreateCheckoutResult> for CheckoutResponse {
    fn from(result: CreateCheckoutResult) -> Self {
        Self {
            session_id: result.session.id,
            redirect_url: result.session.url,
            amount_due_minor: result.amount_due_minor,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub original_price: i64,
    pub discounted_price: i64,
    pub is_free: bool,
    pub coupon: Option<CouponQuote>,
}

impl From<CheckoutPreview> for PreviewResponse {
    fn from(preview: CheckoutPreview) -> Self {
        Self {
            original_price: preview.original_minor,
            discounted_price: preview.discounted_minor,
            is_free: preview.is_free,
            coupon: preview.coupon,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponView {
    pub id: CouponId,
    pub code: String,
    pub discount_type: DiscountType,
    pub amount: Decimal,
    pub max_redemptions: Option<u32>,
    pub used_count: u32,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
    pub is_active: bool,
    pub created_at: Timestamp,
}

impl From<Coupon> for CouponView {
    fn from(coupon: Coupon) -> Self {
        Self {
            id: coupon.id,
            code: coupon.code,
            discount_type: coupon.discount_type,
            amount: coupon.amount,
            max_redemptions: coupon.max_redemptions,
            used_count: coupon.used_count,
            starts_at: coupon.starts_at,
            ends_at: coupon.ends_at,
            is_active: coupon.is_active,
            created_at: coupon.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupOrphansResponse {
    pub scanned: usize,
    pub removed: Vec<MembershipId>,
}

impl From<CleanupOrphansResult> for CleanupOrphansResponse {
    fn from(result: CleanupOrphansResult) -> Self {
        Self {
            scanned: result.scanned,
            removed: result.removed,
        }
    }
}

/// Webhook acknowledgment. Sent for every verified delivery.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Error body shared by every endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_confirmation: Option<bool>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            requires_confirmation: None,
        }
    }
}
