//! HTTP handlers for membership endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequestParts, Json, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::adapters::http::middleware::RequireAuth;
use crate::application::handlers::membership::{
    CheckoutPricing, CheckoutSettings, CleanupOrphansCommand, CleanupOrphansHandler,
    CouponValidator, CreateCheckoutCommand, CreateCheckoutHandler, CreateCouponCommand,
    CreateCouponHandler, GetAuditHistoryHandler, GetAuditHistoryQuery, GetMembershipHandler,
    GetMembershipQuery, ListCouponsHandler, ListMembershipsHandler, ListMembershipsQuery,
    ManageMembershipCommand, ManageMembershipHandler, MembershipAction, PreviewCheckoutHandler,
    PreviewCheckoutQuery, ReconcileOutcome, ReconcileWebhookCommand, ReconcileWebhookHandler,
    TransitionCommitter,
};
use crate::domain::foundation::{MembershipId, UserId};
use crate::domain::membership::{MembershipError, StripeWebhookVerifier};
use crate::ports::{
    AuditLog, CouponRepository, EventPublisher, MembershipFilter, MembershipRepository,
    PaymentProvider, PlanCatalog, UserDirectory,
};

use super::dto::{
    ArchiveMembershipRequest, CheckoutRequest, CheckoutResponse, CleanupOrphansResponse,
    CouponView, CreateCouponRequest, ErrorResponse, ExtendMembershipRequest,
    ListMembershipsParams, MembershipView, PreviewResponse, WebhookAck,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned per request; handlers are built on demand from the shared ports.
#[derive(Clone)]
pub struct MembershipAppState {
    pub memberships: Arc<dyn MembershipRepository>,
    pub coupons: Arc<dyn CouponRepository>,
    pub plans: Arc<dyn PlanCatalog>,
    pub users: Arc<dyn UserDirectory>,
    pub audit_log: Arc<dyn AuditLog>,
    pub payment_provider: Arc<dyn PaymentProvider>,
    pub event_publisher: Arc<dyn EventPublisher>,
    pub webhook_verifier: StripeWebhookVerifier,
    pub checkout: CheckoutSettings,
}

impl MembershipAppState {
    fn committer(&self) -> Arc<TransitionCommitter> {
        Arc::new(TransitionCommitter::new(
            self.memberships.clone(),
            self.coupons.clone(),
            self.users.clone(),
            self.audit_log.clone(),
            self.event_publisher.clone(),
        ))
    }

    fn pricing(&self) -> Arc<CheckoutPricing> {
        Arc::new(CheckoutPricing::new(
            self.plans.clone(),
            CouponValidator::new(self.coupons.clone()),
        ))
    }

    pub fn get_membership_handler(&self) -> GetMembershipHandler {
        GetMembershipHandler::new(self.memberships.clone())
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
            self.payment_provider.clone(),
            self.committer(),
            self.checkout.clone(),
        )
    }

    pub fn webhook_handler(&self) -> ReconcileWebhookHandler {
        ReconcileWebhookHandler::new(
            self.webhook_verifier.clone(),
            self.memberships.clone(),
            self.payment_provider.clone(),
            self.audit_log.clone(),
            self.committer(),
            self.checkout.currency.clone(),
        )
    }

    pub fn manage_handler(&self) -> ManageMembershipHandler {
        ManageMembershipHandler::new(
            self.memberships.clone(),
            self.payment_provider.clone(),
            self.committer(),
        )
    }

    pub fn list_handler(&self) -> ListMembershipsHandler {
        ListMembershipsHandler::new(self.memberships.clone())
    }

    pub fn audit_history_handler(&self) -> GetAuditHistoryHandler {
        GetAuditHistoryHandler::new(self.memberships.clone(), self.audit_log.clone())
    }

    pub fn cleanup_handler(&self) -> CleanupOrphansHandler {
        CleanupOrphansHandler::new(
            self.memberships.clone(),
            self.users.clone(),
            self.audit_log.clone(),
        )
    }

    pub fn create_coupon_handler(&self) -> CreateCouponHandler {
        CreateCouponHandler::new(self.coupons.clone())
    }

    pub fn list_coupons_handler(&self) -> ListCouponsHandler {
        ListCouponsHandler::new(self.coupons.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Admin extractor
// ════════════════════════════════════════════════════════════════════════════════

/// An authenticated caller whose directory role may use the admin surface.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user_id: UserId,
}

#[async_trait]
impl FromRequestParts<MembershipAppState> for AdminUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &MembershipAppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let account = state
            .users
            .find(&user.user_id)
            .await
            .map_err(|e| ApiError::from(MembershipError::from(e)).into_response())?;

        match account {
            Some(account) if account.role.can_administer() => Ok(AdminUser {
                user_id: user.user_id,
            }),
            _ => {
                tracing::warn!(user_id = %user.user_id, "Admin endpoint refused");
                Err((
                    StatusCode::FORBIDDEN,
                    Json(ErrorResponse::new("FORBIDDEN", "Administrator role required")),
                )
                    .into_response())
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Member endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/membership - the caller's membership
pub async fn get_membership(
    State(state): State<MembershipAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let membership = state
        .get_membership_handler()
        .handle(GetMembershipQuery {
            user_id: user.user_id,
        })
        .await?;

    Ok(Json(MembershipView::from(&membership)))
}

/// POST /api/membership/checkout/preview - price a checkout without side effects
pub async fn preview_checkout(
    State(state): State<MembershipAppState>,
    RequireAuth(_user): RequireAuth,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let preview = state
        .preview_handler()
        .handle(PreviewCheckoutQuery {
            plan_id: request.plan_id,
            coupon_code: request.coupon_code,
        })
        .await?;

    Ok(Json(PreviewResponse::from(preview)))
}

/// POST /api/membership/checkout - start a hosted checkout session
pub async fn create_checkout(
    State(state): State<MembershipAppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .checkout_handler()
        .handle(CreateCheckoutCommand {
            user_id: user.user_id,
            plan_id: request.plan_id,
            coupon_code: request.coupon_code,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CheckoutResponse::from(result))))
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhooks/stripe
///
/// Only a failed signature check is answered with an error. Every verified
/// delivery is acknowledged, including ones whose processing failed, so the
/// provider does not retry into the same failure.
pub async fn handle_stripe_webhook(
    State(state): State<MembershipAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let outcome = state
        .webhook_handler()
        .handle(ReconcileWebhookCommand {
            payload: body.to_vec(),
            signature,
        })
        .await?;

    if let ReconcileOutcome::Failed { event_id, kind, .. } = &outcome {
        tracing::debug!(event_id = %event_id, event_type = kind, "Acknowledging failed webhook");
    }

    Ok(Json(WebhookAck { received: true }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Admin endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/admin/memberships
pub async fn list_memberships(
    State(state): State<MembershipAppState>,
    _admin: AdminUser,
    Query(params): Query<ListMembershipsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let memberships = state
        .list_handler()
        .handle(ListMembershipsQuery {
            filter: MembershipFilter {
                status: params.status,
                archived: params.archived,
            },
        })
        .await?;

    Ok(Json(
        memberships
            .iter()
            .map(MembershipView::from)
            .collect::<Vec<_>>(),
    ))
}

async fn manage(
    state: &MembershipAppState,
    admin: AdminUser,
    membership_id: MembershipId,
    action: MembershipAction,
) -> Result<Json<MembershipView>, ApiError> {
    let membership = state
        .manage_handler()
        .handle(ManageMembershipCommand {
            membership_id,
            actor: admin.user_id,
            action,
        })
        .await?;

    Ok(Json(MembershipView::from(&membership)))
}

/// POST /api/admin/memberships/{id}/hold
pub async fn hold_membership(
    State(state): State<MembershipAppState>,
    admin: AdminUser,
    Path(id): Path<MembershipId>,
) -> Result<impl IntoResponse, ApiError> {
    manage(&state, admin, id, MembershipAction::Hold).await
}

/// POST /api/admin/memberships/{id}/release
pub async fn release_membership(
    State(state): State<MembershipAppState>,
    admin: AdminUser,
    Path(id): Path<MembershipId>,
) -> Result<impl IntoResponse, ApiError> {
    manage(&state, admin, id, MembershipAction::Release).await
}

/// POST /api/admin/memberships/{id}/expire
pub async fn expire_membership(
    State(state): State<MembershipAppState>,
    admin: AdminUser,
    Path(id): Path<MembershipId>,
) -> Result<impl IntoResponse, ApiError> {
    manage(&state, admin, id, MembershipAction::Expire).await
}

/// POST /api/admin/memberships/{id}/extend
pub async fn extend_membership(
    State(state): State<MembershipAppState>,
    admin: AdminUser,
    Path(id): Path<MembershipId>,
    Json(request): Json<ExtendMembershipRequest>,
) -> Result<impl IntoResponse, ApiError> {
    manage(&state, admin, id, MembershipAction::Extend { days: request.days }).await
}

/// POST /api/admin/memberships/{id}/archive
///
/// An entitled membership answers 409 with `requiresConfirmation` until the
/// request is repeated with `forceArchive`.
pub async fn archive_membership(
    State(state): State<MembershipAppState>,
    admin: AdminUser,
    Path(id): Path<MembershipId>,
    request: Option<Json<ArchiveMembershipRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let action = MembershipAction::Archive {
        reason: request.reason,
        force: request.force_archive,
    };
    manage(&state, admin, id, action).await
}

/// POST /api/admin/memberships/{id}/restore
pub async fn restore_membership(
    State(state): State<MembershipAppState>,
    admin: AdminUser,
    Path(id): Path<MembershipId>,
) -> Result<impl IntoResponse, ApiError> {
    manage(&state, admin, id, MembershipAction::Restore).await
}

/// GET /api/admin/memberships/{id}/audit
pub async fn get_audit_history(
    State(state): State<MembershipAppState>,
    _admin: AdminUser,
    Path(id): Path<MembershipId>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state
        .audit_history_handler()
        .handle(GetAuditHistoryQuery { membership_id: id })
        .await?;

    Ok(Json(entries))
}

/// POST /api/admin/memberships/cleanup-orphans
pub async fn cleanup_orphans(
    State(state): State<MembershipAppState>,
    admin: AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .cleanup_handler()
        .handle(CleanupOrphansCommand {
            actor: admin.user_id,
        })
        .await?;

    Ok(Json(CleanupOrphansResponse::from(result)))
}

/// GET /api/admin/coupons
pub async fn list_coupons(
    State(state): State<MembershipAppState>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let coupons = state.list_coupons_handler().handle().await?;
    Ok(Json(
        coupons.into_iter().map(CouponView::from).collect::<Vec<_>>(),
    ))
}

/// POST /api/admin/coupons
pub async fn create_coupon(
    State(state): State<MembershipAppState>,
    _admin: AdminUser,
    Json(request): Json<CreateCouponRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let coupon = state
        .create_coupon_handler()
        .handle(CreateCouponCommand {
            code: request.code,
            discount_type: request.discount_type,
            amount: request.amount,
            max_redemptions: request.max_redemptions,
            starts_at: request.starts_at,
            ends_at: request.ends_at,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CouponView::from(coupon))))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts membership errors to HTTP responses.
#[derive(Debug)]
pub struct ApiError(MembershipError);

impl From<MembershipError> for ApiError {
    fn from(err: MembershipError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            MembershipError::Validation { .. }
            | MembershipError::CouponRejected(_)
            | MembershipError::InvalidWebhookSignature(_) => StatusCode::BAD_REQUEST,
            MembershipError::NotFound { .. } => StatusCode::NOT_FOUND,
            MembershipError::Conflict { .. } | MembershipError::InvalidState { .. } => {
                StatusCode::CONFLICT
            }
            MembershipError::Provider(_) => StatusCode::BAD_GATEWAY,
            MembershipError::Configuration(_) | MembershipError::Infrastructure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "Request failed");
            "Internal server error".to_string()
        } else {
            self.0.to_string()
        };

        let body = ErrorResponse {
            code: self.0.code().to_string(),
            message,
            requires_confirmation: self.0.needs_confirmation().then_some(true),
        };
        (status, Json(body)).into_response()
    }
}
