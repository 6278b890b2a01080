//! Integration tests for the membership HTTP surface.
//!
//! Drives the full axum router with `tower::ServiceExt::oneshot` over the
//! in-memory stores and the mock payment provider:
//! 1. Webhook signature rejection and acknowledgment
//! 2. Preview and checkout, then activation through a signed webhook
//! 3. Authentication and admin authorization

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use hmac::{Hmac, Mac};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{json, Value};
use sha2::Sha256;
use tower::ServiceExt;

use membership_billing::adapters::events::InMemoryEventBus;
use membership_billing::adapters::http::middleware::Claims;
use membership_billing::adapters::http::{app_router, JwtAuthenticator, MembershipAppState};
use membership_billing::adapters::memory::{
    InMemoryAuditLog, InMemoryCouponRepository, InMemoryMembershipRepository, InMemoryPlanCatalog,
    InMemoryUserDirectory,
};
use membership_billing::adapters::stripe::MockPaymentProvider;
use membership_billing::application::handlers::membership::CheckoutSettings;
use membership_billing::domain::access::UserRole;
use membership_billing::domain::billing::{BillingInterval, Coupon, DiscountType, Plan};
use membership_billing::domain::foundation::UserId;
use membership_billing::domain::membership::StripeWebhookVerifier;
use membership_billing::ports::{CouponRepository, Subscription};

const JWT_SECRET: &str = "integration-test-secret-0123456789";
const WEBHOOK_SECRET: &str = "whsec_integration";

// =============================================================================
// Test Infrastructure
// =============================================================================

struct TestApp {
    router: Router,
    memberships: Arc<InMemoryMembershipRepository>,
    coupons: Arc<InMemoryCouponRepository>,
    plans: Arc<InMemoryPlanCatalog>,
    users: Arc<InMemoryUserDirectory>,
    provider: MockPaymentProvider,
}

impl TestApp {
    fn new() -> Self {
        let memberships = Arc::new(InMemoryMembershipRepository::new());
        let coupons = Arc::new(InMemoryCouponRepository::new());
        let plans = Arc::new(InMemoryPlanCatalog::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        let provider = MockPaymentProvider::new();

        let state = MembershipAppState {
            memberships: memberships.clone(),
            coupons: coupons.clone(),
            plans: plans.clone(),
            users: users.clone(),
            audit_log: Arc::new(InMemoryAuditLog::new()),
            payment_provider: Arc::new(provider.clone()),
            event_publisher: Arc::new(InMemoryEventBus::new()),
            webhook_verifier: StripeWebhookVerifier::new(WEBHOOK_SECRET),
            checkout: CheckoutSettings {
                currency: "usd".into(),
                success_url: "https://app.test/membership/success".into(),
                cancel_url: "https://app.test/membership".into(),
            },
        };
        let authenticator = Arc::new(JwtAuthenticator::new(
            &SecretString::new(JWT_SECRET.to_string()),
            None,
            None,
        ));

        Self {
            router: app_router(state, authenticator),
            memberships,
            coupons,
            plans,
            users,
            provider,
        }
    }

    async fn add_user(&self, id: &str, role: UserRole) -> UserId {
        let user_id = UserId::new(id).unwrap();
        self.users
            .insert(user_id.clone(), &format!("{id}@example.com"), role)
            .await;
        user_id
    }

    async fn add_plan(&self, dollars: i64) -> Plan {
        let plan = Plan::new("Annual Membership", Decimal::from(dollars), BillingInterval::Year);
        self.plans.insert(plan.clone()).await;
        plan
    }

    async fn add_coupon(&self, code: &str, discount_type: DiscountType, amount: i64) {
        let coupon =
            Coupon::create(code, discount_type, Decimal::from(amount), None, None, None).unwrap();
        self.coupons.save(&coupon).await.unwrap();
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, path: &str, user: Option<&str>) -> (StatusCode, Value) {
        self.send(request(Method::GET, path, user, None)).await
    }

    async fn post(&self, path: &str, user: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(request(Method::POST, path, user, Some(body))).await
    }

    async fn webhook(&self, payload: &str, signature: Option<String>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/webhooks/stripe")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(signature) = signature {
            builder = builder.header("Stripe-Signature", signature);
        }
        self.send(builder.body(Body::from(payload.to_string())).unwrap())
            .await
    }
}

fn token(user: &str) -> String {
    let claims = Claims {
        sub: user.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as u64,
        iss: None,
        aud: None,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

fn request(method: Method, path: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user)));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn sign(payload: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

fn checkout_completed(
    event_id: &str,
    customer: &str,
    subscription: &str,
    amount_total: i64,
    metadata: &HashMap<String, String>,
) -> String {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "created": chrono::Utc::now().timestamp(),
        "data": {
            "object": {
                "id": "cs_http_1",
                "customer": customer,
                "subscription": subscription,
                "amount_total": amount_total,
                "currency": "usd",
                "metadata": metadata,
            }
        }
    })
    .to_string()
}

// =============================================================================
// Webhook
// =============================================================================

#[tokio::test]
async fn health_is_open() {
    let app = TestApp::new();
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn webhook_without_signature_is_rejected() {
    let app = TestApp::new();
    let payload = json!({ "id": "evt_1", "type": "invoice.paid", "created": 0, "data": { "object": {} } })
        .to_string();

    let (status, body) = app.webhook(&payload, None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_WEBHOOK_SIGNATURE");
    assert_eq!(app.memberships.count().await, 0);
}

#[tokio::test]
async fn webhook_with_tampered_body_is_rejected() {
    let app = TestApp::new();
    let payload = json!({ "id": "evt_1", "type": "invoice.paid", "created": 0, "data": { "object": {} } })
        .to_string();
    let signature = sign(&payload);
    let tampered = payload.replace("evt_1", "evt_2");

    let (status, _) = app.webhook(&tampered, Some(signature)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verified_webhook_is_acknowledged_even_when_processing_fails() {
    let app = TestApp::new();
    // checkout without metadata cannot be attributed to a user
    let payload = checkout_completed("evt_orphan", "cus_x", "sub_x", 5000, &HashMap::new());

    let (status, body) = app.webhook(&payload, Some(sign(&payload))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": true }));
    assert_eq!(app.memberships.count().await, 0);
}

#[tokio::test]
async fn signed_envelope_missing_fields_is_acknowledged() {
    let app = TestApp::new();
    let payload = r#"{"id":"evt_x","type":"invoice.paid"}"#;

    let (status, body) = app.webhook(payload, Some(sign(payload))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": true }));
}

#[tokio::test]
async fn extreme_signature_timestamp_is_rejected() {
    let app = TestApp::new();
    let payload = r#"{"id":"evt_x","type":"invoice.paid"}"#;

    let (status, _) = app
        .webhook(payload, Some("t=-9223372036854775808,v1=00".to_string()))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_event_type_is_acknowledged() {
    let app = TestApp::new();
    let payload = json!({
        "id": "evt_unknown",
        "type": "customer.created",
        "created": chrono::Utc::now().timestamp(),
        "data": { "object": { "id": "cus_1" } }
    })
    .to_string();

    let (status, body) = app.webhook(&payload, Some(sign(&payload))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn preview_applies_coupon_without_side_effects() {
    let app = TestApp::new();
    app.add_user("user-1", UserRole::User).await;
    let plan = app.add_plan(50).await;
    app.add_coupon("SPRING20", DiscountType::Percent, 20).await;

    let (status, body) = app
        .post(
            "/api/membership/checkout/preview",
            Some("user-1"),
            json!({ "planId": plan.id, "couponCode": "spring20" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["originalPrice"], 5000);
    assert_eq!(body["discountedPrice"], 4000);
    assert_eq!(body["isFree"], false);
    assert_eq!(body["coupon"]["code"], "SPRING20");
    assert_eq!(app.memberships.count().await, 0);
    assert!(app.provider.calls().is_empty());
}

#[tokio::test]
async fn unknown_coupon_is_a_bad_request() {
    let app = TestApp::new();
    app.add_user("user-1", UserRole::User).await;
    let plan = app.add_plan(50).await;

    let (status, body) = app
        .post(
            "/api/membership/checkout",
            Some("user-1"),
            json!({ "planId": plan.id, "couponCode": "NOPE" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid coupon code");
    assert!(!app.provider.was_called("create_checkout_session"));
}

#[tokio::test]
async fn checkout_then_webhook_activates_membership() {
    let app = TestApp::new();
    app.add_user("user-1", UserRole::User).await;
    let plan = app.add_plan(50).await;
    app.add_coupon("TENOFF", DiscountType::Amount, 10).await;

    let (status, body) = app
        .post(
            "/api/membership/checkout",
            Some("user-1"),
            json!({ "planId": plan.id, "couponCode": "TENOFF" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["amountDueMinor"], 4000);
    assert!(body["redirectUrl"].as_str().unwrap().starts_with("https://"));

    let (status, body) = app.get("/api/membership", Some("user-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["hasAccess"], false);

    let checkout = app.provider.checkout_requests().pop().unwrap();
    let now = chrono::Utc::now().timestamp();
    app.provider.add_subscription(Subscription {
        id: "sub_http_1".into(),
        customer_id: Some(checkout.customer_id.clone()),
        status: "active".into(),
        current_period_start: Some(now),
        current_period_end: Some(now + 365 * 86_400),
        cancel_at_period_end: false,
        price_id: None,
        card: None,
        metadata: checkout.metadata.clone(),
    });

    let payload = checkout_completed(
        "evt_http_1",
        &checkout.customer_id,
        "sub_http_1",
        4000,
        &checkout.metadata,
    );
    let (status, _) = app.webhook(&payload, Some(sign(&payload))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/api/membership", Some("user-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");
    assert_eq!(body["hasAccess"], true);
    assert_eq!(body["coupon"]["code"], "TENOFF");
    assert_eq!(body["payment"]["price"]["finalMinor"], 4000);
    assert_eq!(
        app.users.role_of(&UserId::new("user-1").unwrap()).await,
        Some(UserRole::Member)
    );
}

// =============================================================================
// Authentication and admin
// =============================================================================

#[tokio::test]
async fn membership_requires_a_token() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/membership", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTHENTICATION_REQUIRED");
}

#[tokio::test]
async fn missing_membership_is_not_found() {
    let app = TestApp::new();
    app.add_user("user-1", UserRole::User).await;
    let (status, _) = app.get("/api/membership", Some("user-1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_endpoints_refuse_members() {
    let app = TestApp::new();
    app.add_user("user-1", UserRole::Member).await;

    let (status, body) = app.get("/api/admin/memberships", Some("user-1")).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn admin_creates_and_lists_coupons() {
    let app = TestApp::new();
    app.add_user("admin-1", UserRole::Admin).await;

    let (status, body) = app
        .post(
            "/api/admin/coupons",
            Some("admin-1"),
            json!({ "code": " launch ", "discountType": "amount", "amount": 15 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["code"], "LAUNCH");

    let (status, body) = app.get("/api/admin/coupons", Some("admin-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn archiving_an_entitled_membership_needs_confirmation() {
    let app = TestApp::new();
    app.add_user("admin-1", UserRole::Manager).await;
    app.add_user("user-1", UserRole::User).await;
    let plan = app.add_plan(50).await;

    // A paid checkout leaves an entitled membership behind.
    app.post(
        "/api/membership/checkout",
        Some("user-1"),
        json!({ "planId": plan.id }),
    )
    .await;
    let checkout = app.provider.checkout_requests().pop().unwrap();
    let now = chrono::Utc::now().timestamp();
    app.provider.add_subscription(Subscription {
        id: "sub_http_2".into(),
        customer_id: Some(checkout.customer_id.clone()),
        status: "active".into(),
        current_period_start: Some(now),
        current_period_end: Some(now + 365 * 86_400),
        cancel_at_period_end: false,
        price_id: None,
        card: None,
        metadata: checkout.metadata.clone(),
    });
    let payload = checkout_completed(
        "evt_http_2",
        &checkout.customer_id,
        "sub_http_2",
        5000,
        &checkout.metadata,
    );
    app.webhook(&payload, Some(sign(&payload))).await;

    let (_, list) = app.get("/api/admin/memberships?status=active", Some("admin-1")).await;
    let id = list[0]["id"].as_str().unwrap().to_string();
    let path = format!("/api/admin/memberships/{id}/archive");

    let (status, body) = app.post(&path, Some("admin-1"), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["requiresConfirmation"], true);

    let (status, body) = app
        .post(&path, Some("admin-1"), json!({ "forceArchive": true, "reason": "fraud" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isArchived"], true);
    assert_eq!(body["hasAccess"], false);
    assert!(app.provider.was_called("cancel_subscription"));

    let (status, audit) = app
        .get(&format!("/api/admin/memberships/{id}/audit"), Some("admin-1"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(audit
        .as_array()
        .unwrap()
        .iter()
        .any(|entry| entry["kind"] == "admin_action"));
}
