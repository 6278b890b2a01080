//! HTTP adapters - REST API built on axum.

pub mod membership;
pub mod middleware;

use std::sync::Arc;

use axum::{middleware::from_fn_with_state, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

pub use membership::{membership_router, MembershipAppState};
pub use middleware::JwtAuthenticator;

/// The full application router: `/health` plus everything under `/api`.
///
/// Bearer tokens are checked on `/api`; routes decide for themselves whether
/// a user is required.
pub fn app_router(state: MembershipAppState, authenticator: Arc<JwtAuthenticator>) -> Router {
    let api = membership_router()
        .layer(from_fn_with_state(authenticator, middleware::auth_middleware))
        .with_state(state);

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
