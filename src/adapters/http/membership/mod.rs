//! HTTP adapter for membership endpoints.
//!
//! - `GET /api/membership` - the caller's membership
//! - `POST /api/membership/checkout` - start a checkout session
//! - `POST /api/membership/checkout/preview` - price a checkout
//! - `/api/admin/...` - membership administration and coupons
//! - `POST /api/webhooks/stripe` - provider webhooks

pub mod dto;
mod handlers;
mod routes;

pub use dto::*;
pub use handlers::{AdminUser, ApiError, MembershipAppState};
pub use routes::{admin_routes, membership_router, membership_routes, webhook_routes};
