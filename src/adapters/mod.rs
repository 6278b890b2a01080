//! Adapters - implementations of port interfaces.
//!
//! - `postgres` - sqlx-backed stores
//! - `memory` - in-process stores for tests and database-less local runs
//! - `stripe` - Stripe REST client and a mock provider
//! - `events` - in-process event bus
//! - `notifications` - membership notifier and the logging mailer
//! - `http` - axum routes, DTOs and auth

pub mod events;
pub mod http;
pub mod memory;
pub mod notifications;
pub mod postgres;
pub mod stripe;
