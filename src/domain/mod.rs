//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, events)
//! - `billing` - Plans, coupons and pricing
//! - `membership` - Subscription lifecycle and webhook parsing
//! - `access` - Role derivation from membership status
//! - `audit` - Append-only audit trail entries

pub mod access;
pub mod audit;
pub mod billing;
pub mod foundation;
pub mod membership;
