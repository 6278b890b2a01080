//! Membership billing
//!
//! Sells a recurring membership through a hosted checkout, reconciles the
//! payment provider's webhooks into a membership state machine, escalates
//! repeated payment failures, keeps the user's access role in step with the
//! membership and records every transition in an append-only audit log.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
