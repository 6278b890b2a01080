//! Foundation module - Shared domain primitives.
//!
//! Identifiers, timestamps, errors, the state machine contract and the
//! event envelope used across the billing domain.

mod errors;
mod events;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{DomainEvent, EventEnvelope, EventId, EventMetadata};
pub use ids::{AuditEntryId, CouponId, MembershipId, PlanId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
