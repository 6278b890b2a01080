//! Membership-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | Validation | 400 |
//! | CouponRejected | 400 |
//! | InvalidWebhookSignature | 400 |
//! | NotFound | 404 |
//! | Conflict | 409 |
//! | InvalidState | 409 |
//! | Provider | 502 |
//! | Configuration | 500 |
//! | Infrastructure | 500 |

use thiserror::Error;

use crate::domain::billing::CouponRejection;
use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

use super::MembershipStatus;

/// Errors surfaced by membership billing operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MembershipError {
    #[error("Validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    /// Coupon could not be applied. The message is shown to the buyer verbatim.
    #[error("{0}")]
    CouponRejected(CouponRejection),

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("Invalid webhook signature: {0}")]
    InvalidWebhookSignature(String),

    #[error("Payment provider error: {0}")]
    Provider(String),

    /// The request needs explicit confirmation (or cannot proceed) given
    /// the current state.
    #[error("{message}")]
    Conflict {
        message: String,
        requires_confirmation: bool,
    },

    #[error("Cannot {attempted} membership in {current} state")]
    InvalidState {
        current: MembershipStatus,
        attempted: &'static str,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl MembershipError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        MembershipError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        MembershipError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        MembershipError::Conflict {
            message: message.into(),
            requires_confirmation: false,
        }
    }

    pub fn requires_confirmation(message: impl Into<String>) -> Self {
        MembershipError::Conflict {
            message: message.into(),
            requires_confirmation: true,
        }
    }

    pub fn invalid_state(current: MembershipStatus, attempted: &'static str) -> Self {
        MembershipError::InvalidState { current, attempted }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        MembershipError::Configuration(message.into())
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        MembershipError::Infrastructure(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            MembershipError::Validation { .. } | MembershipError::CouponRejected(_) => {
                ErrorCode::ValidationFailed
            }
            MembershipError::NotFound { resource, .. } => match *resource {
                "Plan" => ErrorCode::PlanNotFound,
                "Coupon" => ErrorCode::CouponNotFound,
                "User" => ErrorCode::UserNotFound,
                _ => ErrorCode::MembershipNotFound,
            },
            MembershipError::InvalidWebhookSignature(_) => ErrorCode::InvalidWebhookSignature,
            MembershipError::Provider(_) => ErrorCode::PaymentProviderError,
            MembershipError::Conflict { .. } => ErrorCode::Conflict,
            MembershipError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
            MembershipError::Configuration(_) => ErrorCode::ConfigurationError,
            MembershipError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Machine-readable flag telling the caller to retry with confirmation.
    pub fn needs_confirmation(&self) -> bool {
        matches!(
            self,
            MembershipError::Conflict {
                requires_confirmation: true,
                ..
            }
        )
    }
}

impl From<CouponRejection> for MembershipError {
    fn from(rejection: CouponRejection) -> Self {
        MembershipError::CouponRejected(rejection)
    }
}

impl From<ValidationError> for MembershipError {
    fn from(err: ValidationError) -> Self {
        let field = match &err {
            ValidationError::EmptyField { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFormat { field, .. } => field.clone(),
        };
        MembershipError::Validation {
            field,
            message: err.to_string(),
        }
    }
}

impl From<DomainError> for MembershipError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => MembershipError::Validation {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            ErrorCode::MembershipNotFound => MembershipError::not_found("Membership", err.message),
            ErrorCode::PlanNotFound => MembershipError::not_found("Plan", err.message),
            ErrorCode::CouponNotFound => MembershipError::not_found("Coupon", err.message),
            ErrorCode::UserNotFound => MembershipError::not_found("User", err.message),
            ErrorCode::Conflict => MembershipError::conflict(err.message),
            _ => MembershipError::Infrastructure(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coupon_rejection_message_is_verbatim() {
        let err: MembershipError = CouponRejection::BelowMinimumCharge.into();
        assert_eq!(err.to_string(), "Discounted amount must be at least $0.50");
        assert_eq!(err.code(), ErrorCode::ValidationFailed);
    }

    #[test]
    fn not_found_maps_resource_to_code() {
        assert_eq!(MembershipError::not_found("Plan", "p").code(), ErrorCode::PlanNotFound);
        assert_eq!(
            MembershipError::not_found("Membership", "m").code(),
            ErrorCode::MembershipNotFound
        );
    }

    #[test]
    fn only_confirmation_conflicts_request_confirmation() {
        assert!(MembershipError::requires_confirmation("sure?").needs_confirmation());
        assert!(!MembershipError::conflict("no").needs_confirmation());
        assert!(!MembershipError::validation("f", "m").needs_confirmation());
    }

    #[test]
    fn invalid_state_message_names_status() {
        let err = MembershipError::invalid_state(MembershipStatus::Pending, "expire");
        assert_eq!(err.to_string(), "Cannot expire membership in pending state");
    }

    #[test]
    fn domain_validation_keeps_field_detail() {
        let err: MembershipError = DomainError::validation("code", "duplicate").into();
        assert_eq!(err, MembershipError::validation("code", "duplicate"));
    }

    #[test]
    fn database_failures_become_infrastructure() {
        let err: MembershipError = DomainError::database("connection reset").into();
        assert!(matches!(err, MembershipError::Infrastructure(_)));
    }
}
