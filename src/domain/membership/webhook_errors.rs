//! Webhook error types.
//!
//! Verification failures reject the request and touch nothing. Every other
//! variant happens after the signature checked out: it is logged and audited
//! but the delivery is still acknowledged, so the provider does not keep
//! retrying it.

use thiserror::Error;

use super::MembershipError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    // Verification
    #[error("Missing signature header")]
    MissingSignature,

    #[error("Invalid signature")]
    InvalidSignature,

    /// Signed more than five minutes ago.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Signed in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Malformed `Stripe-Signature` header.
    #[error("Parse error: {0}")]
    ParseError(String),

    // Processing
    /// Signed body that is not a well-formed event.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Missing metadata: {0}")]
    MissingMetadata(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("No membership for {0}")]
    MembershipNotFound(String),

    #[error(transparent)]
    Membership(#[from] MembershipError),
}

impl WebhookError {
    /// True when the request itself could not be trusted.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            WebhookError::MissingSignature
                | WebhookError::InvalidSignature
                | WebhookError::TimestampOutOfRange
                | WebhookError::InvalidTimestamp
                | WebhookError::ParseError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_failures_are_classified() {
        assert!(WebhookError::InvalidSignature.is_verification_failure());
        assert!(WebhookError::TimestampOutOfRange.is_verification_failure());
        assert!(WebhookError::ParseError("bad".into()).is_verification_failure());
    }

    #[test]
    fn processing_failures_are_not_verification_failures() {
        assert!(!WebhookError::MissingField("subscription").is_verification_failure());
        assert!(!WebhookError::MalformedPayload("bad".into()).is_verification_failure());
        assert!(!WebhookError::MembershipNotFound("sub_1".into()).is_verification_failure());
        let wrapped: WebhookError = MembershipError::infrastructure("db down").into();
        assert!(!wrapped.is_verification_failure());
    }

    #[test]
    fn wrapped_membership_error_displays_transparently() {
        let wrapped: WebhookError = MembershipError::infrastructure("db down").into();
        assert_eq!(wrapped.to_string(), "Infrastructure error: db down");
    }
}
