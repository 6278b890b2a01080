//! Stripe payment provider adapters.
//!
//! - `StripePaymentAdapter` - REST client; the API key is held as a
//!   `secrecy::SecretString`
//! - `MockPaymentProvider` - in-process fake with call tracking and error
//!   injection

mod api_types;
mod mock_payment_provider;
mod stripe_adapter;

pub use mock_payment_provider::{MethodCall, MockPaymentProvider};
pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
