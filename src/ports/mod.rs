//! Ports - interfaces for external dependencies.
//!
//! Adapters implement these; handlers depend only on the traits.
//!
//! ## Storage
//!
//! - `MembershipRepository`, `CouponRepository`, `PlanCatalog`,
//!   `UserDirectory`, `AuditLog`
//!
//! ## Outbound
//!
//! - `PaymentProvider` - checkout, customer/price provisioning, subscription lookups
//! - `Mailer` - notification delivery
//!
//! ## Events
//!
//! - `EventPublisher` / `EventSubscriber` / `EventHandler`

mod audit_log;
mod coupon_repository;
mod event_publisher;
mod event_subscriber;
mod mailer;
mod membership_repository;
mod payment_provider;
mod plan_catalog;
mod user_directory;

pub use audit_log::AuditLog;
pub use coupon_repository::CouponRepository;
pub use event_publisher::EventPublisher;
pub use event_subscriber::{EventBus, EventHandler, EventSubscriber};
pub use mailer::{Mailer, Notification, NotificationKind};
pub use membership_repository::{MembershipFilter, MembershipRepository};
pub use payment_provider::{
    CheckoutLineItem, CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest,
    CreatePriceRequest, Customer, PaymentError, PaymentErrorCode, PaymentProvider,
    ProviderPrice, Subscription,
};
pub use plan_catalog::PlanCatalog;
pub use user_directory::{UserAccount, UserDirectory};
