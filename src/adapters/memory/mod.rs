//! In-process stores.
//!
//! Back the application tests and local runs without a database. Each store
//! is cheaply cloneable and shares its state across clones.

mod audit_log;
mod coupon_repository;
mod membership_repository;
mod plan_catalog;
mod user_directory;

pub use audit_log::InMemoryAuditLog;
pub use coupon_repository::InMemoryCouponRepository;
pub use membership_repository::InMemoryMembershipRepository;
pub use plan_catalog::InMemoryPlanCatalog;
pub use user_directory::InMemoryUserDirectory;
