//! PostgreSQL adapters.
//!
//! Schema lives in `migrations/`; run it with `sqlx::migrate!` at startup.

mod audit_log;
mod coupon_repository;
mod membership_repository;
mod plan_catalog;
mod user_directory;

pub use audit_log::PostgresAuditLog;
pub use coupon_repository::PostgresCouponRepository;
pub use membership_repository::PostgresMembershipRepository;
pub use plan_catalog::PostgresPlanCatalog;
pub use user_directory::PostgresUserDirectory;
