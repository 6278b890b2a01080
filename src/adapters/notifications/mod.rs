//! Notification adapters.
//!
//! - `MembershipNotifier` turns published membership events into
//!   notifications
//! - `LogMailer` is the shipped `Mailer`; it only logs

mod log_mailer;
mod membership_notifier;

pub use log_mailer::LogMailer;
pub use membership_notifier::MembershipNotifier;
