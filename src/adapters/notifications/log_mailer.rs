//! Mailer that writes notifications to the log instead of delivering them.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::ports::{Mailer, Notification};

#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl LogMailer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, notification: Notification) -> Result<(), DomainError> {
        tracing::info!(
            user_id = %notification.user_id,
            template = notification.kind.template(),
            context = %notification.context,
            "Notification dispatched"
        );
        Ok(())
    }
}
