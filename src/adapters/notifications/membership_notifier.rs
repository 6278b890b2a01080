//! Membership notifier.
//!
//! Subscribes to membership events on the bus and hands the ones a member
//! should hear about to the `Mailer`. Delivery runs on a spawned task so a
//! slow or failing mailer never holds up the transition that published the
//! event.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::domain::membership::{MembershipEvent, MembershipStatus};
use crate::ports::{EventHandler, Mailer, Notification, NotificationKind};

pub struct MembershipNotifier {
    mailer: Arc<dyn Mailer>,
}

impl MembershipNotifier {
    /// Event types worth subscribing to.
    pub const EVENT_TYPES: &'static [&'static str] = &[
        "membership.activated.v1",
        "membership.payment_failed.v1",
        "membership.payment_refunded.v1",
        "membership.status_changed.v1",
        "membership.canceled.v1",
        "membership.expired.v1",
    ];

    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    /// The notification for `event`, if any.
    pub fn notification_for(event: &MembershipEvent) -> Option<Notification> {
        let (kind, context) = match event {
            MembershipEvent::Activated { expiry_date, .. } => (
                NotificationKind::MembershipActivated,
                json!({ "expiryDate": expiry_date }),
            ),
            MembershipEvent::PaymentFailed {
                failure_count,
                reason,
                ..
            } => (
                NotificationKind::PaymentFailed,
                json!({ "failureCount": failure_count, "reason": reason }),
            ),
            MembershipEvent::StatusChanged {
                to: MembershipStatus::PastDue,
                reason,
                ..
            } => (NotificationKind::MembershipPastDue, json!({ "reason": reason })),
            MembershipEvent::Canceled { .. } => (NotificationKind::MembershipCanceled, json!({})),
            MembershipEvent::Expired { .. } => (NotificationKind::MembershipExpired, json!({})),
            MembershipEvent::PaymentRefunded {
                amount_minor,
                currency,
                ..
            } => (
                NotificationKind::PaymentRefunded,
                json!({ "amountMinor": amount_minor, "currency": currency }),
            ),
            _ => return None,
        };

        Some(Notification {
            user_id: event.user_id().clone(),
            kind,
            context,
        })
    }
}

#[async_trait]
impl EventHandler for MembershipNotifier {
    async fn handle(&self, envelope: EventEnvelope) -> Result<(), DomainError> {
        let event: MembershipEvent = envelope.payload_as().map_err(|e| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Cannot read {} payload: {}", envelope.event_type, e),
            )
        })?;

        let Some(notification) = Self::notification_for(&event) else {
            return Ok(());
        };

        let mailer = self.mailer.clone();
        let event_id = envelope.event_id.clone();
        tokio::spawn(async move {
            let template = notification.kind.template();
            let user_id = notification.user_id.clone();
            if let Err(e) = mailer.send(notification).await {
                tracing::warn!(
                    event_id = %event_id.as_str(),
                    user_id = %user_id,
                    template,
                    error = %e,
                    "Notification not delivered"
                );
            }
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "membership_notifier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::domain::foundation::{MembershipId, Timestamp, UserId};
    use crate::ports::{EventPublisher, EventSubscriber};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, notification: Notification) -> Result<(), DomainError> {
            self.sent.lock().unwrap().push(notification);
            Ok(())
        }
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    #[test]
    fn past_due_status_change_notifies() {
        let event = MembershipEvent::StatusChanged {
            membership_id: MembershipId::new(),
            user_id: user(),
            from: MembershipStatus::Active,
            to: MembershipStatus::PastDue,
            reason: "payment_failures".into(),
            actor: None,
            occurred_at: Timestamp::now(),
        };
        let notification = MembershipNotifier::notification_for(&event).unwrap();
        assert_eq!(notification.kind, NotificationKind::MembershipPastDue);
    }

    #[test]
    fn hold_status_change_is_silent() {
        let event = MembershipEvent::StatusChanged {
            membership_id: MembershipId::new(),
            user_id: user(),
            from: MembershipStatus::Active,
            to: MembershipStatus::Hold,
            reason: "admin_hold".into(),
            actor: Some(UserId::new("admin-1").unwrap()),
            occurred_at: Timestamp::now(),
        };
        assert!(MembershipNotifier::notification_for(&event).is_none());
    }

    #[tokio::test]
    async fn published_activation_reaches_mailer() {
        let mailer = Arc::new(RecordingMailer::default());
        let bus = InMemoryEventBus::new();
        bus.subscribe_all(
            MembershipNotifier::EVENT_TYPES,
            Arc::new(MembershipNotifier::new(mailer.clone())),
        );

        let event = MembershipEvent::Activated {
            membership_id: MembershipId::new(),
            user_id: user(),
            previous_status: MembershipStatus::Pending,
            expiry_date: Timestamp::now().add_days(30),
            occurred_at: Timestamp::now(),
        };
        bus.publish(EventEnvelope::from_event(&event).unwrap())
            .await
            .unwrap();

        for _ in 0..50 {
            if !mailer.sent.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::MembershipActivated);
        assert_eq!(sent[0].user_id, user());
    }
}
