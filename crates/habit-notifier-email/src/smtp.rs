use habit_core::{Reminder, Tracking, User};
use habit_notifier::{Notifier, NotifierError};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, error, info};

use crate::config::SmtpConfig;

/// Email notifier adapter. Delivers reminders via SMTP regardless of the
/// user's `notification_preference` — routing by preference is the
/// registry's job, this adapter only knows how to send mail.
pub struct EmailNotifier {
    config: SmtpConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl std::fmt::Debug for EmailNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailNotifier")
            .field("config", &self.config)
            .field("transport", &"<AsyncSmtpTransport>")
            .finish()
    }
}

impl EmailNotifier {
    pub fn new(config: SmtpConfig) -> Result<Self, NotifierError> {
        let transport = build_transport(&config)?;
        Ok(Self { config, transport })
    }

    pub fn with_transport(config: SmtpConfig, transport: AsyncSmtpTransport<Tokio1Executor>) -> Self {
        Self { config, transport }
    }
}

impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    async fn deliver(&self, user: &User, tracking: &Tracking, reminder: &Reminder) -> Result<(), NotifierError> {
        debug!(to = %user.email, tracking_id = %tracking.id, "building reminder email");
        let message = build_message(&self.config.from_address, user, tracking, reminder)?;

        info!(to = %user.email, "sending reminder email");
        self.transport.send(message).await.map_err(|e| {
            error!(error = %e, "SMTP send failed");
            map_smtp_error(&e)
        })?;

        info!(to = %user.email, "reminder email sent");
        Ok(())
    }
}

fn build_message(
    from: &str,
    user: &User,
    tracking: &Tracking,
    reminder: &Reminder,
) -> Result<Message, NotifierError> {
    let from_mailbox: Mailbox = from
        .parse()
        .map_err(|e| NotifierError::Permanent(format!("invalid from address: {e}")))?;
    let to_mailbox: Mailbox = user
        .email
        .parse()
        .map_err(|e| NotifierError::Permanent(format!("invalid recipient address: {e}")))?;

    let body = match &reminder.notes {
        Some(notes) => format!("{}\n\n{}", tracking.question, notes),
        None => tracking.question.clone(),
    };

    Message::builder()
        .from(from_mailbox)
        .to(to_mailbox)
        .subject(format!("Reminder: {}", tracking.question))
        .body(body)
        .map_err(|e| NotifierError::Permanent(format!("failed to build email: {e}")))
}

fn build_transport(config: &SmtpConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifierError> {
    let builder = if config.tls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| NotifierError::Permanent(format!("SMTP TLS relay error: {e}")))?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
    };

    let builder = builder.port(config.smtp_port);

    let builder = if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        builder.credentials(Credentials::new(user.clone(), pass.clone()))
    } else {
        builder
    };

    Ok(builder.build())
}

fn map_smtp_error(error: &lettre::transport::smtp::Error) -> NotifierError {
    let message = error.to_string();
    if error.is_permanent() {
        NotifierError::Permanent(format!("permanent SMTP error: {message}"))
    } else {
        NotifierError::Transient(format!("transient SMTP error: {message}"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use habit_core::{NotificationPreference, ReminderStatus, Schedule, TrackingState};
    use lettre::{AsyncSmtpTransport, Tokio1Executor};
    use uuid::Uuid;

    use super::*;

    fn test_config() -> SmtpConfig {
        SmtpConfig {
            smtp_host: "localhost".into(),
            smtp_port: 2525,
            username: None,
            password: None,
            tls: false,
            from_address: "reminders@habits.example".into(),
        }
    }

    fn fixtures() -> (User, Tracking, Reminder) {
        let user = User {
            id: Uuid::new_v4(),
            email: "recipient@example.com".into(),
            timezone: "UTC".into(),
            locale: "en-US".into(),
            notification_preference: NotificationPreference::Email,
        };
        let now = Utc::now();
        let tracking = Tracking {
            id: Uuid::new_v4(),
            user_id: user.id,
            question: "Did you stretch?".into(),
            notes: None,
            icon: None,
            days: None,
            schedules: vec![Schedule::new(9, 0)],
            state: TrackingState::Running,
            created_at: now,
            updated_at: now,
        };
        let reminder = Reminder {
            id: Uuid::new_v4(),
            tracking_id: tracking.id,
            user_id: user.id,
            scheduled_time: now,
            notes: None,
            answer_value: None,
            status: ReminderStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        (user, tracking, reminder)
    }

    #[test]
    fn build_message_succeeds_for_valid_addresses() {
        let (user, tracking, reminder) = fixtures();
        assert!(build_message("reminders@habits.example", &user, &tracking, &reminder).is_ok());
    }

    #[test]
    fn build_message_rejects_invalid_recipient() {
        let (mut user, tracking, reminder) = fixtures();
        user.email = "not-an-address".into();
        let err = build_message("reminders@habits.example", &user, &tracking, &reminder).unwrap_err();
        assert!(matches!(err, NotifierError::Permanent(_)));
    }

    #[tokio::test]
    async fn build_transport_without_tls_succeeds() {
        assert!(build_transport(&test_config()).is_ok());
    }

    #[tokio::test]
    async fn notifier_name_is_email() {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous("localhost")
            .port(2525)
            .build();
        let notifier = EmailNotifier::with_transport(test_config(), transport);
        assert_eq!(Notifier::name(&notifier), "email");
    }
}
