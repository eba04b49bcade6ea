use std::sync::Arc;

use habit_core::{Reminder, Tracking, User};
use habit_notifier::{Notifier, NotifierError};
use reqwest::Client;

use crate::config::TelegramConfig;
use crate::identity::TelegramIdentityResolver;
use crate::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, SendMessageRequest, SentMessage,
    TelegramApiResponse,
};

/// Telegram Bot API notifier. Resolves the user's chat id out-of-band via
/// `TelegramIdentityResolver`, then posts `sendMessage` with inline buttons
/// for Complete/Dismiss/Snooze.
pub struct TelegramNotifier {
    config: TelegramConfig,
    client: Client,
    resolver: Arc<dyn TelegramIdentityResolver>,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig, resolver: Arc<dyn TelegramIdentityResolver>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            config,
            client,
            resolver,
        }
    }

    pub fn with_client(
        config: TelegramConfig,
        resolver: Arc<dyn TelegramIdentityResolver>,
        client: Client,
    ) -> Self {
        Self {
            config,
            client,
            resolver,
        }
    }

    fn build_keyboard(reminder: &Reminder) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup {
            inline_keyboard: vec![vec![
                InlineKeyboardButton {
                    text: "Done".into(),
                    callback_data: format!("complete:{}", reminder.id),
                },
                InlineKeyboardButton {
                    text: "Dismiss".into(),
                    callback_data: format!("dismiss:{}", reminder.id),
                },
                InlineKeyboardButton {
                    text: "Snooze 10m".into(),
                    callback_data: format!("snooze:{}:10", reminder.id),
                },
            ]],
        }
    }
}

impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn deliver(&self, user: &User, tracking: &Tracking, reminder: &Reminder) -> Result<(), NotifierError> {
        let chat_id = self
            .resolver
            .chat_id_for_user(user.id)
            .await?
            .ok_or_else(|| NotifierError::Permanent(format!("no Telegram chat linked for user {}", user.id)))?;

        let text = match &reminder.notes {
            Some(notes) => format!("{}\n\n{}", tracking.question, notes),
            None => tracking.question.clone(),
        };

        let request = SendMessageRequest {
            chat_id,
            text,
            reply_markup: Some(Self::build_keyboard(reminder)),
        };

        let url = self.config.method_url("sendMessage");

        tracing::debug!(reminder_id = %reminder.id, "posting reminder to Telegram");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| NotifierError::Transient(format!("Telegram request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!("Telegram rate limit hit");
            return Err(NotifierError::Transient("Telegram rate limited".into()));
        }

        let api_response: TelegramApiResponse<SentMessage> = response
            .json()
            .await
            .map_err(|e| NotifierError::Transient(format!("failed to parse Telegram response: {e}")))?;

        if !api_response.ok {
            let description = api_response.description.unwrap_or_else(|| "unknown error".into());
            return Err(match api_response.error_code {
                Some(code) if (500..600).contains(&code) => {
                    NotifierError::Transient(format!("Telegram API error {code}: {description}"))
                }
                _ => NotifierError::Permanent(format!("Telegram API error: {description}")),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;
    use habit_core::{NotificationPreference, ReminderStatus, Schedule, TrackingState};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    struct MockResolver {
        chat_id: Option<String>,
    }

    #[async_trait]
    impl TelegramIdentityResolver for MockResolver {
        async fn chat_id_for_user(&self, _user_id: uuid::Uuid) -> Result<Option<String>, NotifierError> {
            Ok(self.chat_id.clone())
        }

        async fn user_id_for_chat(&self, _chat_id: &str) -> Result<Option<uuid::Uuid>, NotifierError> {
            Ok(None)
        }
    }

    struct MockTelegramServer {
        listener: TcpListener,
        base_url: String,
    }

    impl MockTelegramServer {
        async fn start() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            Self {
                listener,
                base_url: format!("http://127.0.0.1:{port}"),
            }
        }

        async fn respond_once(self, status_code: u16, body: &str) {
            let body = body.to_owned();
            let (mut stream, _) = self.listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = stream.read(&mut buf).await.unwrap();
            let response = format!(
                "HTTP/1.1 {status_code} OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        }
    }

    fn fixtures() -> (User, Tracking, Reminder) {
        let user = User {
            id: uuid::Uuid::new_v4(),
            email: "a@example.com".into(),
            timezone: "UTC".into(),
            locale: "en-US".into(),
            notification_preference: NotificationPreference::Telegram,
        };
        let now = Utc::now();
        let tracking = Tracking {
            id: uuid::Uuid::new_v4(),
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
            id: uuid::Uuid::new_v4(),
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
    fn notifier_name_is_telegram() {
        let resolver = Arc::new(MockResolver { chat_id: None });
        let notifier = TelegramNotifier::new(TelegramConfig::new("token"), resolver);
        assert_eq!(Notifier::name(&notifier), "telegram");
    }

    #[tokio::test]
    async fn deliver_without_linked_chat_is_permanent_failure() {
        let resolver = Arc::new(MockResolver { chat_id: None });
        let notifier = TelegramNotifier::new(TelegramConfig::new("token"), resolver);
        let (user, tracking, reminder) = fixtures();
        let err = notifier.deliver(&user, &tracking, &reminder).await.unwrap_err();
        assert!(matches!(err, NotifierError::Permanent(_)));
    }

    #[tokio::test]
    async fn deliver_success() {
        let server = MockTelegramServer::start().await;
        let resolver = Arc::new(MockResolver {
            chat_id: Some("12345".into()),
        });
        let notifier = TelegramNotifier::new(
            TelegramConfig::new("token").with_api_base_url(&server.base_url),
            resolver,
        );
        let (user, tracking, reminder) = fixtures();

        let response_body = r#"{"ok":true,"result":{"message_id":1}}"#;
        let server_handle = tokio::spawn(async move {
            server.respond_once(200, response_body).await;
        });

        let result = notifier.deliver(&user, &tracking, &reminder).await;
        server_handle.await.unwrap();

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn deliver_api_error_is_permanent() {
        let server = MockTelegramServer::start().await;
        let resolver = Arc::new(MockResolver {
            chat_id: Some("12345".into()),
        });
        let notifier = TelegramNotifier::new(
            TelegramConfig::new("bad-token").with_api_base_url(&server.base_url),
            resolver,
        );
        let (user, tracking, reminder) = fixtures();

        let response_body = r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#;
        let server_handle = tokio::spawn(async move {
            server.respond_once(200, response_body).await;
        });

        let err = notifier.deliver(&user, &tracking, &reminder).await.unwrap_err();
        server_handle.await.unwrap();

        assert!(matches!(err, NotifierError::Permanent(_)));
    }

    #[tokio::test]
    async fn deliver_server_error_is_transient() {
        let server = MockTelegramServer::start().await;
        let resolver = Arc::new(MockResolver {
            chat_id: Some("12345".into()),
        });
        let notifier = TelegramNotifier::new(
            TelegramConfig::new("token").with_api_base_url(&server.base_url),
            resolver,
        );
        let (user, tracking, reminder) = fixtures();

        let response_body = r#"{"ok":false,"error_code":502,"description":"Bad Gateway"}"#;
        let server_handle = tokio::spawn(async move {
            server.respond_once(200, response_body).await;
        });

        let err = notifier.deliver(&user, &tracking, &reminder).await.unwrap_err();
        server_handle.await.unwrap();

        assert!(matches!(err, NotifierError::Transient(_)));
    }
}
