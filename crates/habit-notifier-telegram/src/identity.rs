use async_trait::async_trait;
use habit_notifier::NotifierError;
use uuid::Uuid;

/// Maps between a habit tracker `user_id` and the Telegram chat id the bot
/// talks to. The mapping itself is owned by the linking flow that produces
/// `TelegramConnected` bus events; this adapter only consumes it.
#[async_trait]
pub trait TelegramIdentityResolver: Send + Sync {
    async fn chat_id_for_user(&self, user_id: Uuid) -> Result<Option<String>, NotifierError>;
    async fn user_id_for_chat(&self, chat_id: &str) -> Result<Option<Uuid>, NotifierError>;
}
