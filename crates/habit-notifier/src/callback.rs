use async_trait::async_trait;
use uuid::Uuid;

use crate::error::NotifierError;

/// Action a user took in response to a reminder, as relayed by a chat-bot
/// adapter's inbound callback (Telegram inline-keyboard presses, reply
/// text, etc). Mirrors the operations `ReminderEngine` exposes for
/// answering and adjusting a reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    Complete,
    Dismiss,
    Snooze(u32),
    AddNote(String),
}

/// Inbound half of the notifier port: where a chat-bot adapter delivers a
/// parsed user action once it has resolved the sender to a `user_id`.
///
/// Adapters must validate the sender's identity out-of-band (e.g. mapping
/// a Telegram chat id to a user row) before calling `handle_action` --
/// this trait does no identity checking itself.
#[async_trait]
pub trait ActionSink: Send + Sync {
    async fn handle_action(
        &self,
        user_id: Uuid,
        reminder_id: Uuid,
        action: UserAction,
    ) -> Result<(), NotifierError>;
}
