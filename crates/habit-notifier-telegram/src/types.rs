use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct SendMessageRequest {
    pub chat_id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
pub(crate) struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TelegramApiResponse<T> {
    pub ok: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub result: Option<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SentMessage {
    #[allow(dead_code)]
    pub message_id: i64,
}

/// Subset of Telegram's `Update` object this adapter understands: inbound
/// callback-query presses on the reminder keyboard.
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    #[allow(dead_code)]
    pub update_id: i64,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[allow(dead_code)]
    pub id: String,
    pub from: TelegramUser,
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub from: Option<TelegramUser>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
}
