use habit_notifier::{ActionSink, NotifierError, UserAction};
use uuid::Uuid;

use crate::identity::TelegramIdentityResolver;
use crate::types::TelegramUpdate;

/// Parse one Telegram `Update` and, if it carries a recognized reminder
/// action, route it to `sink`. Resolves the sender's chat id to a
/// `user_id` via `resolver` before dispatch, per the port's requirement
/// that identity be validated out-of-band.
///
/// Updates that carry neither a callback query nor a note-reply are
/// silently ignored -- they are not reminder actions (bot commands,
/// unrelated chat messages, etc).
pub async fn handle_update(
    update: &TelegramUpdate,
    resolver: &dyn TelegramIdentityResolver,
    sink: &dyn ActionSink,
) -> Result<(), NotifierError> {
    if let Some(query) = &update.callback_query {
        let Some(data) = &query.data else { return Ok(()) };
        let (reminder_id, action) = parse_callback_data(data)?;
        let user_id = resolve_chat(resolver, query.from.id).await?;
        sink.handle_action(user_id, reminder_id, action).await?;
        return Ok(());
    }

    if let Some(message) = &update.message {
        if let (Some(from), Some(text)) = (&message.from, &message.text) {
            if let Some((reminder_id, note)) = parse_note_command(text) {
                let user_id = resolve_chat(resolver, from.id).await?;
                sink.handle_action(user_id, reminder_id, UserAction::AddNote(note)).await?;
            }
        }
    }

    Ok(())
}

async fn resolve_chat(resolver: &dyn TelegramIdentityResolver, chat_id: i64) -> Result<Uuid, NotifierError> {
    resolver
        .user_id_for_chat(&chat_id.to_string())
        .await?
        .ok_or_else(|| NotifierError::Permanent(format!("no user linked to Telegram chat {chat_id}")))
}

/// `callback_data` is one of `complete:<uuid>`, `dismiss:<uuid>`, or
/// `snooze:<uuid>:<minutes>`, matching the buttons this adapter attaches
/// to outbound reminder messages.
fn parse_callback_data(data: &str) -> Result<(Uuid, UserAction), NotifierError> {
    let mut parts = data.split(':');
    let kind = parts.next().unwrap_or_default();
    let reminder_id = parts
        .next()
        .ok_or_else(|| NotifierError::Permanent(format!("malformed callback data: {data}")))?;
    let reminder_id: Uuid = reminder_id
        .parse()
        .map_err(|e| NotifierError::Permanent(format!("invalid reminder id in callback data: {e}")))?;

    match kind {
        "complete" => Ok((reminder_id, UserAction::Complete)),
        "dismiss" => Ok((reminder_id, UserAction::Dismiss)),
        "snooze" => {
            let minutes: u32 = parts
                .next()
                .ok_or_else(|| NotifierError::Permanent(format!("missing snooze minutes: {data}")))?
                .parse()
                .map_err(|e| NotifierError::Permanent(format!("invalid snooze minutes: {e}")))?;
            Ok((reminder_id, UserAction::Snooze(minutes)))
        }
        other => Err(NotifierError::Permanent(format!("unknown callback action: {other}"))),
    }
}

/// Reply text of the form `/note <uuid> <text...>` attaches a note to a
/// reminder. Anything else is not a note command.
fn parse_note_command(text: &str) -> Option<(Uuid, String)> {
    let rest = text.strip_prefix("/note ")?;
    let (id_part, note) = rest.split_once(' ')?;
    let reminder_id: Uuid = id_part.parse().ok()?;
    Some((reminder_id, note.trim().to_string()))
}
