//! Map Bot API updates to domain events.
//!
//! Only the fields the bot uses are modelled; everything else in the update is ignored.

use crate::domain::{ButtonAction, EventPayload, InboundEvent};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<TgMessage>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgMessage {
    pub message_id: i64,
    pub from: Option<TgUser>,
    pub chat: TgChat,
    pub text: Option<String>,
    pub photo: Option<Vec<PhotoSize>>,
    pub video: Option<FileRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUser {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgChat {
    pub id: i64,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileRef {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: TgUser,
    pub message: Option<TgMessage>,
    pub data: Option<String>,
}

/// Map one update to an event. Returns None for updates the bot does not handle
/// (edits, stickers, anonymous senders, ...).
pub fn update_to_event(update: &Update) -> Option<InboundEvent> {
    if let Some(cb) = &update.callback_query {
        let chat_id = cb.message.as_ref().map_or(cb.from.id, |m| m.chat.id);
        return Some(InboundEvent {
            actor: cb.from.id,
            chat_id,
            chat_title: cb.message.as_ref().and_then(|m| m.chat.title.clone()),
            callback_id: Some(cb.id.clone()),
            payload: EventPayload::Button(ButtonAction::decode(cb.data.as_deref().unwrap_or(""))),
        });
    }

    let msg = update.message.as_ref()?;
    let actor = msg.from.as_ref()?.id;
    let payload = message_payload(msg)?;
    Some(InboundEvent {
        actor,
        chat_id: msg.chat.id,
        chat_title: msg.chat.title.clone(),
        callback_id: None,
        payload,
    })
}

fn message_payload(msg: &TgMessage) -> Option<EventPayload> {
    if let Some(sizes) = &msg.photo {
        // Telegram sends several resolutions of the same photo; keep the largest.
        let largest = sizes
            .iter()
            .max_by_key(|p| u64::from(p.width) * u64::from(p.height))?;
        return Some(EventPayload::Photo(largest.file_id.clone()));
    }
    if let Some(video) = &msg.video {
        return Some(EventPayload::Video(video.file_id.clone()));
    }
    let text = msg.text.as_ref()?;
    Some(parse_command(text).unwrap_or_else(|| EventPayload::Text(text.clone())))
}

/// `/Name@bot arg1 arg2` -> Command { name: "name", args: ["arg1", "arg2"] }.
fn parse_command(text: &str) -> Option<EventPayload> {
    let rest = text.strip_prefix('/')?;
    let mut parts = rest.split_whitespace();
    let head = parts.next()?;
    let name = head.split('@').next().unwrap_or(head).to_lowercase();
    if name.is_empty() {
        return None;
    }
    Some(EventPayload::Command {
        name,
        args: parts.map(String::from).collect(),
    })
}
