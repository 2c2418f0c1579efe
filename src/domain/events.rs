//! Inbound events, already stripped of transport envelope details.

use crate::domain::{ActorId, MediaKind, PublicationId};

/// Where an event came from: the chat it was sent in and who sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub actor: ActorId,
    pub chat_id: i64,
    /// Chat title for groups/channels; None in private chats.
    pub chat_title: Option<String>,
    /// Set for button presses; the transport expects them to be acknowledged.
    pub callback_id: Option<String>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    Text(String),
    Photo(String),
    Video(String),
    Button(ButtonAction),
    /// `/name arg1 arg2`. `name` is lowercase without the slash or `@botname` suffix.
    Command { name: String, args: Vec<String> },
}

impl EventPayload {
    pub fn media(&self) -> Option<(MediaKind, &str)> {
        match self {
            EventPayload::Photo(id) => Some((MediaKind::Photo, id)),
            EventPayload::Video(id) => Some((MediaKind::Video, id)),
            _ => None,
        }
    }
}

/// Inline keyboard actions. Encoded into callback data and decoded back by the transport mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    ListPublications,
    AddPublication,
    EditMenu,
    DeleteMenu,
    ToggleMenu,
    Stats,
    AddMedia,
    Finish,
    Cancel,
    Edit(PublicationId),
    Delete(PublicationId),
    Toggle(PublicationId),
    Unknown(String),
}

impl ButtonAction {
    /// Callback data string. Telegram caps callback data at 64 bytes; ids stay well below.
    pub fn encode(&self) -> String {
        match self {
            ButtonAction::ListPublications => "admin_list".into(),
            ButtonAction::AddPublication => "admin_add".into(),
            ButtonAction::EditMenu => "admin_edit".into(),
            ButtonAction::DeleteMenu => "admin_delete".into(),
            ButtonAction::ToggleMenu => "admin_toggle".into(),
            ButtonAction::Stats => "admin_stats".into(),
            ButtonAction::AddMedia => "admin_addmedia".into(),
            ButtonAction::Finish => "admin_confirmadd".into(),
            ButtonAction::Cancel => "admin_cancel".into(),
            ButtonAction::Edit(id) => format!("edit:{}", id),
            ButtonAction::Delete(id) => format!("delete:{}", id),
            ButtonAction::Toggle(id) => format!("toggle:{}", id),
            ButtonAction::Unknown(raw) => raw.clone(),
        }
    }

    pub fn decode(data: &str) -> Self {
        match data {
            "admin_list" => return ButtonAction::ListPublications,
            "admin_add" => return ButtonAction::AddPublication,
            "admin_edit" => return ButtonAction::EditMenu,
            "admin_delete" => return ButtonAction::DeleteMenu,
            "admin_toggle" => return ButtonAction::ToggleMenu,
            "admin_stats" => return ButtonAction::Stats,
            "admin_addmedia" => return ButtonAction::AddMedia,
            "admin_confirmadd" => return ButtonAction::Finish,
            "admin_cancel" => return ButtonAction::Cancel,
            _ => {}
        }
        match data.split_once(':') {
            Some(("edit", id)) if !id.is_empty() => ButtonAction::Edit(id.into()),
            Some(("delete", id)) if !id.is_empty() => ButtonAction::Delete(id.into()),
            Some(("toggle", id)) if !id.is_empty() => ButtonAction::Toggle(id.into()),
            _ => ButtonAction::Unknown(data.to_string()),
        }
    }
}
