//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{
    ButtonAction, DomainError, FireSummary, Group, InboundEvent, MediaKind, NewPublication,
    Publication, PublicationId, ScheduledPublication,
};
use chrono::{DateTime, FixedOffset};

/// Durable store for groups, publications and their schedule entries.
///
/// The only writer of persisted state. Every mutation is atomic: a publication
/// and its schedule entry are created, replaced and removed together.
#[async_trait::async_trait]
pub trait PublicationStore: Send + Sync {
    /// Register a destination. Returns false when the handle was already registered
    /// (its label is refreshed if it changed).
    async fn add_group(&self, group: Group) -> Result<bool, DomainError>;

    /// Unregister a destination. Returns false when it was not registered.
    async fn remove_group(&self, handle: &str) -> Result<bool, DomainError>;

    async fn list_groups(&self) -> Result<Vec<Group>, DomainError>;

    /// Store a new publication with a freshly generated id and an active schedule entry.
    async fn commit_publication(&self, draft: NewPublication) -> Result<Publication, DomainError>;

    /// Replace time and content of an existing publication. The schedule entry is kept.
    async fn update_publication(
        &self,
        id: &PublicationId,
        draft: NewPublication,
    ) -> Result<Publication, DomainError>;

    /// Remove a publication and its schedule entry. Returns false when the id was unknown.
    async fn delete_publication(&self, id: &PublicationId) -> Result<bool, DomainError>;

    async fn set_active(&self, id: &PublicationId, active: bool) -> Result<(), DomainError>;

    async fn list_publications(&self) -> Result<Vec<ScheduledPublication>, DomainError>;

    /// Active publications scheduled at `now`'s minute that have not fired within it.
    ///
    /// Returned publications are claimed (`last_fired = now`) in the same critical
    /// section, so repeated calls within one minute never return an id twice.
    async fn list_due(&self, now: DateTime<FixedOffset>) -> Result<Vec<Publication>, DomainError>;

    /// Record the completion of a dispatch pass.
    async fn mark_fired(
        &self,
        id: &PublicationId,
        when: DateTime<FixedOffset>,
        summary: FireSummary,
    ) -> Result<(), DomainError>;
}

/// Sending side of the messaging transport. Used by dispatch.
#[async_trait::async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text(&self, destination: &str, body: &str) -> Result<(), DomainError>;

    async fn send_media(
        &self,
        destination: &str,
        kind: MediaKind,
        file_id: &str,
        caption: Option<&str>,
    ) -> Result<(), DomainError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub action: ButtonAction,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, action: ButtonAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Conversational side of the transport: receive events, reply, render buttons.
#[async_trait::async_trait]
pub trait BotGateway: Send + Sync {
    /// Wait for the next batch of inbound events (long poll). May return an empty batch.
    async fn next_events(&self) -> Result<Vec<InboundEvent>, DomainError>;

    async fn reply(&self, chat_id: i64, text: &str) -> Result<(), DomainError>;

    /// Send a message with an inline keyboard (one inner Vec per row).
    async fn reply_with_buttons(
        &self,
        chat_id: i64,
        text: &str,
        rows: &[Vec<InlineButton>],
    ) -> Result<(), DomainError>;

    /// Acknowledge a button press so the client stops showing a spinner.
    async fn answer_callback(&self, callback_id: &str) -> Result<(), DomainError>;
}
