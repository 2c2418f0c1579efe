//! Command router: turns inbound events into admin operations and replies.

use crate::adapters::bot::texts;
use crate::domain::{ActorId, ButtonAction, DomainError, EventPayload, InboundEvent, Step};
use crate::ports::{BotGateway, InputPort};
use crate::usecases::{AdminService, Feedback};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pause after a failed poll before asking the transport again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

pub struct BotRouter {
    gateway: Arc<dyn BotGateway>,
    admin: Arc<AdminService>,
}

impl BotRouter {
    pub fn new(gateway: Arc<dyn BotGateway>, admin: Arc<AdminService>) -> Self {
        Self { gateway, admin }
    }

    /// Handle one event. Operation errors become replies; only reply failures propagate.
    pub async fn handle_event(&self, event: &InboundEvent) -> Result<(), DomainError> {
        if let Some(id) = &event.callback_id {
            if let Err(e) = self.gateway.answer_callback(id).await {
                debug!(error = %e, "callback acknowledgement failed");
            }
        }

        let outcome = match &event.payload {
            EventPayload::Command { name, args } => self.on_command(event, name, args).await,
            EventPayload::Button(action) => self.on_button(event, action).await,
            _ => self.on_authoring(event).await,
        };
        match outcome {
            Ok(()) => Ok(()),
            Err(e) => self.report(event.chat_id, e).await,
        }
    }

    async fn report(&self, chat_id: i64, e: DomainError) -> Result<(), DomainError> {
        let text = match &e {
            DomainError::Unauthorized => texts::ACCESS_DENIED.to_string(),
            DomainError::InvalidInput(_) | DomainError::NotFound(_) => format!("❌ {}", e),
            _ => {
                error!(chat_id, error = %e, "command failed");
                texts::GENERIC_ERROR.to_string()
            }
        };
        self.gateway.reply(chat_id, &text).await
    }

    async fn on_command(
        &self,
        event: &InboundEvent,
        name: &str,
        args: &[String],
    ) -> Result<(), DomainError> {
        let (actor, chat) = (event.actor, event.chat_id);
        match name {
            "start" | "help" => self.gateway.reply(chat, texts::HELP).await,
            "admin" => {
                if !self.admin.is_privileged(actor) {
                    return Err(DomainError::Unauthorized);
                }
                self.gateway
                    .reply_with_buttons(chat, texts::ADMIN_PANEL, &texts::admin_panel())
                    .await
            }
            "addgroup" | "ajouter" => {
                let (handle, label) = match args.split_first() {
                    Some((handle, rest)) => (handle.clone(), rest.join(" ")),
                    None => (
                        chat.to_string(),
                        event.chat_title.clone().unwrap_or_default(),
                    ),
                };
                let text = if self.admin.add_group(actor, &handle, &label).await? {
                    format!("✅ Group {} registered.", handle)
                } else {
                    format!("Group {} is already registered.", handle)
                };
                self.gateway.reply(chat, &text).await
            }
            "removegroup" | "supprimer" => {
                let handle = args.first().cloned().unwrap_or_else(|| chat.to_string());
                let text = if self.admin.remove_group(actor, &handle).await? {
                    format!("✅ Group {} removed.", handle)
                } else {
                    format!("Group {} was not registered.", handle)
                };
                self.gateway.reply(chat, &text).await
            }
            "groups" | "liste" => {
                let groups = self.admin.list_groups(actor).await?;
                self.gateway.reply(chat, &texts::group_list(&groups)).await
            }
            "schedule" | "programmer" => self.begin_authoring(event).await,
            "publish" | "publier" => {
                if !self.admin.is_privileged(actor) {
                    return Err(DomainError::Unauthorized);
                }
                let body = args.join(" ");
                if body.trim().is_empty() {
                    return self.gateway.reply(chat, texts::PUBLISH_USAGE).await;
                }
                self.spawn_publish(actor, chat, body);
                Ok(())
            }
            "cancel" | "done" => self.on_authoring(event).await,
            other => {
                debug!(command = other, actor, "ignoring unknown command");
                Ok(())
            }
        }
    }

    async fn on_button(&self, event: &InboundEvent, action: &ButtonAction) -> Result<(), DomainError> {
        let (actor, chat) = (event.actor, event.chat_id);
        match action {
            ButtonAction::ListPublications => {
                let list = self.admin.list_publications(actor).await?;
                self.gateway.reply(chat, &texts::publication_list(&list)).await
            }
            ButtonAction::AddPublication => self.begin_authoring(event).await,
            ButtonAction::EditMenu | ButtonAction::DeleteMenu | ButtonAction::ToggleMenu => {
                let list = self.admin.list_publications(actor).await?;
                if list.is_empty() {
                    return self.gateway.reply(chat, texts::NO_PUBLICATIONS).await;
                }
                let (prompt, rows) = match action {
                    ButtonAction::EditMenu => (
                        "Choose a publication to edit:",
                        texts::publication_buttons(&list, ButtonAction::Edit),
                    ),
                    ButtonAction::DeleteMenu => (
                        "Choose a publication to delete:",
                        texts::publication_buttons(&list, ButtonAction::Delete),
                    ),
                    _ => (
                        "Choose a publication to activate or pause:",
                        texts::publication_buttons(&list, ButtonAction::Toggle),
                    ),
                };
                self.gateway.reply_with_buttons(chat, prompt, &rows).await
            }
            ButtonAction::Stats => {
                let stats = self.admin.stats(actor).await?;
                self.gateway.reply(chat, &texts::stats(&stats)).await
            }
            ButtonAction::AddMedia | ButtonAction::Finish | ButtonAction::Cancel => {
                self.on_authoring(event).await
            }
            ButtonAction::Edit(id) => {
                self.admin.start_editing(actor, id.clone()).await?;
                self.gateway
                    .reply(chat, &format!("✏️ Editing {}. {}", id, texts::ASK_BODY))
                    .await
            }
            ButtonAction::Delete(id) => {
                let text = if self.admin.delete_publication(actor, id).await? {
                    format!("🗑 Publication {} deleted.", id)
                } else {
                    format!("Publication {} no longer exists.", id)
                };
                self.gateway.reply(chat, &text).await
            }
            ButtonAction::Toggle(id) => {
                let current = self
                    .admin
                    .list_publications(actor)
                    .await?
                    .into_iter()
                    .find(|s| &s.publication.id == id)
                    .ok_or_else(|| DomainError::NotFound(format!("publication {}", id)))?;
                let active = !current.schedule.active;
                self.admin.toggle_active(actor, id, active).await?;
                let state = if active { "active" } else { "paused" };
                self.gateway
                    .reply(chat, &format!("Publication {} is now {}.", id, state))
                    .await
            }
            ButtonAction::Unknown(data) => {
                warn!(actor, data = %data, "unknown button payload");
                self.gateway.reply(chat, texts::UNKNOWN_ACTION).await
            }
        }
    }

    /// Broadcast in the background so other actors keep being served during the pass.
    fn spawn_publish(&self, actor: ActorId, chat: i64, body: String) {
        let admin = Arc::clone(&self.admin);
        let gateway = Arc::clone(&self.gateway);
        tokio::spawn(async move {
            let text = match admin.publish_now(actor, &body, Vec::new()).await {
                Ok(report) => texts::published_now(&body, &report),
                Err(DomainError::Unauthorized) => texts::ACCESS_DENIED.to_string(),
                Err(e @ DomainError::InvalidInput(_)) => format!("❌ {}", e),
                Err(e) => {
                    error!(chat_id = chat, error = %e, "immediate publication failed");
                    texts::GENERIC_ERROR.to_string()
                }
            };
            if let Err(e) = gateway.reply(chat, &text).await {
                warn!(chat_id = chat, error = %e, "reply failed");
            }
        });
    }

    async fn begin_authoring(&self, event: &InboundEvent) -> Result<(), DomainError> {
        let replaced = self.admin.start_authoring(event.actor).await?;
        let text = if replaced {
            format!("Previous draft discarded.\n{}", texts::ASK_BODY)
        } else {
            texts::ASK_BODY.to_string()
        };
        self.gateway.reply(event.chat_id, &text).await
    }

    async fn on_authoring(&self, event: &InboundEvent) -> Result<(), DomainError> {
        let chat = event.chat_id;
        match self.admin.feed_event(event.actor, &event.payload).await? {
            Feedback::NoSession => match &event.payload {
                EventPayload::Button(ButtonAction::Cancel) => {
                    self.gateway.reply(chat, texts::CANCELLED).await
                }
                EventPayload::Command { .. } | EventPayload::Button(_) => {
                    self.gateway.reply(chat, texts::NO_DRAFT).await
                }
                // Ordinary chat traffic in registered groups lands here.
                _ => Ok(()),
            },
            Feedback::Progress { step, draft } => match step {
                Step::AskTime => self.gateway.reply(chat, texts::ASK_TIME).await,
                Step::Recap => {
                    self.gateway
                        .reply_with_buttons(chat, &texts::recap(&draft), &texts::recap_buttons())
                        .await
                }
                Step::MediaPrompt => self.gateway.reply(chat, texts::MEDIA_PROMPT).await,
                Step::MediaAdded { kind, count } => {
                    self.gateway
                        .reply(chat, &texts::media_added(kind, count))
                        .await
                }
                Step::InvalidTime(e) => self.gateway.reply(chat, &texts::invalid_time(&e)).await,
                Step::Unexpected { state } => {
                    self.gateway.reply(chat, &texts::unexpected(state)).await
                }
                Step::Finish | Step::Cancel => Ok(()),
            },
            Feedback::Committed {
                publication,
                edited,
            } => {
                self.gateway
                    .reply(chat, &texts::committed(&publication, edited))
                    .await
            }
            Feedback::Cancelled => self.gateway.reply(chat, texts::CANCELLED).await,
        }
    }
}

#[async_trait::async_trait]
impl InputPort for BotRouter {
    async fn run(&self) -> Result<(), DomainError> {
        info!("bot router listening for updates");
        loop {
            let events = match self.gateway.next_events().await {
                Ok(events) => events,
                Err(e) => {
                    warn!(error = %e, "polling failed; retrying");
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                    continue;
                }
            };
            for event in &events {
                if let Err(e) = self.handle_event(event).await {
                    warn!(actor = event.actor, chat_id = event.chat_id, error = %e, "reply failed");
                }
            }
        }
    }
}
