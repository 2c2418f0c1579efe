//! Command surface offered to the bot router. Admin-only operations are gated here.

use crate::domain::{
    ActorId, Content, DomainError, EventPayload, FireSummary, Group, Media, PublicationId,
    ScheduledPublication,
};
use crate::ports::{AccessPolicy, PublicationStore};
use crate::usecases::authoring_service::{AuthoringService, Feedback};
use crate::usecases::dispatch_service::{DispatchReport, DispatchService};
use chrono::{DateTime, FixedOffset};
use std::sync::Arc;
use tracing::{info, warn};

/// Snapshot for the statistics view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub groups: usize,
    pub publications: usize,
    pub active: usize,
    pub last_fires: Vec<LastFire>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastFire {
    pub id: PublicationId,
    pub when: Option<DateTime<FixedOffset>>,
    pub result: Option<FireSummary>,
}

pub struct AdminService {
    store: Arc<dyn PublicationStore>,
    dispatcher: Arc<DispatchService>,
    authoring: Arc<AuthoringService>,
    access: Arc<dyn AccessPolicy>,
}

impl AdminService {
    pub fn new(
        store: Arc<dyn PublicationStore>,
        dispatcher: Arc<DispatchService>,
        authoring: Arc<AuthoringService>,
        access: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            authoring,
            access,
        }
    }

    pub fn is_privileged(&self, actor: ActorId) -> bool {
        self.access.is_privileged(actor)
    }

    fn authorize(&self, actor: ActorId) -> Result<(), DomainError> {
        if self.access.is_privileged(actor) {
            Ok(())
        } else {
            warn!(actor, "rejected admin operation");
            Err(DomainError::Unauthorized)
        }
    }

    pub async fn start_authoring(&self, actor: ActorId) -> Result<bool, DomainError> {
        self.authorize(actor)?;
        Ok(self.authoring.start(actor).await)
    }

    pub async fn start_editing(&self, actor: ActorId, id: PublicationId) -> Result<bool, DomainError> {
        self.authorize(actor)?;
        self.authoring.start_edit(actor, id).await
    }

    /// Sessions only exist for actors that passed `authorize` when starting them.
    pub async fn feed_event(&self, actor: ActorId, payload: &EventPayload) -> Result<Feedback, DomainError> {
        self.authoring.feed(actor, payload).await
    }

    pub async fn cancel_authoring(&self, actor: ActorId) -> bool {
        self.authoring.cancel(actor).await
    }

    pub async fn list_publications(&self, actor: ActorId) -> Result<Vec<ScheduledPublication>, DomainError> {
        self.authorize(actor)?;
        self.store.list_publications().await
    }

    pub async fn delete_publication(&self, actor: ActorId, id: &PublicationId) -> Result<bool, DomainError> {
        self.authorize(actor)?;
        let removed = self.store.delete_publication(id).await?;
        if removed {
            info!(actor, publication_id = %id, "publication deleted");
        }
        Ok(removed)
    }

    pub async fn toggle_active(
        &self,
        actor: ActorId,
        id: &PublicationId,
        active: bool,
    ) -> Result<(), DomainError> {
        self.authorize(actor)?;
        self.store.set_active(id, active).await?;
        info!(actor, publication_id = %id, active, "publication toggled");
        Ok(())
    }

    pub async fn add_group(&self, actor: ActorId, handle: &str, label: &str) -> Result<bool, DomainError> {
        self.authorize(actor)?;
        let handle = handle.trim();
        if handle.is_empty() {
            return Err(DomainError::InvalidInput("group handle is empty".into()));
        }
        let label = match label.trim() {
            "" => handle,
            l => l,
        };
        let added = self
            .store
            .add_group(Group {
                handle: handle.to_string(),
                label: label.to_string(),
            })
            .await?;
        info!(actor, group = handle, added, "group registered");
        Ok(added)
    }

    pub async fn remove_group(&self, actor: ActorId, handle: &str) -> Result<bool, DomainError> {
        self.authorize(actor)?;
        let removed = self.store.remove_group(handle.trim()).await?;
        info!(actor, group = handle, removed, "group unregistered");
        Ok(removed)
    }

    pub async fn list_groups(&self, actor: ActorId) -> Result<Vec<Group>, DomainError> {
        self.authorize(actor)?;
        self.store.list_groups().await
    }

    /// Dispatch immediately to the live group list. Nothing is persisted.
    pub async fn publish_now(
        &self,
        actor: ActorId,
        body: &str,
        media: Vec<Media>,
    ) -> Result<DispatchReport, DomainError> {
        self.authorize(actor)?;
        if body.trim().is_empty() && media.is_empty() {
            return Err(DomainError::InvalidInput("nothing to publish".into()));
        }
        let content = Content {
            body: body.to_string(),
            media,
        };
        let report = self.dispatcher.dispatch(&content).await?;
        info!(
            actor,
            delivered = report.delivered(),
            failed = report.failed(),
            "immediate publication sent"
        );
        Ok(report)
    }

    pub async fn stats(&self, actor: ActorId) -> Result<Stats, DomainError> {
        self.authorize(actor)?;
        let groups = self.store.list_groups().await?.len();
        let publications = self.store.list_publications().await?;
        Ok(Stats {
            groups,
            publications: publications.len(),
            active: publications.iter().filter(|s| s.schedule.active).count(),
            last_fires: publications
                .into_iter()
                .map(|s| LastFire {
                    id: s.publication.id,
                    when: s.schedule.last_fired,
                    result: s.schedule.last_result,
                })
                .collect(),
        })
    }
}
