//! Owns the per-actor authoring sessions and commits finished drafts to the store.
//!
//! At most one session per actor; starting a new one discards the old draft.
//! Sessions idle for longer than the TTL are dropped on the next access.

use crate::domain::{
    ActorId, AuthoringSession, DomainError, Draft, EventPayload, Publication, PublicationId, Step,
};
use crate::ports::PublicationStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};

struct TrackedSession {
    session: AuthoringSession,
    touched: Instant,
}

impl TrackedSession {
    fn new(session: AuthoringSession) -> Self {
        Self {
            session,
            touched: Instant::now(),
        }
    }
}

/// What happened after feeding an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    /// The actor has no live session; the event is not for authoring.
    NoSession,
    /// Session still open. `draft` is the state after the step.
    Progress { step: Step, draft: Draft },
    Committed {
        publication: Publication,
        edited: bool,
    },
    Cancelled,
}

pub struct AuthoringService {
    store: Arc<dyn PublicationStore>,
    sessions: Mutex<HashMap<ActorId, TrackedSession>>,
    ttl: Duration,
    reschedule: Arc<Notify>,
}

impl AuthoringService {
    pub fn new(store: Arc<dyn PublicationStore>, ttl: Duration, reschedule: Arc<Notify>) -> Self {
        Self {
            store,
            sessions: Mutex::new(HashMap::new()),
            ttl,
            reschedule,
        }
    }

    fn prune(&self, sessions: &mut HashMap<ActorId, TrackedSession>) {
        let before = sessions.len();
        sessions.retain(|_, t| t.touched.elapsed() < self.ttl);
        let expired = before - sessions.len();
        if expired > 0 {
            debug!(expired, "dropped idle authoring sessions");
        }
    }

    async fn begin(&self, actor: ActorId, session: AuthoringSession) -> bool {
        let mut sessions = self.sessions.lock().await;
        self.prune(&mut sessions);
        let replaced = sessions
            .insert(actor, TrackedSession::new(session))
            .is_some();
        if replaced {
            info!(actor, "previous authoring draft discarded");
        }
        replaced
    }

    /// Start adding a publication. Returns true if an older draft was discarded.
    pub async fn start(&self, actor: ActorId) -> bool {
        self.begin(actor, AuthoringSession::new()).await
    }

    /// Start replacing publication `id`. Returns true if an older draft was discarded.
    pub async fn start_edit(&self, actor: ActorId, id: PublicationId) -> Result<bool, DomainError> {
        let exists = self
            .store
            .list_publications()
            .await?
            .iter()
            .any(|s| s.publication.id == id);
        if !exists {
            return Err(DomainError::NotFound(format!("publication {}", id)));
        }
        Ok(self.begin(actor, AuthoringSession::editing(id)).await)
    }

    /// Drop the actor's session. Returns false if there was none.
    pub async fn cancel(&self, actor: ActorId) -> bool {
        let mut sessions = self.sessions.lock().await;
        self.prune(&mut sessions);
        sessions.remove(&actor).is_some()
    }

    pub async fn has_session(&self, actor: ActorId) -> bool {
        let mut sessions = self.sessions.lock().await;
        self.prune(&mut sessions);
        sessions.contains_key(&actor)
    }

    pub async fn feed(&self, actor: ActorId, payload: &EventPayload) -> Result<Feedback, DomainError> {
        let mut sessions = self.sessions.lock().await;
        self.prune(&mut sessions);
        let Some(tracked) = sessions.get_mut(&actor) else {
            return Ok(Feedback::NoSession);
        };
        tracked.touched = Instant::now();

        match tracked.session.apply(payload) {
            Step::Cancel => {
                sessions.remove(&actor);
                info!(actor, "authoring cancelled");
                Ok(Feedback::Cancelled)
            }
            Step::Finish => {
                let Some(tracked) = sessions.remove(&actor) else {
                    return Err(DomainError::Internal("session vanished during finish".into()));
                };
                drop(sessions);
                self.commit(actor, tracked).await
            }
            step => Ok(Feedback::Progress {
                step,
                draft: tracked.session.draft().clone(),
            }),
        }
    }

    async fn commit(&self, actor: ActorId, tracked: TrackedSession) -> Result<Feedback, DomainError> {
        let target = tracked.session.target().cloned();
        let draft = match tracked.session.clone().into_new_publication() {
            Ok(d) => d,
            Err(e) => {
                error!(actor, error = %e, "authoring finished without a complete draft");
                return Err(e);
            }
        };

        let result = match &target {
            None => self.store.commit_publication(draft).await,
            Some(id) => self.store.update_publication(id, draft).await,
        };

        match result {
            Ok(publication) => {
                info!(actor, publication_id = %publication.id, edited = target.is_some(), "authoring committed");
                self.reschedule.notify_one();
                Ok(Feedback::Committed {
                    publication,
                    edited: target.is_some(),
                })
            }
            Err(e @ DomainError::NotFound(_)) => {
                warn!(actor, error = %e, "edited publication no longer exists; draft discarded");
                Err(e)
            }
            Err(e) => {
                // Keep the draft so the actor can press Finish again, unless they already started over.
                warn!(actor, error = %e, "commit failed; draft kept for retry");
                self.sessions.lock().await.entry(actor).or_insert(tracked);
                Err(e)
            }
        }
    }
}
