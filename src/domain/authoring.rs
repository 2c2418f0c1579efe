//! Authoring conversation: turns a sequence of inbound events into a complete draft.
//!
//! Pure state machine; owning the per-actor table and committing is done by
//! `usecases::AuthoringService`.

use crate::domain::time_of_day::TimeParseError;
use crate::domain::{
    ButtonAction, Content, DomainError, EventPayload, Media, MediaKind, NewPublication,
    PublicationId, TimeOfDay,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthoringState {
    AwaitingText,
    AwaitingTime,
    AwaitingMediaOrFinish,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub body: Option<String>,
    pub time: Option<TimeOfDay>,
    pub media: Vec<Media>,
}

/// Outcome of feeding one event to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Body captured; ask for the time.
    AskTime,
    /// Time accepted; show the recap with media/finish/cancel choices.
    Recap,
    /// Actor asked how to attach media.
    MediaPrompt,
    MediaAdded { kind: MediaKind, count: usize },
    /// Time rejected. The session stays in `AwaitingTime` with its body intact.
    InvalidTime(TimeParseError),
    /// Event does not fit the current state; nothing changed.
    Unexpected { state: AuthoringState },
    /// Draft complete; the caller commits it and drops the session.
    Finish,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoringSession {
    state: AuthoringState,
    draft: Draft,
    /// Publication being replaced when the session edits instead of adding.
    target: Option<PublicationId>,
}

impl AuthoringSession {
    pub fn new() -> Self {
        Self {
            state: AuthoringState::AwaitingText,
            draft: Draft::default(),
            target: None,
        }
    }

    pub fn editing(id: PublicationId) -> Self {
        Self {
            target: Some(id),
            ..Self::new()
        }
    }

    pub fn state(&self) -> AuthoringState {
        self.state
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn target(&self) -> Option<&PublicationId> {
        self.target.as_ref()
    }

    pub fn apply(&mut self, payload: &EventPayload) -> Step {
        if is_cancel(payload) {
            return Step::Cancel;
        }
        match (self.state, payload) {
            (AuthoringState::AwaitingText, EventPayload::Text(text)) => {
                self.draft.body = Some(text.clone());
                self.state = AuthoringState::AwaitingTime;
                Step::AskTime
            }
            (AuthoringState::AwaitingTime, EventPayload::Text(text)) => {
                match TimeOfDay::parse(text) {
                    Ok(time) => {
                        self.draft.time = Some(time);
                        self.state = AuthoringState::AwaitingMediaOrFinish;
                        Step::Recap
                    }
                    Err(e) => Step::InvalidTime(e),
                }
            }
            (AuthoringState::AwaitingMediaOrFinish, EventPayload::Photo(_) | EventPayload::Video(_)) => {
                let Some((kind, file_id)) = payload.media() else {
                    return Step::Unexpected { state: self.state };
                };
                self.draft.media.push(Media {
                    kind,
                    file_id: file_id.to_string(),
                });
                Step::MediaAdded {
                    kind,
                    count: self.draft.media.len(),
                }
            }
            (AuthoringState::AwaitingMediaOrFinish, EventPayload::Button(ButtonAction::AddMedia)) => {
                Step::MediaPrompt
            }
            (AuthoringState::AwaitingMediaOrFinish, p) if is_finish(p) => Step::Finish,
            (state, _) => Step::Unexpected { state },
        }
    }

    /// Converts a finished session into a publication draft. Fails if a step was skipped.
    pub fn into_new_publication(self) -> Result<NewPublication, DomainError> {
        let Draft { body, time, media } = self.draft;
        match (body, time) {
            (Some(body), Some(time)) => Ok(NewPublication {
                time,
                content: Content { body, media },
            }),
            _ => Err(DomainError::Internal(format!(
                "authoring session committed in state {:?} without a complete draft",
                self.state
            ))),
        }
    }
}

impl Default for AuthoringSession {
    fn default() -> Self {
        Self::new()
    }
}

fn is_cancel(payload: &EventPayload) -> bool {
    match payload {
        EventPayload::Button(ButtonAction::Cancel) => true,
        EventPayload::Command { name, .. } => name == "cancel",
        _ => false,
    }
}

fn is_finish(payload: &EventPayload) -> bool {
    match payload {
        EventPayload::Button(ButtonAction::Finish) => true,
        EventPayload::Command { name, .. } => name == "done",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> EventPayload {
        EventPayload::Text(s.into())
    }

    #[test]
    fn happy_path_without_media() {
        let mut s = AuthoringSession::new();
        assert_eq!(s.apply(&text("Hello")), Step::AskTime);
        assert_eq!(s.apply(&text("08:30")), Step::Recap);
        assert_eq!(
            s.apply(&EventPayload::Button(ButtonAction::Finish)),
            Step::Finish
        );
        let p = s.into_new_publication().unwrap();
        assert_eq!(p.content.body, "Hello");
        assert_eq!(p.time.to_string(), "08:30");
        assert!(p.content.media.is_empty());
    }

    #[test]
    fn invalid_time_keeps_state_and_body() {
        let mut s = AuthoringSession::new();
        s.apply(&text("Hello"));
        assert!(matches!(s.apply(&text("25:61")), Step::InvalidTime(_)));
        assert_eq!(s.state(), AuthoringState::AwaitingTime);
        assert_eq!(s.draft().body.as_deref(), Some("Hello"));
        assert_eq!(s.draft().time, None);
        assert_eq!(s.apply(&text("9:05")), Step::Recap);
        assert_eq!(s.draft().time, TimeOfDay::new(9, 5));
    }

    #[test]
    fn media_accumulates_in_order() {
        let mut s = AuthoringSession::new();
        s.apply(&text("Body"));
        s.apply(&text("10:00"));
        assert_eq!(
            s.apply(&EventPayload::Photo("p1".into())),
            Step::MediaAdded {
                kind: MediaKind::Photo,
                count: 1
            }
        );
        assert_eq!(
            s.apply(&EventPayload::Video("v1".into())),
            Step::MediaAdded {
                kind: MediaKind::Video,
                count: 2
            }
        );
        let finish = EventPayload::Command {
            name: "done".into(),
            args: vec![],
        };
        assert_eq!(s.apply(&finish), Step::Finish);
        let p = s.into_new_publication().unwrap();
        let ids: Vec<_> = p.content.media.iter().map(|m| m.file_id.as_str()).collect();
        assert_eq!(ids, ["p1", "v1"]);
    }

    #[test]
    fn unexpected_events_do_not_advance() {
        let mut s = AuthoringSession::new();
        assert_eq!(
            s.apply(&EventPayload::Photo("p".into())),
            Step::Unexpected {
                state: AuthoringState::AwaitingText
            }
        );
        assert_eq!(s.state(), AuthoringState::AwaitingText);

        s.apply(&text("Body"));
        assert_eq!(
            s.apply(&EventPayload::Button(ButtonAction::Finish)),
            Step::Unexpected {
                state: AuthoringState::AwaitingTime
            }
        );
        s.apply(&text("10:00"));
        let before = s.clone();
        assert_eq!(
            s.apply(&text("more text")),
            Step::Unexpected {
                state: AuthoringState::AwaitingMediaOrFinish
            }
        );
        assert_eq!(s, before);
    }

    #[test]
    fn cancel_from_any_state() {
        let cancel_cmd = EventPayload::Command {
            name: "cancel".into(),
            args: vec![],
        };
        let mut s = AuthoringSession::new();
        assert_eq!(s.apply(&cancel_cmd), Step::Cancel);
        s.apply(&text("Body"));
        assert_eq!(s.apply(&EventPayload::Button(ButtonAction::Cancel)), Step::Cancel);
        s.apply(&text("10:00"));
        assert_eq!(s.apply(&cancel_cmd), Step::Cancel);
    }

    #[test]
    fn incomplete_draft_is_an_internal_error() {
        let mut s = AuthoringSession::new();
        s.apply(&text("Body"));
        assert!(matches!(
            s.into_new_publication(),
            Err(DomainError::Internal(_))
        ));
    }

    #[test]
    fn editing_keeps_target() {
        let s = AuthoringSession::editing(PublicationId::from_sequence(5));
        assert_eq!(s.target(), Some(&PublicationId::from_sequence(5)));
        assert_eq!(s.state(), AuthoringState::AwaitingText);
    }
}
