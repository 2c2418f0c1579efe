//! In-memory transport used by the unit tests.
//!
//! Records everything sent; destinations can be made to fail or to stall.

use crate::domain::{DomainError, InboundEvent, MediaKind};
use crate::ports::{BotGateway, InlineButton, MessageSender};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        destination: String,
        body: String,
    },
    Media {
        destination: String,
        kind: MediaKind,
        file_id: String,
        caption: Option<String>,
    },
    Reply {
        chat_id: i64,
        text: String,
    },
    Buttons {
        chat_id: i64,
        text: String,
        rows: Vec<Vec<InlineButton>>,
    },
    CallbackAnswer(String),
}

#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<Sent>>,
    failing: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    inbox: Mutex<VecDeque<Vec<InboundEvent>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send to `destination` fails from now on.
    pub fn fail_destination(&self, destination: &str) {
        lock(&self.failing).insert(destination.to_string());
    }

    /// Every send to `destination` sleeps for `delay` first.
    pub fn delay_destination(&self, destination: &str, delay: Duration) {
        lock(&self.delays).insert(destination.to_string(), delay);
    }

    /// Queue a batch for `next_events`.
    pub fn push_events(&self, events: Vec<InboundEvent>) {
        lock(&self.inbox).push_back(events);
    }

    pub fn sent(&self) -> Vec<Sent> {
        lock(&self.sent).clone()
    }

    /// Texts of replies (with or without buttons) sent to `chat_id`.
    pub fn replies_to(&self, chat_id: i64) -> Vec<String> {
        lock(&self.sent)
            .iter()
            .filter_map(|s| match s {
                Sent::Reply { chat_id: c, text } | Sent::Buttons { chat_id: c, text, .. }
                    if *c == chat_id =>
                {
                    Some(text.clone())
                }
                _ => None,
            })
            .collect()
    }

    async fn deliver(&self, destination: &str, record: Sent) -> Result<(), DomainError> {
        let delay = lock(&self.delays).get(destination).copied();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if lock(&self.failing).contains(destination) {
            return Err(DomainError::Transport(format!(
                "destination {} rejected the message",
                destination
            )));
        }
        lock(&self.sent).push(record);
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessageSender for RecordingGateway {
    async fn send_text(&self, destination: &str, body: &str) -> Result<(), DomainError> {
        self.deliver(
            destination,
            Sent::Text {
                destination: destination.to_string(),
                body: body.to_string(),
            },
        )
        .await
    }

    async fn send_media(
        &self,
        destination: &str,
        kind: MediaKind,
        file_id: &str,
        caption: Option<&str>,
    ) -> Result<(), DomainError> {
        self.deliver(
            destination,
            Sent::Media {
                destination: destination.to_string(),
                kind,
                file_id: file_id.to_string(),
                caption: caption.map(String::from),
            },
        )
        .await
    }
}

#[async_trait::async_trait]
impl BotGateway for RecordingGateway {
    async fn next_events(&self) -> Result<Vec<InboundEvent>, DomainError> {
        let batch = lock(&self.inbox).pop_front();
        match batch {
            Some(events) => Ok(events),
            None => {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn reply(&self, chat_id: i64, text: &str) -> Result<(), DomainError> {
        lock(&self.sent).push(Sent::Reply {
            chat_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn reply_with_buttons(
        &self,
        chat_id: i64,
        text: &str,
        rows: &[Vec<InlineButton>],
    ) -> Result<(), DomainError> {
        lock(&self.sent).push(Sent::Buttons {
            chat_id,
            text: text.to_string(),
            rows: rows.to_vec(),
        });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), DomainError> {
        lock(&self.sent).push(Sent::CallbackAnswer(callback_id.to_string()));
        Ok(())
    }
}
