//! Domain entities. Pure data structures for the core business.
//!
//! No Telegram or IO types here; adapters map into these.

use crate::domain::TimeOfDay;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Telegram user id of whoever sent an inbound event.
pub type ActorId = i64;

/// A registered broadcast destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Opaque destination handle the transport understands (chat id or `@channel`).
    pub handle: String,
    pub label: String,
}

/// Unique publication id, `pub_<unix millis>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicationId(String);

impl PublicationId {
    const PREFIX: &'static str = "pub_";

    pub fn from_sequence(seq: u64) -> Self {
        Self(format!("{}{}", Self::PREFIX, seq))
    }

    /// Numeric part of the id. None for ids not produced by `from_sequence`.
    pub fn sequence(&self) -> Option<u64> {
        self.0.strip_prefix(Self::PREFIX)?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PublicationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for PublicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Photo => f.write_str("photo"),
            MediaKind::Video => f.write_str("video"),
        }
    }
}

/// Media attachment. `file_id` is the transport's opaque handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub file_id: String,
}

/// What gets delivered: text body plus ordered attachments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub body: String,
    #[serde(default)]
    pub media: Vec<Media>,
}

impl Content {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            media: Vec::new(),
        }
    }
}

/// Committed, schedulable publication. Persisted as `{id, time, body, media[]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub id: PublicationId,
    pub time: TimeOfDay,
    #[serde(flatten)]
    pub content: Content,
}

/// Fully assembled draft, ready to be committed or to replace an existing publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPublication {
    pub time: TimeOfDay,
    pub content: Content,
}

/// Delivered/failed counts of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireSummary {
    pub delivered: usize,
    pub failed: usize,
}

/// Activation and firing history, paired one-to-one with a Publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub active: bool,
    pub last_fired: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<FireSummary>,
}

impl Default for ScheduleEntry {
    fn default() -> Self {
        Self {
            active: true,
            last_fired: None,
            last_result: None,
        }
    }
}

impl ScheduleEntry {
    /// True when `last_fired` falls in the same wall-clock minute as `now` (in `now`'s zone).
    pub fn fired_within_minute_of(&self, now: &DateTime<FixedOffset>) -> bool {
        self.last_fired.is_some_and(|last| {
            let last = last.with_timezone(&now.timezone());
            last.date_naive() == now.date_naive() && TimeOfDay::of(&last) == TimeOfDay::of(now)
        })
    }
}

/// A publication together with its schedule metadata, as listed to admins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledPublication {
    pub publication: Publication,
    pub schedule: ScheduleEntry,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn publication_serializes_flat() {
        let p = Publication {
            id: PublicationId::from_sequence(42),
            time: TimeOfDay::new(8, 30).unwrap(),
            content: Content {
                body: "Hello".into(),
                media: vec![Media {
                    kind: MediaKind::Video,
                    file_id: "vid-1".into(),
                }],
            },
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "id": "pub_42",
                "time": "08:30",
                "body": "Hello",
                "media": [{"type": "video", "file_id": "vid-1"}]
            })
        );
        let back: Publication = serde_json::from_value(v).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn id_sequence() {
        assert_eq!(PublicationId::from_sequence(7).sequence(), Some(7));
        assert_eq!(PublicationId::from("pub_1700000000.123").sequence(), None);
        assert_eq!(PublicationId::from("other").sequence(), None);
    }

    #[test]
    fn fired_within_minute_compares_date_and_minute() {
        let entry = ScheduleEntry {
            last_fired: Some(at("2026-03-01T08:30:05+00:00")),
            ..ScheduleEntry::default()
        };
        assert!(entry.fired_within_minute_of(&at("2026-03-01T08:30:55+00:00")));
        assert!(!entry.fired_within_minute_of(&at("2026-03-01T08:31:00+00:00")));
        assert!(!entry.fired_within_minute_of(&at("2026-03-02T08:30:00+00:00")));
        // Same instant seen from another zone is still the same minute.
        assert!(entry.fired_within_minute_of(&at("2026-03-01T10:30:40+02:00")));
        assert!(!ScheduleEntry::default().fired_within_minute_of(&at("2026-03-01T08:30:00+00:00")));
    }
}
