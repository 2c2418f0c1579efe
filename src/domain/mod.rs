//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod authoring;
pub mod entities;
pub mod errors;
pub mod events;
pub mod time_of_day;

pub use authoring::{AuthoringSession, AuthoringState, Draft, Step};
pub use entities::{
    ActorId, Content, FireSummary, Group, Media, MediaKind, NewPublication, Publication,
    PublicationId, ScheduleEntry, ScheduledPublication,
};
pub use errors::DomainError;
pub use events::{ButtonAction, EventPayload, InboundEvent};
pub use time_of_day::{TimeOfDay, TimeParseError};
