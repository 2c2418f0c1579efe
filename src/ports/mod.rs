//! Port traits. API boundaries for the hexagon.
//!
//! - Inbound: Called by the bot adapter into the application
//! - Outbound: Called by application into infrastructure

pub mod access;
pub mod inbound;
pub mod outbound;

pub use access::AccessPolicy;
pub use inbound::InputPort;
pub use outbound::{BotGateway, InlineButton, MessageSender, PublicationStore};
