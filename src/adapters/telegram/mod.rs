//! Telegram Bot API transport.

pub mod client;
pub mod mapper;
#[cfg(test)]
pub mod mock_gateway;

pub use client::BotApiGateway;
#[cfg(test)]
pub use mock_gateway::{RecordingGateway, Sent};
