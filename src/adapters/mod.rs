//! Infrastructure adapters. Implement outbound ports.
//!
//! Telegram transport, JSON persistence, access control and the bot router.
//! Map errors to DomainError.

pub mod access;
pub mod bot;
pub mod persistence;
pub mod telegram;
