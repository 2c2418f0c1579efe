//! Inbound port. The bot adapter drives the application through it.

use crate::domain::DomainError;

/// Input port: receives inbound events and routes them to use cases.
#[async_trait::async_trait]
pub trait InputPort: Send + Sync {
    /// Run the receive loop until the transport is closed.
    async fn run(&self) -> Result<(), DomainError>;
}
