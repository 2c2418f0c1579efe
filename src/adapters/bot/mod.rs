//! Bot front end: routes commands, buttons and authoring input to the admin use cases.

pub mod router;
pub mod texts;

pub use router::BotRouter;
