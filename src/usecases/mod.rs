//! Application use cases. Orchestrate domain logic via ports.

pub mod admin_service;
pub mod authoring_service;
pub mod dispatch_service;
pub mod scheduler_service;

pub use admin_service::{AdminService, LastFire, Stats};
pub use authoring_service::{AuthoringService, Feedback};
pub use dispatch_service::{DeliveryOutcome, DeliveryStatus, DispatchReport, DispatchService};
pub use scheduler_service::SchedulerService;
