//! Authorization outbound port.

use crate::domain::ActorId;

/// Decides whether an actor may run admin-only operations
/// (publication management, manual publish, group management).
pub trait AccessPolicy: Send + Sync {
    fn is_privileged(&self, actor: ActorId) -> bool;
}
