//! Implements AccessPolicy with a fixed list of admin user ids from configuration.

use crate::domain::ActorId;
use crate::ports::AccessPolicy;
use std::collections::HashSet;

pub struct StaticAdminList {
    admins: HashSet<ActorId>,
}

impl StaticAdminList {
    pub fn new(admins: impl IntoIterator<Item = ActorId>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }
}

impl AccessPolicy for StaticAdminList {
    fn is_privileged(&self, actor: ActorId) -> bool {
        self.admins.contains(&actor)
    }
}
