//! Channel record.

use super::EntityId;
use crate::extension::{ExtensionKind, Extensible};
use std::collections::BTreeSet;
use uuid::Uuid;

/// One channel and its member set.
#[derive(Debug)]
pub struct Channel {
    id: EntityId,
    name: String,
    members: BTreeSet<EntityId>,
    ext: Extensible,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            members: BTreeSet::new(),
            ext: Extensible::new(ExtensionKind::Channel),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &BTreeSet<EntityId> {
        &self.members
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn members_mut(&mut self) -> &mut BTreeSet<EntityId> {
        &mut self.members
    }

    pub fn ext(&self) -> &Extensible {
        &self.ext
    }

    pub fn ext_mut(&mut self) -> &mut Extensible {
        &mut self.ext
    }
}
