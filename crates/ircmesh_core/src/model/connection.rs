//! Client connection record.

use super::EntityId;
use crate::extension::{ExtensionKind, Extensible};
use std::collections::BTreeSet;
use uuid::Uuid;

/// One connected client.
#[derive(Debug)]
pub struct Connection {
    id: EntityId,
    nick: String,
    channels: BTreeSet<EntityId>,
    ext: Extensible,
}

impl Connection {
    /// Creates a connection with a generated stable ID.
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            nick: nick.into(),
            channels: BTreeSet::new(),
            ext: Extensible::new(ExtensionKind::Connection),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Channels this connection currently belongs to.
    pub fn channels(&self) -> &BTreeSet<EntityId> {
        &self.channels
    }

    pub(crate) fn channels_mut(&mut self) -> &mut BTreeSet<EntityId> {
        &mut self.channels
    }

    pub fn ext(&self) -> &Extensible {
        &self.ext
    }

    pub fn ext_mut(&mut self) -> &mut Extensible {
        &mut self.ext
    }
}
