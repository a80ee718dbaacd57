//! Long-lived entities that carry extension data.
//!
//! # Responsibility
//! - Define the connection and channel records the daemon keeps alive.
//! - Give every entity one embedded `Extensible` and a stable `EntityId`.
//!
//! # Invariants
//! - Every entity is identified by an `EntityId` that is never reused.
//! - Entities are culled (attachments released) before they are freed.

pub mod channel;
pub mod connection;

use crate::extension::Extensible;
use crate::lifecycle::{CullResult, Cullable};
use uuid::Uuid;

pub use channel::Channel;
pub use connection::Connection;

/// Stable identifier for connections and channels.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type EntityId = Uuid;

/// Any entity that can sit on the pending-release queue.
#[derive(Debug)]
pub enum Entity {
    Connection(Connection),
    Channel(Channel),
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Self::Connection(connection) => connection.id(),
            Self::Channel(channel) => channel.id(),
        }
    }

    pub fn ext(&self) -> &Extensible {
        match self {
            Self::Connection(connection) => connection.ext(),
            Self::Channel(channel) => channel.ext(),
        }
    }

    pub fn ext_mut(&mut self) -> &mut Extensible {
        match self {
            Self::Connection(connection) => connection.ext_mut(),
            Self::Channel(channel) => channel.ext_mut(),
        }
    }
}

impl Cullable for Entity {
    fn cull(&mut self) -> CullResult {
        self.ext_mut().cull()
    }
}
