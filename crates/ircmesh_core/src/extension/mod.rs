//! Extensible entities and their typed attachment descriptors.
//!
//! # Responsibility
//! - Let components attach typed data to connections and channels without
//!   those entities knowing the data's type.
//! - Provide the human/internal/network text forms used for display,
//!   persistence and replication.
//! - Keep a registry of descriptors so that names received from peers or
//!   from storage resolve to the right descriptor.
//!
//! # Invariants
//! - Only the descriptor that stored a value ever downcasts it.
//! - A descriptor name is registered at most once at a time.
//! - An entity releases every attached value through the owning descriptor
//!   before it is freed.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod extensible;
pub mod item;
pub mod kind;
pub mod registry;
pub mod sync;
pub mod typed;

pub use extensible::Extensible;
pub use item::{validate_item_name, ExtensionItem, ItemId, ItemMeta, ServiceKind};
pub use kind::{parse_extension_kind, ExtensionKind};
pub use registry::ExtensionManager;
pub use typed::{
    BoolExtItem, IntCodec, ListExtItem, LocalOnly, SimpleExtItem, StringCodec, ValueCodec,
};

/// Errors raised by descriptor construction, registration and typed access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionError {
    /// Descriptor name does not match the accepted slot name format.
    InvalidName(String),
    /// Another live descriptor already owns this name.
    DuplicateName(String),
    /// Descriptor applies to one entity kind, the target is another.
    KindMismatch {
        item: String,
        expected: ExtensionKind,
        actual: ExtensionKind,
    },
    /// Descriptor handle was not created through an `Rc` allocation.
    DetachedItem(String),
    /// Text does not name a known entity kind.
    UnknownKind(String),
    /// Descriptor was removed by its component's unload and is no longer usable.
    Unregistered(String),
}

impl Display for ExtensionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "extension name is invalid: {name}"),
            Self::DuplicateName(name) => write!(f, "extension already exists: {name}"),
            Self::KindMismatch {
                item,
                expected,
                actual,
            } => write!(
                f,
                "extension {item} applies to {} entities, not {}",
                expected.as_str(),
                actual.as_str()
            ),
            Self::DetachedItem(name) => {
                write!(f, "extension {name} is not reachable through a shared handle")
            }
            Self::UnknownKind(value) => write!(f, "unknown extensible kind: {value}"),
            Self::Unregistered(name) => write!(f, "extension was unregistered: {name}"),
        }
    }
}

impl Error for ExtensionError {}
