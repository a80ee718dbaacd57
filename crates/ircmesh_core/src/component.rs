//! Loadable component identity.
//!
//! # Responsibility
//! - Identify the owner of every extension descriptor.
//! - Track how many descriptors still refer to a component (diagnostics).
//!
//! # Invariants
//! - `id` is unique per load; reloading a component under the same name
//!   yields a different identity, so stale descriptors never match it.

use crate::lifecycle::{UseCount, UseGuard};
use std::rc::Rc;
use uuid::Uuid;

/// Stable identity of one loaded component instance.
pub type ComponentId = Uuid;

/// Shared handle to a loaded component.
pub type ComponentRef = Rc<Component>;

/// One independently loaded unit that may define extension descriptors.
#[derive(Debug)]
pub struct Component {
    id: ComponentId,
    name: String,
    uses: UseCount,
}

impl Component {
    pub fn new(name: impl Into<String>) -> ComponentRef {
        let name = name.into();
        Rc::new(Self {
            id: Uuid::new_v4(),
            uses: UseCount::new(format!("component:{name}")),
            name,
        })
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of descriptors (or other users) currently attached.
    pub fn use_count(&self) -> u32 {
        self.uses.count()
    }

    pub(crate) fn enter_use(&self) -> UseGuard {
        self.uses.enter()
    }
}
