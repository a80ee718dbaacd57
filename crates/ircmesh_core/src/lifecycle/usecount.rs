//! Diagnostic-only usage tracking.
//!
//! A `UseCount` never gates destruction. It only lets the owner notice that
//! something still claims to be using it when it goes away.

use log::warn;
use std::cell::Cell;
use std::rc::Rc;

/// Usage counter owned by a long-lived object (for example a component).
#[derive(Debug)]
pub struct UseCount {
    label: String,
    count: Rc<Cell<u32>>,
}

impl UseCount {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            count: Rc::new(Cell::new(0)),
        }
    }

    /// Marks one more user until the returned guard is dropped.
    pub fn enter(&self) -> UseGuard {
        self.count.set(self.count.get().saturating_add(1));
        UseGuard {
            count: Rc::clone(&self.count),
        }
    }

    pub fn count(&self) -> u32 {
        self.count.get()
    }

    pub fn is_in_use(&self) -> bool {
        self.count.get() > 0
    }
}

impl Drop for UseCount {
    fn drop(&mut self) {
        let users = self.count.get();
        if users != 0 {
            warn!(
                "event=usecount_drop_in_use module=lifecycle status=warn label={} usecount={}",
                self.label, users
            );
        }
    }
}

/// RAII marker for one user of a [`UseCount`].
#[derive(Debug)]
pub struct UseGuard {
    count: Rc<Cell<u32>>,
}

impl Drop for UseGuard {
    fn drop(&mut self) {
        self.count.set(self.count.get().saturating_sub(1));
    }
}
