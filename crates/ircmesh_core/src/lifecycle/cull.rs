//! Staged teardown and the pending-release queue.
//!
//! # Responsibility
//! - Define the `Cullable` contract: release attached resources first,
//!   free the object afterwards.
//! - Hold objects that must not be freed yet because code higher up the
//!   current call stack may still refer to them.
//!
//! # Invariants
//! - Objects on the list are owned by the list; nothing else can free them.
//! - `apply` is the only place queued objects are culled and freed.
//! - An object that reports `Deferred` stays queued for the next `apply`.

use log::{debug, info};

/// Outcome of one cull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullResult {
    /// Every attached resource is released; the object may be freed.
    Done,
    /// Release is still in progress; ask again on the next drain.
    Deferred,
}

/// Objects that need an explicit release step before they are freed.
pub trait Cullable {
    fn cull(&mut self) -> CullResult;
}

/// Counters reported by one drain of a [`CullList`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullStats {
    pub culled: usize,
    pub deferred: usize,
}

/// Queue of objects waiting to be culled at the next safe point.
#[derive(Debug)]
pub struct CullList<T: Cullable> {
    pending: Vec<T>,
}

impl<T: Cullable> Default for CullList<T> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<T: Cullable> CullList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one object; it is culled on the next [`CullList::apply`].
    pub fn add_item(&mut self, item: T) {
        self.pending.push(item);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Queued objects, for callers that must still touch them before the
    /// drain (for example to purge slots of an unloading component).
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.pending.iter_mut()
    }

    /// Culls and frees every queued object.
    pub fn apply(&mut self) -> CullStats {
        let mut stats = CullStats::default();
        if self.pending.is_empty() {
            return stats;
        }

        let queued = std::mem::take(&mut self.pending);
        for mut item in queued {
            match item.cull() {
                CullResult::Done => {
                    stats.culled += 1;
                    drop(item);
                }
                CullResult::Deferred => {
                    stats.deferred += 1;
                    self.pending.push(item);
                }
            }
        }

        if stats.deferred > 0 {
            debug!(
                "event=cull_apply module=lifecycle status=partial culled={} deferred={}",
                stats.culled, stats.deferred
            );
        } else {
            info!(
                "event=cull_apply module=lifecycle status=ok culled={}",
                stats.culled
            );
        }
        stats
    }
}
