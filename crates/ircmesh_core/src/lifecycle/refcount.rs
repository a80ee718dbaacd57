//! Shared-ownership primitive with an explicit holder count.
//!
//! # Responsibility
//! - Keep one heap value alive for as long as any holder needs it.
//! - Report values that are freed while their holder count is still non-zero.
//!
//! # Invariants
//! - A `RefCounted<T>` only ever lives behind the heap allocation made by
//!   `RefCounted::new`; there is no way to build one on the stack or embed it
//!   inside another value.
//! - Cloning a `Shared<T>` acquires one holder, dropping it releases one.

use log::warn;
use std::cell::Cell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

/// Heap value carrying a holder count.
///
/// The only allocation path is [`RefCounted::new`], which hands back the
/// first [`Shared`] handle. Building the value in place does not compile:
///
/// ```compile_fail
/// use std::cell::Cell;
/// use ircmesh_core::lifecycle::RefCounted;
///
/// let on_stack = RefCounted { refcount: Cell::new(0), value: 42_u32 };
/// ```
pub struct RefCounted<T> {
    refcount: Cell<u32>,
    value: T,
}

impl<T> RefCounted<T> {
    /// Allocates `value` and returns the first holder handle.
    pub fn new(value: T) -> Shared<T> {
        let inner = Rc::new(Self {
            refcount: Cell::new(0),
            value,
        });
        inner.acquire();
        Shared { inner }
    }

    /// Registers one more holder.
    pub fn acquire(&self) {
        self.refcount.set(self.refcount.get().saturating_add(1));
    }

    /// Drops one holder. Returns `true` when the count reached zero, in
    /// which case the caller owns the responsibility of freeing the value.
    pub fn release(&self) -> bool {
        let current = self.refcount.get();
        if current == 0 {
            warn!(
                "event=refcount_underflow module=lifecycle status=warn ptr={:p}",
                self as *const Self
            );
            return true;
        }
        self.refcount.set(current - 1);
        current == 1
    }

    /// Current number of registered holders.
    pub fn refcount(&self) -> u32 {
        self.refcount.get()
    }
}

impl<T> Drop for RefCounted<T> {
    fn drop(&mut self) {
        let remaining = self.refcount.get();
        if remaining != 0 {
            warn!(
                "event=refcount_drop_nonzero module=lifecycle status=warn ptr={:p} refcount={}",
                self as *const Self, remaining
            );
        }
    }
}

/// Owning holder handle for a [`RefCounted`] value.
pub struct Shared<T> {
    inner: Rc<RefCounted<T>>,
}

impl<T> Shared<T> {
    /// Number of holders currently registered on the shared value.
    pub fn holders(this: &Self) -> u32 {
        this.inner.refcount()
    }

    /// Whether two handles point at the same allocation.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Rc::ptr_eq(&this.inner, &other.inner)
    }

    /// Gives access to the counted cell for manual acquire/release pairs.
    pub fn counted(this: &Self) -> &RefCounted<T> {
        &this.inner
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        self.inner.acquire();
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        // The allocation itself is freed by the last `Rc` going away.
        self.inner.release();
    }
}

impl<T> Deref for Shared<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner.value
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("holders", &self.inner.refcount())
            .field("value", &self.inner.value)
            .finish()
    }
}
