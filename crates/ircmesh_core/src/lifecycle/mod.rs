//! Object lifecycle primitives.
//!
//! # Responsibility
//! - Provide shared ownership with an explicit holder count (`refcount`).
//! - Provide diagnostic-only usage tracking (`usecount`).
//! - Provide the staged teardown protocol and its pending-release queue (`cull`).
//!
//! # Invariants
//! - Everything here is single-threaded by construction (`Rc`/`Cell`).
//! - Lifecycle-ordering mistakes are reported through `log`, never by panicking.

pub mod cull;
pub mod refcount;
pub mod usecount;

pub use cull::{CullList, CullResult, CullStats, Cullable};
pub use refcount::{RefCounted, Shared};
pub use usecount::{UseCount, UseGuard};
