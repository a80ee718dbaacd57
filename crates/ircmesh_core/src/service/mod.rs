//! Server orchestration over entities, components and storage.
//!
//! # Responsibility
//! - Tie the registry, the live entities and the pending-release queue
//!   together behind one owner.
//! - Keep callers decoupled from storage details.

pub mod server;

pub use server::{ServerError, ServerResult, ServerState};
