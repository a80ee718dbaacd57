//! Components built on the extension contract.
//!
//! # Responsibility
//! - `sslinfo`: shared TLS client certificates on connections.
//! - `invite`: pending channel invites on connections.

pub mod invite;
pub mod sslinfo;

pub use invite::{Invite, InviteApi, InviteCodec};
pub use sslinfo::{CertCodec, Certificate, SslInfo};
