//! Agent runtime API-server client and wire protocol.

pub mod client;
pub mod protocol;

pub use client::{AdkClient, ClientError};
pub use protocol::{RunRequest, SessionRecord};
