//! Message relay and agent runtime client.
//!
//! Provides:
//! - `MessageRelay` - Submit a message, stream or collect the reply text
//! - `ReplyStream` / `CancelHandle` - Lazy reply fragments with explicit cancel
//! - Agent runtime HTTP client (feature: adk)

#[cfg(feature = "adk")]
pub mod adk;
pub mod relay;

#[cfg(feature = "adk")]
pub use adk::AdkClient;
pub use relay::{CancelHandle, MessageRelay, RelayConfig, RelayError, ReplyStream};
