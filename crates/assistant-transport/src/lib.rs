//! Front-end plumbing for the videogames assistant.
//!
//! Provides:
//! - JSON bodies for the HTTP front end
//! - Chat state shared by the chat front ends
//! - HTTP router and runtime proxy (feature: http)
//! - Terminal chat helpers (feature: tui)

pub mod chat;
pub mod protocol;

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub mod proxy;

#[cfg(feature = "tui")]
pub mod tui;

pub use chat::{ChatMessage, ChatRole, ChatState, ChatTurn, TurnRequest};
pub use protocol::{HealthStatus, ServiceInfo};

#[cfg(feature = "http")]
pub use http::create_router;
#[cfg(feature = "http")]
pub use proxy::{ProxyError, RuntimeProxy};
