//! Core abstractions for the videogames assistant front ends.
//!
//! This crate provides the fundamental building blocks:
//! - `Content`, `Part`, `Event` - Message content and runner events
//! - `SessionState` - Opaque state seeded on session creation
//! - `SessionService` and `Runner` - Traits for the external agent runtime
//! - `ServiceConfig` - Environment-derived process configuration

pub mod config;
pub mod content;
pub mod ids;
pub mod state;
pub mod traits;

pub use config::{ConfigError, ServiceConfig};
pub use content::{Content, Event, Part, Role};
pub use state::SessionState;
pub use traits::{
    EventStream, Runner, RunnerError, Session, SessionError, SessionKey, SessionService,
};
