//! Session cache and storage for the videogames assistant.
//!
//! Provides:
//! - `SessionStore` - Lazily populated `(user, session)` cache
//! - `RetentionPolicy` - How long cached sessions are kept
//! - Storage implementations (memory)

pub mod storage;
pub mod store;

pub use store::{RetentionPolicy, SessionStore};
