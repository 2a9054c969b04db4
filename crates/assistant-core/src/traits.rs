//! Core traits for the external agent runtime.

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::{Content, Event, SessionState};

/// Exact `(user_id, session_id)` pair identifying a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    /// Build a key, rejecting empty identifiers.
    ///
    /// # Errors
    /// Returns `SessionError::InvalidKey` if either identifier is empty.
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Result<Self, SessionError> {
        let (user_id, session_id) = (user_id.into(), session_id.into());
        if user_id.is_empty() {
            return Err(SessionError::InvalidKey("user id is empty".to_string()));
        }
        if session_id.is_empty() {
            return Err(SessionError::InvalidKey("session id is empty".to_string()));
        }
        Ok(Self {
            user_id,
            session_id,
        })
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user_id, self.session_id)
    }
}

/// Session handle returned by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Application the session belongs to.
    pub app_name: String,
    pub key: SessionKey,
    pub state: SessionState,
    /// Last update time reported by the runtime (Unix epoch seconds).
    pub last_update_time: f64,
}

/// Session service error.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Invalid session key: {0}")]
    InvalidKey(String),
    #[error("Session already exists: {0}")]
    AlreadyExists(SessionKey),
    #[error("Session service returned {status}: {body}")]
    Remote { status: u16, body: String },
    #[error("Session service unreachable: {0}")]
    Transport(String),
    #[error("Invalid session payload: {0}")]
    Decode(String),
}

/// External session-creation collaborator.
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Create a session with the given initial state.
    async fn create_session(
        &self,
        app_name: &str,
        key: &SessionKey,
        state: SessionState,
    ) -> Result<Session, SessionError>;
}

/// Runner error.
#[derive(Debug, Clone, Error)]
pub enum RunnerError {
    #[error("Runner returned {status}: {body}")]
    Remote { status: u16, body: String },
    #[error("Runner unreachable: {0}")]
    Transport(String),
    #[error("Invalid runner event: {0}")]
    Decode(String),
    #[error("Runner failed: {0}")]
    Stream(String),
}

/// Ordered, finite sequence of runner events.
pub type EventStream = BoxStream<'static, Result<Event, RunnerError>>;

/// External runner: accepts a message bound to a session and emits events.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Submit `new_message` to the session identified by `key`.
    async fn run(&self, key: &SessionKey, new_message: Content) -> Result<EventStream, RunnerError>;
}
