//! In-memory session service.

use std::{
    collections::HashMap,
    sync::RwLock,
    time::{SystemTime, UNIX_EPOCH},
};

use assistant_core::{Session, SessionError, SessionKey, SessionService, SessionState};
use async_trait::async_trait;

/// In-memory session service.
///
/// Useful for development and single-process deployments.
/// Data is lost on restart.
pub struct InMemorySessionService {
    sessions: RwLock<HashMap<(String, SessionKey), Session>>,
}

impl InMemorySessionService {
    /// Create an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch a stored session.
    ///
    /// # Errors
    /// Returns error if the lock is poisoned.
    pub fn get_session(&self, app_name: &str, key: &SessionKey) -> Result<Option<Session>, SessionError> {
        Ok(self
            .sessions
            .read()
            .map_err(|e| SessionError::Transport(e.to_string()))?
            .get(&(app_name.to_string(), key.clone()))
            .cloned())
    }

    /// Number of stored sessions across all applications.
    ///
    /// # Errors
    /// Returns error if the lock is poisoned.
    pub fn session_count(&self) -> Result<usize, SessionError> {
        Ok(self
            .sessions
            .read()
            .map_err(|e| SessionError::Transport(e.to_string()))?
            .len())
    }
}

impl Default for InMemorySessionService {
    fn default() -> Self {
        Self::new()
    }
}

fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[async_trait]
impl SessionService for InMemorySessionService {
    async fn create_session(
        &self,
        app_name: &str,
        key: &SessionKey,
        state: SessionState,
    ) -> Result<Session, SessionError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        let slot = (app_name.to_string(), key.clone());
        if sessions.contains_key(&slot) {
            return Err(SessionError::AlreadyExists(key.clone()));
        }

        let session = Session {
            app_name: app_name.to_string(),
            key: key.clone(),
            state,
            last_update_time: now(),
        };
        sessions.insert(slot, session.clone());

        Ok(session)
    }
}
