//! Agent runtime API-server wire types.

use assistant_core::{Content, Event, RunnerError, Session, SessionError, SessionKey, SessionState};
use serde::{Deserialize, Serialize};

/// Body of `POST /run_sse`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest<'a> {
    pub app_name: &'a str,
    pub user_id: &'a str,
    pub session_id: &'a str,
    pub new_message: &'a Content,
    /// Token-level streaming; the relay wants whole events, so always off.
    pub streaming: bool,
}

impl<'a> RunRequest<'a> {
    #[must_use]
    pub fn new(app_name: &'a str, key: &'a SessionKey, new_message: &'a Content) -> Self {
        Self {
            app_name,
            user_id: key.user_id.as_str(),
            session_id: key.session_id.as_str(),
            new_message,
            streaming: false,
        }
    }
}

/// Session as returned by the runtime's session endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    #[serde(default)]
    pub state: SessionState,
    #[serde(default)]
    pub last_update_time: f64,
}

impl SessionRecord {
    /// Convert into a session handle.
    ///
    /// # Errors
    /// Returns error if the runtime echoed empty identifiers.
    pub fn into_session(self) -> Result<Session, SessionError> {
        let key = SessionKey::new(self.user_id, self.id)
            .map_err(|e| SessionError::Decode(e.to_string()))?;
        Ok(Session {
            app_name: self.app_name,
            key,
            state: self.state,
            last_update_time: self.last_update_time,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Frame {
    Failure { error: String },
    Event(Event),
}

/// Decode one server-sent-event `data` payload.
///
/// Blank payloads (keep-alives) decode to `None`; an `{"error": ...}` frame
/// is a runner failure.
///
/// # Errors
/// Returns error if the payload is not valid event JSON or reports a failure.
pub fn decode_frame(data: &str) -> Result<Option<Event>, RunnerError> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }
    match serde_json::from_str(data) {
        Ok(Frame::Event(event)) => Ok(Some(event)),
        Ok(Frame::Failure { error }) => Err(RunnerError::Stream(error)),
        Err(e) => Err(RunnerError::Decode(e.to_string())),
    }
}
