//! HTTP client for the agent runtime's API server.

use std::time::Duration;

use assistant_core::{
    Content, EventStream, Runner, RunnerError, Session, SessionError, SessionKey, SessionService,
    SessionState,
};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{Client, Url};

use super::protocol::{RunRequest, SessionRecord, decode_frame};

/// Bound on establishing a connection to the runtime.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client error.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid runtime URL: {0}")]
    InvalidUrl(String),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Agent runtime client.
///
/// Implements both `SessionService` (session creation endpoint) and
/// `Runner` (`/run_sse`) so one instance can back the store and the relay.
#[derive(Debug, Clone)]
pub struct AdkClient {
    http: Client,
    base_url: Url,
    app_name: String,
}

impl AdkClient {
    /// Create a client for the runtime at `base_url`.
    ///
    /// # Errors
    /// Returns error if the URL cannot be parsed or the HTTP client fails to build.
    pub fn new(base_url: &str, app_name: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Self::with_client(http, base_url, app_name)
    }

    /// Create a client reusing an existing HTTP client.
    ///
    /// # Errors
    /// Returns error if the URL cannot be parsed.
    pub fn with_client(http: Client, base_url: &str, app_name: impl Into<String>) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            http,
            base_url,
            app_name: app_name.into(),
        })
    }

    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl SessionService for AdkClient {
    async fn create_session(
        &self,
        app_name: &str,
        key: &SessionKey,
        state: SessionState,
    ) -> Result<Session, SessionError> {
        let url = self.endpoint([
            "apps",
            app_name,
            "users",
            key.user_id.as_str(),
            "sessions",
            key.session_id.as_str(),
        ]);
        tracing::debug!(%key, %url, "Creating runtime session");

        let response = self
            .http
            .post(url)
            .json(&state)
            .send()
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<SessionRecord>()
            .await
            .map_err(|e| SessionError::Decode(e.to_string()))?
            .into_session()
    }
}

#[async_trait]
impl Runner for AdkClient {
    async fn run(&self, key: &SessionKey, new_message: Content) -> Result<EventStream, RunnerError> {
        let url = self.endpoint(["run_sse"]);
        let request = RunRequest::new(&self.app_name, key, &new_message);

        let response = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RunnerError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RunnerError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        let events = response
            .bytes_stream()
            .eventsource()
            .filter_map(|frame| async move {
                match frame {
                    Ok(frame) => decode_frame(&frame.data).transpose(),
                    Err(e) => Some(Err(RunnerError::Transport(e.to_string()))),
                }
            });

        Ok(events.boxed())
    }
}
