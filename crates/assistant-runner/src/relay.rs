//! Message relay: one user message in, a stream of reply text out.

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use assistant_core::{Content, Event, EventStream, Runner, RunnerError, SessionError, SessionService};
use assistant_session::SessionStore;
use futures::{Stream, StreamExt, stream::BoxStream};
use tokio_util::sync::CancellationToken;

/// Relay error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error("Reply cancelled")]
    Cancelled,
    #[error("No reply from the agent within {0:?}")]
    Timeout(Duration),
}

/// Relay settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayConfig {
    /// Maximum wait for session setup, the runner call, and each runner
    /// event; `None` waits indefinitely.
    pub idle_timeout: Option<Duration>,
}

/// Handle that stops an in-flight reply.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Stop the reply. The stream yields `RelayError::Cancelled` and ends.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Lazy, finite sequence of reply text fragments.
///
/// Nothing is sent until the stream is first polled. The stream ends when
/// the runner's events end, or right after the first error item.
pub struct ReplyStream {
    inner: BoxStream<'static, Result<String, RelayError>>,
    cancel: CancelHandle,
}

impl ReplyStream {
    /// Handle that cancels this reply.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Drain the stream, joining fragments in arrival order.
    ///
    /// # Errors
    /// Returns the first error the stream yields; partial text is discarded.
    pub async fn collect_text(mut self) -> Result<String, RelayError> {
        let mut reply = String::new();
        while let Some(fragment) = self.next().await {
            reply.push_str(&fragment?);
        }
        Ok(reply)
    }
}

impl Stream for ReplyStream {
    type Item = Result<String, RelayError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

/// Forwards user messages to the runner bound to a cached session.
pub struct MessageRelay<S, R>
where
    S: SessionService,
    R: Runner,
{
    store: Arc<SessionStore<S>>,
    runner: Arc<R>,
    config: RelayConfig,
}

impl<S, R> Clone for MessageRelay<S, R>
where
    S: SessionService,
    R: Runner,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            runner: Arc::clone(&self.runner),
            config: self.config,
        }
    }
}

impl<S, R> MessageRelay<S, R>
where
    S: SessionService + 'static,
    R: Runner + 'static,
{
    /// Create a relay with default settings.
    #[must_use]
    pub fn new(store: Arc<SessionStore<S>>, runner: Arc<R>) -> Self {
        Self::with_config(store, runner, RelayConfig::default())
    }

    #[must_use]
    pub fn with_config(store: Arc<SessionStore<S>>, runner: Arc<R>, config: RelayConfig) -> Self {
        Self {
            store,
            runner,
            config,
        }
    }

    /// Session store backing this relay.
    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore<S>> {
        &self.store
    }

    /// Submit `text` as one user content unit and stream the reply fragments.
    ///
    /// Each call invokes the runner again; the stream is not restartable.
    #[must_use]
    pub fn stream(&self, user_id: &str, session_id: &str, text: &str) -> ReplyStream {
        let cancel = CancelHandle::default();
        let token = cancel.token.clone();
        let store = Arc::clone(&self.store);
        let runner = Arc::clone(&self.runner);
        let idle_timeout = self.config.idle_timeout;
        let (user_id, session_id, text) = (user_id.to_string(), session_id.to_string(), text.to_string());

        let inner = async_stream::stream! {
            tracing::info!(%user_id, %session_id, "Relaying message");

            let session = tokio::select! {
                biased;
                () = token.cancelled() => Err(RelayError::Cancelled),
                result = within(idle_timeout, store.get_or_create(&user_id, &session_id)) => result,
            };
            let session = match session {
                Ok(session) => session,
                Err(err) => {
                    yield Err(err);
                    return;
                }
            };

            let started = tokio::select! {
                biased;
                () = token.cancelled() => Err(RelayError::Cancelled),
                result = within(idle_timeout, runner.run(&session.key, Content::user_text(text))) => result,
            };
            let mut events = match started {
                Ok(events) => events,
                Err(err) => {
                    yield Err(err);
                    return;
                }
            };

            let mut fragments = 0usize;
            loop {
                let next = tokio::select! {
                    biased;
                    () = token.cancelled() => Err(RelayError::Cancelled),
                    next = within(idle_timeout, next_event(&mut events)) => next,
                };
                match next {
                    Ok(Some(event)) => {
                        for text in event.text_fragments() {
                            fragments += 1;
                            yield Ok(text.to_string());
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!(%user_id, %session_id, "Relay failed: {err}");
                        yield Err(err);
                        return;
                    }
                }
            }

            tracing::debug!(%user_id, %session_id, fragments, "Reply complete");
        };

        ReplyStream {
            inner: inner.boxed(),
            cancel,
        }
    }

    /// Submit `text` and return the whole reply as one string.
    ///
    /// # Errors
    /// Returns error if session creation or the runner fails.
    pub async fn collect(&self, user_id: &str, session_id: &str, text: &str) -> Result<String, RelayError> {
        self.stream(user_id, session_id, text).collect_text().await
    }
}

async fn next_event(events: &mut EventStream) -> Result<Option<Event>, RunnerError> {
    events.next().await.transpose()
}

/// Await `fut`, giving up after `limit` when one is set.
async fn within<T, E>(
    limit: Option<Duration>,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, RelayError>
where
    RelayError: From<E>,
{
    let result = match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| RelayError::Timeout(limit))?,
        None => fut.await,
    };
    result.map_err(RelayError::from)
}
