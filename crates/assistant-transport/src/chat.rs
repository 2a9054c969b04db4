//! Chat front-end state: transcript, identifiers, and turn handling.

use std::{collections::HashSet, fmt::Display};

use assistant_core::{
    Runner, SessionService,
    ids::{new_session_id, new_user_id},
};
use assistant_runner::{CancelHandle, MessageRelay, RelayError, ReplyStream};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

/// Author of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Outcome of a turn, for rendering only.
///
/// The transcript stores both variants the same way, as assistant messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTurn {
    Reply(String),
    Failed(String),
}

impl ChatTurn {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Reply(text) | Self::Failed(text) => text,
        }
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// A submitted prompt bound to the session it was sent on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub user_id: String,
    pub session_id: String,
    pub text: String,
}

/// A reply being produced on a background task.
struct PendingTurn {
    task: JoinHandle<Result<String, RelayError>>,
    cancel: CancelHandle,
}

/// Conversation state of one chat front-end instance.
///
/// At most one turn is in flight; new prompts and resets are ignored until
/// it completes or is cancelled.
pub struct ChatState<S, R>
where
    S: SessionService,
    R: Runner,
{
    relay: MessageRelay<S, R>,
    user_id: String,
    session_id: String,
    messages: Vec<ChatMessage>,
    /// Transcript indices of assistant messages that report a failure.
    failed: HashSet<usize>,
    pending: Option<PendingTurn>,
}

impl<S, R> ChatState<S, R>
where
    S: SessionService + 'static,
    R: Runner + 'static,
{
    /// Start a conversation with freshly generated identifiers.
    #[must_use]
    pub fn new(relay: MessageRelay<S, R>) -> Self {
        Self::with_ids(relay, new_user_id(), new_session_id())
    }

    #[must_use]
    pub fn with_ids(relay: MessageRelay<S, R>, user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            relay,
            user_id: user_id.into(),
            session_id: session_id.into(),
            messages: Vec::new(),
            failed: HashSet::new(),
            pending: None,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Whether the transcript entry at `index` is a failed turn.
    #[must_use]
    pub fn is_failed(&self, index: usize) -> bool {
        self.failed.contains(&index)
    }

    /// Whether the most recent turn failed.
    #[must_use]
    pub fn last_turn_failed(&self) -> bool {
        self.messages
            .len()
            .checked_sub(1)
            .is_some_and(|last| self.is_failed(last))
    }

    #[must_use]
    pub const fn relay(&self) -> &MessageRelay<S, R> {
        &self.relay
    }

    /// Record the user's prompt and return the request to send.
    pub fn begin_turn(&mut self, prompt: impl Into<String>) -> TurnRequest {
        let text = prompt.into();
        self.messages.push(ChatMessage::user(text.clone()));
        TurnRequest {
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            text,
        }
    }

    /// Start streaming the reply for a request.
    #[must_use]
    pub fn stream_turn(&self, request: &TurnRequest) -> ReplyStream {
        self.relay
            .stream(&request.user_id, &request.session_id, &request.text)
    }

    /// Record the reply, or `Error: {message}` if the turn failed.
    pub fn complete_turn<E: Display>(&mut self, result: Result<String, E>) -> ChatTurn {
        match result {
            Ok(reply) => {
                self.messages.push(ChatMessage::assistant(reply.clone()));
                ChatTurn::Reply(reply)
            }
            Err(e) => {
                let message = format!("Error: {e}");
                tracing::warn!(user_id = %self.user_id, session_id = %self.session_id, "{message}");
                self.failed.insert(self.messages.len());
                self.messages.push(ChatMessage::assistant(message.clone()));
                ChatTurn::Failed(message)
            }
        }
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record `prompt` and produce its reply on a background task.
    ///
    /// Returns `false` without doing anything if the prompt is blank or a
    /// turn is already pending.
    pub fn start_turn(&mut self, prompt: &str) -> bool {
        let prompt = prompt.trim();
        if prompt.is_empty() || self.is_pending() {
            return false;
        }

        let request = self.begin_turn(prompt);
        let stream = self.stream_turn(&request);
        let cancel = stream.cancel_handle();
        let task = tokio::spawn(stream.collect_text());
        self.pending = Some(PendingTurn { task, cancel });
        true
    }

    /// Cancel the pending turn, if any. It completes as a failed turn.
    pub fn cancel_turn(&self) -> bool {
        match &self.pending {
            Some(pending) => {
                pending.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Record the pending turn if its task has finished.
    pub async fn poll_turn(&mut self) -> Option<ChatTurn> {
        let finished = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.task.is_finished());
        if finished {
            self.finish_turn().await
        } else {
            None
        }
    }

    /// Wait for the pending turn and record it.
    pub async fn finish_turn(&mut self) -> Option<ChatTurn> {
        let pending = self.pending.take()?;
        let result = match pending.task.await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(format!("Reply task failed: {e}")),
        };
        Some(self.complete_turn(result))
    }

    /// Stop the pending turn without recording it.
    pub fn abort_turn(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel.cancel();
            pending.task.abort();
        }
    }

    /// Send a prompt and wait for the whole reply.
    ///
    /// Returns `None` if the prompt was ignored (see [`Self::start_turn`]).
    pub async fn submit(&mut self, prompt: &str) -> Option<ChatTurn> {
        if !self.start_turn(prompt) {
            return None;
        }
        self.finish_turn().await
    }

    /// Discard the transcript and switch to a new session identifier.
    ///
    /// The previous session stays in the session store. Ignored while a turn
    /// is pending; returns whether the reset happened.
    pub fn reset(&mut self) -> bool {
        if self.is_pending() {
            return false;
        }
        self.messages.clear();
        self.failed.clear();
        let mut session_id = new_session_id();
        while session_id == self.session_id {
            session_id = new_session_id();
        }
        tracing::info!(previous = %self.session_id, current = %session_id, "Started new conversation");
        self.session_id = session_id;
        true
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use assistant_core::{Content, Event, EventStream, RunnerError, SessionKey};
    use assistant_session::{SessionStore, storage::InMemorySessionService};
    use async_trait::async_trait;
    use futures::{StreamExt, stream};

    use super::*;

    /// Echoes the prompt back. `crash` fails the call; `wait` never replies.
    struct EchoRunner;

    #[async_trait]
    impl Runner for EchoRunner {
        async fn run(&self, _key: &SessionKey, new_message: Content) -> Result<EventStream, RunnerError> {
            let text: String = new_message.text_fragments().collect();
            match text.as_str() {
                "crash" => Err(RunnerError::Transport("connection reset".to_string())),
                "wait" => Ok(stream::pending().boxed()),
                _ => {
                    let events = vec![
                        Ok(Event::text("Videogames_Assistant", "You said: ")),
                        Ok(Event::text("Videogames_Assistant", text)),
                    ];
                    Ok(stream::iter(events).boxed())
                }
            }
        }
    }

    fn chat() -> ChatState<InMemorySessionService, EchoRunner> {
        let store = Arc::new(SessionStore::new(InMemorySessionService::new(), "videogames_assistant"));
        ChatState::with_ids(MessageRelay::new(store, Arc::new(EchoRunner)), "user_abc", "session_1")
    }

    #[tokio::test]
    async fn test_submit_records_exchange() {
        let mut chat = chat();

        let turn = chat.submit("recommend a game").await;

        assert_eq!(turn, Some(ChatTurn::Reply("You said: recommend a game".to_string())));
        assert_eq!(
            chat.messages(),
            &[
                ChatMessage::user("recommend a game"),
                ChatMessage::assistant("You said: recommend a game"),
            ]
        );
        assert!(!chat.last_turn_failed());
        assert!(!chat.is_pending());
    }

    #[tokio::test]
    async fn test_failure_is_recorded_as_assistant_message() {
        let mut chat = chat();

        let turn = chat.submit("crash").await.unwrap();

        assert!(turn.is_failure());
        assert_eq!(turn.text(), "Error: Runner unreachable: connection reset");
        let last = chat.messages().last().unwrap();
        assert_eq!(last, &ChatMessage::assistant("Error: Runner unreachable: connection reset"));
        assert!(chat.is_failed(1));
        assert!(chat.last_turn_failed());
    }

    #[tokio::test]
    async fn test_reply_text_does_not_mark_failure() {
        let mut chat = chat();

        chat.submit("Error: is a fine band name").await.unwrap();

        assert!(chat.messages()[1].content.starts_with("You said: Error:"));
        assert!(!chat.is_failed(1));
        assert!(!chat.last_turn_failed());
    }

    #[tokio::test]
    async fn test_blank_prompt_is_ignored() {
        let mut chat = chat();

        assert!(chat.submit("   ").await.is_none());
        assert!(chat.messages().is_empty());
    }

    #[tokio::test]
    async fn test_reset_keeps_old_session_in_store() {
        let mut chat = chat();
        chat.submit("hello").await;
        let old_session = chat.session_id().to_string();

        assert!(chat.reset());

        assert!(chat.messages().is_empty());
        assert_ne!(chat.session_id(), old_session);
        assert!(chat.session_id().starts_with("session_"));
        assert_eq!(chat.user_id(), "user_abc");
        assert!(chat.relay().store().contains("user_abc", &old_session).await);
    }

    #[tokio::test]
    async fn test_split_turn_matches_submit() {
        let mut chat = chat();

        let request = chat.begin_turn("any news?");
        assert_eq!(chat.messages().len(), 1);
        assert_eq!(request.session_id, "session_1");

        let result = chat.stream_turn(&request).collect_text().await;
        let turn = chat.complete_turn(result);

        assert_eq!(turn.text(), "You said: any news?");
        assert_eq!(chat.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_one_turn_in_flight() {
        let mut chat = chat();

        assert!(chat.start_turn("wait"));
        assert!(chat.is_pending());

        // Further prompts and resets are ignored while the reply is pending.
        assert!(!chat.start_turn("recommend a game"));
        assert!(!chat.reset());
        assert_eq!(chat.messages(), &[ChatMessage::user("wait")]);
        assert_eq!(chat.session_id(), "session_1");

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(chat.poll_turn().await.is_none());
        assert!(chat.is_pending());

        chat.abort_turn();
        assert!(!chat.is_pending());
    }

    #[tokio::test]
    async fn test_cancel_completes_turn_as_failure() {
        let mut chat = chat();
        assert!(!chat.cancel_turn());

        assert!(chat.start_turn("wait"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(chat.cancel_turn());

        let turn = chat.finish_turn().await.unwrap();

        assert_eq!(turn, ChatTurn::Failed("Error: Reply cancelled".to_string()));
        assert!(!chat.is_pending());
        assert!(chat.last_turn_failed());

        // Input is accepted again once the turn is settled.
        assert!(chat.reset());
        assert!(chat.messages().is_empty());
        assert!(!chat.last_turn_failed());
    }

    #[tokio::test]
    async fn test_poll_turn_records_finished_reply() {
        let mut chat = chat();
        assert!(chat.start_turn("hi"));

        let mut turn = None;
        for _ in 0..100 {
            turn = chat.poll_turn().await;
            if turn.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(turn, Some(ChatTurn::Reply("You said: hi".to_string())));
        assert!(!chat.is_pending());
        assert_eq!(chat.messages().len(), 2);
    }

    #[test]
    fn test_generated_ids() {
        let store = Arc::new(SessionStore::new(InMemorySessionService::new(), "videogames_assistant"));
        let chat = ChatState::new(MessageRelay::new(store, Arc::new(EchoRunner)));

        assert!(chat.user_id().starts_with("user_"));
        assert!(chat.session_id().starts_with("session_"));
    }
}
