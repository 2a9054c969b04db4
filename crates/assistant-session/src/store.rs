//! Session store caching runtime sessions per `(user, session)` key.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use assistant_core::{Session, SessionError, SessionKey, SessionService, SessionState};
use tokio::sync::{Mutex, OnceCell};

/// How long cached sessions are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Upper bound on cached sessions; `None` keeps every session for the
    /// lifetime of the store. Oldest-inserted sessions are evicted first.
    pub max_sessions: Option<usize>,
}

impl RetentionPolicy {
    /// Keep every session.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self { max_sessions: None }
    }

    /// Keep at most `max_sessions` sessions (at least one).
    #[must_use]
    pub fn bounded(max_sessions: usize) -> Self {
        Self {
            max_sessions: Some(max_sessions.max(1)),
        }
    }
}

type Slot = Arc<OnceCell<Arc<Session>>>;

#[derive(Default)]
struct Inner {
    slots: HashMap<SessionKey, Slot>,
    /// Keys of created sessions, oldest first.
    order: VecDeque<SessionKey>,
}

/// Lazily populated cache of runtime sessions.
///
/// Built once at process start and shared by handle with every front end.
/// Each key has its own creation slot: concurrent callers on one key trigger
/// a single creation call, while other keys and lookups never wait on it.
pub struct SessionStore<S>
where
    S: SessionService,
{
    service: S,
    app_name: String,
    policy: RetentionPolicy,
    inner: Mutex<Inner>,
}

impl<S> SessionStore<S>
where
    S: SessionService,
{
    /// Create a store with an unbounded retention policy.
    #[must_use]
    pub fn new(service: S, app_name: impl Into<String>) -> Self {
        Self::with_policy(service, app_name, RetentionPolicy::unbounded())
    }

    /// Create a store with an explicit retention policy.
    #[must_use]
    pub fn with_policy(service: S, app_name: impl Into<String>, policy: RetentionPolicy) -> Self {
        Self {
            service,
            app_name: app_name.into(),
            policy,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Application name used for session creation.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    #[must_use]
    pub const fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Return the cached session for the key, creating it on first use.
    ///
    /// New sessions start with an empty preferences object.
    ///
    /// # Errors
    /// Returns error if an identifier is empty or the session service fails.
    pub async fn get_or_create(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Arc<Session>, SessionError> {
        let key = SessionKey::new(user_id, session_id)?;
        let slot = {
            let mut inner = self.inner.lock().await;
            Arc::clone(inner.slots.entry(key.clone()).or_default())
        };

        let mut created = false;
        let result = {
            let created = &mut created;
            let key = &key;
            slot.get_or_try_init(|| async move {
                *created = true;
                self.service
                    .create_session(&self.app_name, key, SessionState::initial())
                    .await
                    .map(Arc::new)
            })
            .await
            .cloned()
        };

        let mut inner = self.inner.lock().await;
        let current = inner.slots.get(&key).is_some_and(|s| Arc::ptr_eq(s, &slot));
        match result {
            Ok(session) => {
                if created && current {
                    tracing::debug!(%key, app = %self.app_name, "Created session");
                    inner.order.push_back(key);
                    self.enforce_policy(&mut inner);
                }
                Ok(session)
            }
            Err(e) => {
                // Drop the empty slot so failures are not cached.
                if current && !slot.initialized() {
                    inner.slots.remove(&key);
                }
                Err(e)
            }
        }
    }

    /// Look up a cached session without creating it.
    pub async fn get(&self, user_id: &str, session_id: &str) -> Option<Arc<Session>> {
        let key = SessionKey::new(user_id, session_id).ok()?;
        self.inner.lock().await.slots.get(&key)?.get().cloned()
    }

    /// Whether a session is cached for the key.
    pub async fn contains(&self, user_id: &str, session_id: &str) -> bool {
        self.get(user_id, session_id).await.is_some()
    }

    /// Drop a session from the cache, returning it if it was present.
    ///
    /// A creation still in flight for the key is not cached when it completes.
    pub async fn evict(&self, user_id: &str, session_id: &str) -> Option<Arc<Session>> {
        let key = SessionKey::new(user_id, session_id).ok()?;
        let mut inner = self.inner.lock().await;
        let removed = inner.slots.remove(&key)?.get().cloned();
        inner.order.retain(|k| k != &key);
        if removed.is_some() {
            tracing::debug!(%key, "Evicted session");
        }
        removed
    }

    /// Number of cached sessions.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn enforce_policy(&self, inner: &mut Inner) {
        let Some(max) = self.policy.max_sessions else {
            return;
        };
        while inner.order.len() > max {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            if inner.slots.remove(&oldest).is_some() {
                tracing::debug!(key = %oldest, max, "Evicted session over retention limit");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::storage::InMemorySessionService;

    /// Counts creation calls and optionally stalls to widen race windows.
    #[derive(Default)]
    struct CountingService {
        calls: AtomicUsize,
        delay: Option<Duration>,
        fail: bool,
        /// Session id whose creation never completes.
        stalled: Option<&'static str>,
    }

    #[async_trait]
    impl SessionService for CountingService {
        async fn create_session(
            &self,
            app_name: &str,
            key: &SessionKey,
            state: SessionState,
        ) -> Result<Session, SessionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.stalled == Some(key.session_id.as_str()) {
                std::future::pending::<()>().await;
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(SessionError::Transport("connection refused".to_string()));
            }
            Ok(Session {
                app_name: app_name.to_string(),
                key: key.clone(),
                state,
                last_update_time: 0.0,
            })
        }
    }

    fn store() -> SessionStore<InMemorySessionService> {
        SessionStore::new(InMemorySessionService::new(), "videogames_assistant")
    }

    #[tokio::test]
    async fn test_same_key_returns_same_session() {
        let store = SessionStore::new(CountingService::default(), "videogames_assistant");

        let first = store.get_or_create("user_abc", "session_1").await.unwrap();
        let second = store.get_or_create("user_abc", "session_1").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_sessions_are_distinct() {
        let store = store();

        let a = store.get_or_create("user_abc", "session_1").await.unwrap();
        let b = store.get_or_create("user_abc", "session_2").await.unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.key, b.key);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_new_session_has_initial_state() {
        let store = store();
        let session = store.get_or_create("user_abc", "session_1").await.unwrap();

        assert_eq!(session.app_name, "videogames_assistant");
        assert_eq!(session.state, SessionState::initial());
    }

    #[tokio::test]
    async fn test_shared_handles_share_cache() {
        let store = Arc::new(store());
        let other = Arc::clone(&store);

        let created = store.get_or_create("user_abc", "session_1").await.unwrap();
        let seen = other.get("user_abc", "session_1").await.unwrap();

        assert!(Arc::ptr_eq(&created, &seen));
    }

    #[tokio::test]
    async fn test_concurrent_callers_create_once() {
        let store = Arc::new(SessionStore::new(
            CountingService {
                delay: Some(Duration::from_millis(20)),
                ..CountingService::default()
            },
            "videogames_assistant",
        ));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.get_or_create("user_abc", "session_1").await })
            })
            .collect();

        let sessions: Vec<Arc<Session>> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        assert_eq!(store.service.calls.load(Ordering::SeqCst), 1);
        assert!(sessions.iter().all(|s| Arc::ptr_eq(s, &sessions[0])));
    }

    #[tokio::test]
    async fn test_creation_failure_propagates_and_caches_nothing() {
        let store = SessionStore::new(
            CountingService {
                fail: true,
                ..CountingService::default()
            },
            "videogames_assistant",
        );

        let err = store.get_or_create("user_abc", "session_1").await.unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)));
        assert!(store.is_empty().await);

        // No negative caching: the next call asks the service again.
        assert_err!(store.get_or_create("user_abc", "session_1").await);
        assert_eq!(store.service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_identifiers_rejected() {
        let store = store();
        let err = store.get_or_create("", "session_1").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_unbounded_policy_keeps_superseded_sessions() {
        let store = store();
        store.get_or_create("user_abc", "session_1").await.unwrap();
        store.get_or_create("user_abc", "session_2").await.unwrap();

        assert!(store.contains("user_abc", "session_1").await);
        assert!(store.contains("user_abc", "session_2").await);
    }

    #[tokio::test]
    async fn test_bounded_policy_evicts_oldest() {
        let store = SessionStore::with_policy(
            InMemorySessionService::new(),
            "videogames_assistant",
            RetentionPolicy::bounded(2),
        );

        for id in ["session_1", "session_2", "session_3"] {
            store.get_or_create("user_abc", id).await.unwrap();
        }

        assert_eq!(store.len().await, 2);
        assert!(!store.contains("user_abc", "session_1").await);
        assert!(store.contains("user_abc", "session_3").await);
    }

    #[tokio::test]
    async fn test_evict_removes_session() {
        let store = store();
        store.get_or_create("user_abc", "session_1").await.unwrap();

        assert!(store.evict("user_abc", "session_1").await.is_some());
        assert!(store.evict("user_abc", "session_1").await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_stalled_creation_does_not_block_other_keys() {
        let store = Arc::new(SessionStore::new(
            CountingService {
                stalled: Some("session_a"),
                ..CountingService::default()
            },
            "videogames_assistant",
        ));

        let stuck = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get_or_create("user_abc", "session_a").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let other = tokio::time::timeout(
            Duration::from_secs(1),
            store.get_or_create("user_abc", "session_b"),
        )
        .await;
        assert_ok!(assert_ok!(other));
        assert_eq!(
            assert_ok!(tokio::time::timeout(Duration::from_secs(1), store.len()).await),
            1
        );
        assert!(!store.contains("user_abc", "session_a").await);

        stuck.abort();
    }

    #[tokio::test]
    async fn test_evict_during_creation_skips_caching() {
        let store = Arc::new(SessionStore::new(
            CountingService {
                delay: Some(Duration::from_millis(50)),
                ..CountingService::default()
            },
            "videogames_assistant",
        ));

        let creating = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get_or_create("user_abc", "session_1").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.evict("user_abc", "session_1").await.is_none());

        assert_ok!(creating.await.unwrap());
        assert!(store.is_empty().await);
    }
}
