//! Conversation transcripts and the per-identity session store.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::llm::Message;

/// Author of a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            at: Utc::now(),
        }
    }

    fn to_message(&self) -> Message {
        match self.role {
            TurnRole::System => Message::system(self.content.clone()),
            TurnRole::User => Message::user(self.content.clone()),
            TurnRole::Assistant => Message::assistant(self.content.clone()),
        }
    }
}

/// A single identity's conversation.
///
/// Always starts with exactly one system turn, followed by alternating
/// user/assistant turns. Turns are only added in complete exchanges.
#[derive(Debug, Clone)]
pub struct Session {
    identity: String,
    turns: Vec<Turn>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(identity: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            identity: identity.into(),
            turns: vec![Turn::new(TurnRole::System, system_prompt)],
            created_at: now,
            last_activity: now,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Transcript in model message form, with `pending` appended as a user
    /// turn that is not yet committed.
    pub fn messages_with(&self, pending: &str) -> Vec<Message> {
        self.turns
            .iter()
            .map(Turn::to_message)
            .chain(std::iter::once(Message::user(pending)))
            .collect()
    }

    /// Append a completed user/assistant exchange.
    pub fn commit_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.turns.push(Turn::new(TurnRole::User, user));
        self.turns.push(Turn::new(TurnRole::Assistant, assistant));
        self.touch();
    }

    pub fn count(&self, role: TurnRole) -> usize {
        self.turns.iter().filter(|t| t.role == role).count()
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Whether the session has been inactive for at least `timeout`.
    pub fn is_idle_for(&self, timeout: Duration) -> bool {
        match (Utc::now() - self.last_activity).to_std() {
            Ok(elapsed) => elapsed >= timeout,
            // Clock went backwards
            Err(_) => false,
        }
    }
}

/// Shared handle to one session. Held for the whole exchange.
pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

/// The map owns one reference; any other means a caller is working on it.
fn in_use(handle: &SessionHandle) -> bool {
    Arc::strong_count(handle) > 1
}

/// Thread-safe map from identity to session.
///
/// The map lock is never held across an await; each session has its own
/// async mutex so calls for one identity serialize without blocking others.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

#[derive(Debug)]
struct SessionStoreInner {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity_limit(0)
    }

    /// Store holding at most `max_sessions` sessions; 0 means unbounded.
    #[must_use]
    pub fn with_capacity_limit(max_sessions: usize) -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                sessions: RwLock::new(HashMap::new()),
                max_sessions,
            }),
        }
    }

    /// Session for `identity`, created with `system_prompt()` on first contact.
    pub fn get_or_create(&self, identity: &str, system_prompt: impl FnOnce() -> String) -> SessionHandle {
        if let Some(handle) = self.get(identity) {
            return handle;
        }

        let mut sessions = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // Another caller may have won the race
        if let Some(handle) = sessions.get(identity) {
            return Arc::clone(handle);
        }

        let limit = self.inner.max_sessions;
        if limit > 0 && sessions.len() >= limit {
            Self::evict_least_recent(&mut sessions);
        }

        let handle = Arc::new(tokio::sync::Mutex::new(Session::new(identity, system_prompt())));
        sessions.insert(identity.to_string(), Arc::clone(&handle));
        tracing::debug!(identity = %identity, active_sessions = sessions.len(), "Session created");
        handle
    }

    fn evict_least_recent(sessions: &mut HashMap<String, SessionHandle>) {
        let victim = sessions
            .iter()
            .filter(|(_, handle)| !in_use(handle))
            .filter_map(|(id, handle)| {
                handle
                    .try_lock()
                    .ok()
                    .map(|s| (id.clone(), s.last_activity()))
            })
            .min_by_key(|(_, at)| *at)
            .map(|(id, _)| id);

        match victim {
            Some(id) => {
                sessions.remove(&id);
                tracing::info!(identity = %id, "Evicted least recently active session");
            }
            None => tracing::warn!(
                active_sessions = sessions.len(),
                "Session limit reached but every session is busy"
            ),
        }
    }

    #[must_use]
    pub fn get(&self, identity: &str) -> Option<SessionHandle> {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .cloned()
    }

    /// Whether `handle` is still the registered session for `identity`.
    pub fn is_current(&self, identity: &str, handle: &SessionHandle) -> bool {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .is_some_and(|h| Arc::ptr_eq(h, handle))
    }

    /// Drop `identity`'s session only if it is still `handle`.
    pub fn remove_current(&self, identity: &str, handle: &SessionHandle) -> bool {
        let mut sessions = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if sessions.get(identity).is_some_and(|h| Arc::ptr_eq(h, handle)) {
            sessions.remove(identity);
            true
        } else {
            false
        }
    }

    /// Drop the session for `identity`. Returns whether one existed.
    pub fn remove(&self, identity: &str) -> bool {
        self.inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity)
            .is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn identities(&self) -> Vec<String> {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Remove sessions inactive for at least `timeout`.
    ///
    /// Sessions held or locked by an in-flight call are skipped. Returns the
    /// number removed.
    pub fn cleanup_idle(&self, timeout: Duration) -> usize {
        let mut sessions = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, handle| {
            if in_use(handle) {
                return true;
            }
            match handle.try_lock() {
                Ok(session) => !session.is_idle_for(timeout),
                Err(_) => true,
            }
        });
        before - sessions.len()
    }
}
