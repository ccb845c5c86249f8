//! Conversation history per (meeting, session) pair.
//!
//! The store map is only locked long enough to look up or insert a handle;
//! each session then has its own async lock, so sessions never block each
//! other. A [`Turn`] holds its session's lock from prompt rendering until the
//! reply is committed, which keeps concurrent turns on one session from
//! interleaving.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::llm::{Message, Role};
use crate::{AgentError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub meeting_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(meeting_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            session_id: session_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.meeting_id, self.session_id)
    }
}

/// Durable home of session histories.
pub trait SessionBacking: Send + Sync {
    /// History of a session in order; empty if it was never persisted.
    fn load(&self, key: &SessionKey) -> anyhow::Result<Vec<Message>>;

    /// Append messages after everything already persisted for the session.
    fn persist(&self, key: &SessionKey, messages: &[Message]) -> anyhow::Result<()>;
}

/// Registry of live chat sessions.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<SessionKey, ChatSession>>>,
    backing: Option<Arc<dyn SessionBacking>>,
}

impl SessionStore {
    /// Memory-only store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose sessions are seeded from and written through to `backing`.
    pub fn with_backing(backing: Arc<dyn SessionBacking>) -> Self {
        Self {
            sessions: Arc::default(),
            backing: Some(backing),
        }
    }

    /// Exact-match lookup; a missing session is created (seeded from the
    /// backing store if one is configured).
    pub fn get_or_create(&self, meeting_id: &str, session_id: &str) -> Result<ChatSession> {
        let key = SessionKey::new(meeting_id, session_id);

        if let Some(session) = self.lock_sessions().get(&key) {
            return Ok(session.clone());
        }

        // Load without holding the map lock so other keys are not held up.
        let history = match &self.backing {
            Some(backing) => backing.load(&key)?,
            None => Vec::new(),
        };
        debug!(session = %key, messages = history.len(), "opening chat session");

        let candidate = ChatSession {
            key: Arc::new(key.clone()),
            history: Arc::new(AsyncMutex::new(history)),
            backing: self.backing.clone(),
        };

        // A concurrent caller may have inserted the same key meanwhile; theirs wins.
        Ok(self
            .lock_sessions()
            .entry(key)
            .or_insert(candidate)
            .clone())
    }

    pub fn len(&self) -> usize {
        self.lock_sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<SessionKey, ChatSession>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle to one session's history. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ChatSession {
    key: Arc<SessionKey>,
    history: Arc<AsyncMutex<Vec<Message>>>,
    backing: Option<Arc<dyn SessionBacking>>,
}

impl fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChatSession({})", self.key)
    }
}

impl ChatSession {
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Snapshot of the committed history.
    pub async fn history(&self) -> Vec<Message> {
        self.history.lock().await.clone()
    }

    /// Append one message atomically with respect to other calls on this session.
    pub async fn append(&self, message: Message) -> Result<()> {
        let mut history = self.history.lock().await;
        write_through(&self.backing, &self.key, std::slice::from_ref(&message))?;
        history.push(message);
        Ok(())
    }

    /// Lock the session for one user/assistant exchange. Waits for any turn
    /// already in progress on this session.
    pub async fn begin_turn(&self, user: Message) -> Turn {
        let guard = Arc::clone(&self.history).lock_owned().await;
        Turn {
            guard,
            key: Arc::clone(&self.key),
            backing: self.backing.clone(),
            user,
        }
    }
}

/// An exchange in progress. The user message stays staged here until the
/// assistant reply is committed; dropping the turn leaves history unchanged.
pub struct Turn {
    guard: OwnedMutexGuard<Vec<Message>>,
    key: Arc<SessionKey>,
    backing: Option<Arc<dyn SessionBacking>>,
    user: Message,
}

impl Turn {
    /// Committed history before this turn.
    pub fn history(&self) -> &[Message] {
        &self.guard
    }

    /// Append `[user, assistant]` and release the session.
    pub fn commit(mut self, assistant: Message) -> Result<(Message, Message)> {
        if assistant.role != Role::Assistant {
            return Err(AgentError::Other(format!(
                "turn must end with an assistant message, got {}",
                assistant.role.as_str()
            )));
        }

        let pair = [self.user.clone(), assistant];
        write_through(&self.backing, &self.key, &pair)?;
        self.guard.extend(pair.iter().cloned());

        let [user, assistant] = pair;
        Ok((user, assistant))
    }
}

fn write_through(
    backing: &Option<Arc<dyn SessionBacking>>,
    key: &SessionKey,
    messages: &[Message],
) -> Result<()> {
    if let Some(backing) = backing {
        backing.persist(key, messages)?;
    }
    Ok(())
}
