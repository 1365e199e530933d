//! Conversation sessions keyed by caller-supplied id
//!
//! Each entry is guarded by its own async mutex, so turns on one session are
//! serialized while independent sessions proceed concurrently. Entries live
//! until removed or evicted as idle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use crate::conversation::{ConversationSession, SessionSettings};
use crate::llm::ChatModel;
use crate::pipeline::ChatHistoryEntry;

/// Everything kept for one caller
pub struct SessionState {
    /// Model-facing conversation
    pub conversation: ConversationSession,
    /// Presentation-facing display rows
    pub display_history: Vec<ChatHistoryEntry>,
    last_active: Instant,
}

impl SessionState {
    fn new(conversation: ConversationSession) -> Self {
        Self {
            conversation,
            display_history: Vec::new(),
            last_active: Instant::now(),
        }
    }

    /// Mark the session as used now
    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    /// Time since the session was last used
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    /// Clear both the conversation and its display rows
    pub fn reset(&mut self) {
        self.conversation.reset();
        self.display_history.clear();
    }
}

/// Handle to one session; lock it for the duration of a turn
pub type SharedSession = Arc<Mutex<SessionState>>;

/// Registry of live sessions
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SharedSession>>>,
    model: Arc<dyn ChatModel>,
    settings: SessionSettings,
}

impl SessionStore {
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>, settings: SessionSettings) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            model,
            settings,
        }
    }

    /// Look up a session, creating it on first use
    pub async fn get_or_create(&self, id: &str) -> SharedSession {
        if let Some(session) = self.sessions.read().await.get(id) {
            return session.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::info!(session_id = %id, "created session");
                Arc::new(Mutex::new(SessionState::new(ConversationSession::new(
                    self.model.clone(),
                    self.settings.clone(),
                ))))
            })
            .clone()
    }

    /// Look up an existing session
    pub async fn get(&self, id: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Forget a session entirely
    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    /// Drop sessions idle for longer than `ttl`, returning how many were removed
    ///
    /// Sessions locked by an in-flight turn are in use and always kept.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            session
                .try_lock()
                .map_or(true, |state| state.idle_for() <= ttl)
        });
        before - sessions.len()
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
