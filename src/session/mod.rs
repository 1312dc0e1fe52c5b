//! Conversation sessions
//!
//! One [`SessionState`] per conversation, owned by the [`SessionEngine`]
//! through an explicit [`SessionStore`]. Each state sits behind its own async
//! mutex so turns of one conversation are serialized while different
//! conversations run concurrently.

mod command;
mod engine;
mod notice;
mod selection;

pub use command::{
    Command, Input, END_BUTTON, MORE_BUTTON, NEW_TOPIC_BUTTON, RANDOM_BUTTON, SEARCH_BUTTON,
};
pub use engine::{DialogSettings, SessionEngine};
pub use notice::{Keyboard, Notice};
pub use selection::{sample, sample_with};

use ahash::{HashMap, HashMapExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

/// Identifier of a conversation (a chat on the transport side)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub i64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a conversation is in the dialog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogPhase {
    #[default]
    AwaitingTopic,
    AwaitingCount,
    AwaitingAction,
    AwaitingItemNumber,
}

/// Dialog and dedup state of one conversation
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: DialogPhase,
    pub topic: Option<String>,
    /// Ids already delivered for the current topic
    pub shown_ids: HashSet<i64>,
    /// Resolved ids of the first search for the current topic
    pub topic_ids: Option<Vec<i64>>,
    /// Number of resolved items for the current topic
    pub total_available: usize,
    pub last_requested_count: usize,
    /// Start of the latest turn
    pub last_active: Instant,
    retired: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: DialogPhase::default(),
            topic: None,
            shown_ids: HashSet::new(),
            topic_ids: None,
            total_available: 0,
            last_requested_count: 0,
            last_active: Instant::now(),
            retired: false,
        }
    }
}

impl SessionState {
    /// Start a new topic; forgets everything about the previous one
    pub fn set_topic(&mut self, topic: impl Into<String>) {
        self.clear_topic();
        self.topic = Some(topic.into());
        self.phase = DialogPhase::AwaitingCount;
    }

    pub fn clear_topic(&mut self) {
        self.topic = None;
        self.shown_ids.clear();
        self.topic_ids = None;
        self.total_available = 0;
    }

    /// Unseen items left for the current topic
    pub fn remaining(&self) -> usize {
        self.total_available.saturating_sub(self.shown_ids.len())
    }

    pub fn has_results(&self) -> bool {
        self.total_available > 0
    }

    pub fn is_exhausted(&self) -> bool {
        self.shown_ids.len() >= self.total_available
    }
}

/// Explicit map from conversation to its session
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<ConversationId, Arc<Mutex<SessionState>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the live session of `conversation`, creating it on first contact.
    ///
    /// Waits behind any turn already running for the same conversation.
    pub async fn acquire(&self, conversation: ConversationId) -> OwnedMutexGuard<SessionState> {
        loop {
            let slot = {
                let mut sessions = self.sessions.lock().await;
                Arc::clone(
                    sessions
                        .entry(conversation)
                        .or_insert_with(|| Arc::new(Mutex::new(SessionState::default()))),
                )
            };

            let mut state = slot.lock_owned().await;
            // The previous holder discarded this session; start over with a fresh one
            if !state.retired {
                state.last_active = Instant::now();
                return state;
            }
        }
    }

    /// Drop the session of `conversation`. The caller must hold its lock.
    pub async fn discard(&self, conversation: ConversationId, state: &mut SessionState) {
        state.retired = true;
        self.sessions.lock().await.remove(&conversation);
    }

    /// Drop every session idle for at least `max_idle` and return how many
    /// went. Sessions in the middle of a turn are kept.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();

        sessions.retain(|_, slot| match slot.try_lock() {
            Ok(mut state) if state.last_active.elapsed() >= max_idle => {
                state.retired = true;
                false
            }
            _ => true,
        });

        before - sessions.len()
    }

    /// Copy of the current session, if one exists
    pub async fn snapshot(&self, conversation: ConversationId) -> Option<SessionState> {
        let slot = self.sessions.lock().await.get(&conversation).cloned()?;
        let state = slot.lock().await;
        (!state.retired).then(|| state.clone())
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_topic_resets_topic_state() {
        let mut state = SessionState::default();
        state.set_topic("cats");
        state.shown_ids.extend([1, 2]);
        state.topic_ids = Some(vec![1, 2, 3]);
        state.total_available = 3;
        assert_eq!(state.remaining(), 1);

        state.set_topic("dogs");
        assert_eq!(state.topic.as_deref(), Some("dogs"));
        assert_eq!(state.phase, DialogPhase::AwaitingCount);
        assert!(state.shown_ids.is_empty());
        assert!(state.topic_ids.is_none());
        assert!(!state.has_results());
    }

    #[tokio::test]
    async fn test_store_creates_and_discards() {
        let store = SessionStore::new();
        let conversation = ConversationId(7);
        assert!(store.snapshot(conversation).await.is_none());

        {
            let mut state = store.acquire(conversation).await;
            state.set_topic("cats");
        }
        assert_eq!(store.len().await, 1);
        let snapshot = store.snapshot(conversation).await.unwrap();
        assert_eq!(snapshot.phase, DialogPhase::AwaitingCount);

        {
            let mut state = store.acquire(conversation).await;
            store.discard(conversation, &mut state).await;
        }
        assert!(store.is_empty().await);

        let fresh = store.acquire(conversation).await;
        assert_eq!(fresh.phase, DialogPhase::AwaitingTopic);
        assert!(fresh.topic.is_none());
    }

    #[tokio::test]
    async fn test_waiter_on_discarded_session_gets_fresh_one() {
        let store = Arc::new(SessionStore::new());
        let conversation = ConversationId(1);

        let mut first = store.acquire(conversation).await;
        first.set_topic("cats");

        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.acquire(conversation).await.topic.clone() })
        };
        tokio::task::yield_now().await;

        store.discard(conversation, &mut first).await;
        drop(first);

        assert_eq!(waiter.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_evict_idle_drops_untouched_sessions() {
        let store = SessionStore::new();
        for id in 1..=3 {
            store.acquire(ConversationId(id)).await.set_topic("cats");
        }

        assert_eq!(store.evict_idle(Duration::from_secs(3600)).await, 0);
        assert_eq!(store.len().await, 3);

        // A conversation mid-turn survives even a zero timeout
        let busy = store.acquire(ConversationId(2)).await;
        assert_eq!(store.evict_idle(Duration::ZERO).await, 2);
        assert_eq!(store.len().await, 1);
        drop(busy);

        assert!(store.snapshot(ConversationId(1)).await.is_none());
        let fresh = store.acquire(ConversationId(1)).await;
        assert!(fresh.topic.is_none());
        drop(fresh);

        assert_eq!(
            store.snapshot(ConversationId(2)).await.unwrap().topic.as_deref(),
            Some("cats")
        );
    }
}
