//! Per-sender conversation history with a sliding window.
//!
//! Histories are keyed by sender (e.g. phone number) and hold the most recent turns.
//! Each sender has its own lock so appends for one sender never wait on another.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

type History = Arc<Mutex<VecDeque<Turn>>>;

/// In-memory store of conversation histories (get, append). Entries live for the process lifetime.
pub struct ConversationStore {
    limit: usize,
    inner: RwLock<HashMap<String, History>>,
}

impl ConversationStore {
    /// `limit` is the maximum number of turns kept per sender.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Return the sender's turns, oldest first. Empty if the sender has not been seen.
    pub async fn get_history(&self, sender: &str) -> Vec<Turn> {
        let entry = self.inner.read().await.get(sender).cloned();
        match entry {
            Some(history) => history.lock().await.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Append turns to the sender's history, then drop the oldest until at most `limit` remain.
    /// The whole append is applied under the sender's lock.
    pub async fn append_turns(&self, sender: &str, turns: impl IntoIterator<Item = Turn>) {
        let history = self.entry(sender).await;
        let mut g = history.lock().await;
        g.extend(turns);
        while g.len() > self.limit {
            g.pop_front();
        }
    }

    /// Number of distinct senders seen so far.
    pub async fn sender_count(&self) -> usize {
        self.inner.read().await.len()
    }

    async fn entry(&self, sender: &str) -> History {
        if let Some(h) = self.inner.read().await.get(sender) {
            return h.clone();
        }
        self.inner
            .write()
            .await
            .entry(sender.to_string())
            .or_default()
            .clone()
    }
}
