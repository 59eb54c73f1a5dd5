//! Bounded conversation history
//!
//! One ring buffer per conversation scope, capacity fixed at ten entries,
//! oldest evicted first. Entries live for the process lifetime; there is
//! no teardown.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// Entries kept per conversation scope
pub const HISTORY_CAPACITY: usize = 10;

/// One remembered conversation turn
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub author: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Process-wide history store, keyed by conversation scope
#[derive(Default)]
pub struct HistoryLog {
    scopes: RwLock<HashMap<u64, VecDeque<HistoryEntry>>>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry to a scope, evicting the oldest at capacity
    pub async fn record(&self, scope: u64, entry: HistoryEntry) {
        let mut scopes = self.scopes.write().await;
        let buffer = scopes.entry(scope).or_default();
        if buffer.len() == HISTORY_CAPACITY {
            buffer.pop_front();
        }
        buffer.push_back(entry);
    }

    /// Render a scope's history for prompt embedding, oldest first
    pub async fn render(&self, scope: u64) -> String {
        let scopes = self.scopes.read().await;
        match scopes.get(&scope) {
            Some(buffer) => buffer
                .iter()
                .map(|e| format!("{}: {}", e.author, e.text))
                .collect::<Vec<_>>()
                .join("\n"),
            None => String::new(),
        }
    }

    pub async fn len(&self, scope: u64) -> usize {
        self.scopes
            .read()
            .await
            .get(&scope)
            .map(|b| b.len())
            .unwrap_or(0)
    }

    pub async fn is_empty(&self, scope: u64) -> bool {
        self.len(scope).await == 0
    }
}
